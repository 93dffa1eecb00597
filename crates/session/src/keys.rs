pub const DEFAULT_NAMESPACE: &str = "a1";

pub fn clients_key(namespace: &str) -> String {
    format!("mortgage-check-clients-{namespace}")
}

pub fn active_client_key(namespace: &str) -> String {
    format!("mortgage-check-active-client-{namespace}")
}

pub fn session_key(client_id: &str, namespace: &str) -> String {
    format!("mortgage-check-session-{client_id}-{namespace}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(clients_key(DEFAULT_NAMESPACE), "mortgage-check-clients-a1");
        assert_eq!(active_client_key("b2"), "mortgage-check-active-client-b2");
        assert_eq!(session_key("1", DEFAULT_NAMESPACE), "mortgage-check-session-1-a1");
    }
}
