use std::sync::Arc;

use anyhow::{Context, Result};
use extract::{ChatMessage, ChatModel};

/// Free-form conversation with the broker over the client transcript.
pub struct Assistant {
    model: Arc<dyn ChatModel>,
}

impl Assistant {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// `transcript` is sent whole, system seed included.
    pub async fn reply(&self, transcript: &[ChatMessage]) -> Result<String> {
        if transcript.is_empty() {
            anyhow::bail!("Cannot reply to an empty transcript");
        }

        let reply = self
            .model
            .chat(transcript)
            .await
            .context("Failed to get assistant reply")?;

        tracing::debug!(messages = transcript.len(), reply_len = reply.len(), "Assistant replied");
        Ok(reply.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::testing::ScriptedModel;
    use extract::ChatRole;

    #[tokio::test]
    async fn test_sends_whole_transcript() {
        let model = Arc::new(ScriptedModel::queued(["  A 10% deposit is typical.\n"]));
        let assistant = Assistant::new(model.clone());
        let transcript = vec![
            ChatMessage::system("You are a mortgage assistant."),
            ChatMessage::assistant("Hello!"),
            ChatMessage::user("What deposit do I need?"),
        ];

        let reply = assistant.reply(&transcript).await.unwrap();

        assert_eq!(reply, "A 10% deposit is typical.");
        let sent = &model.requests()[0];
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].role, ChatRole::System);
        assert_eq!(sent[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected() {
        let model = Arc::new(ScriptedModel::queued(["hi"]));
        let assistant = Assistant::new(model.clone());

        assert!(assistant.reply(&[]).await.is_err());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = Arc::new(ScriptedModel::queued(Vec::<String>::new()));
        model.push_error("model not loaded");

        let err = Assistant::new(model)
            .reply(&[ChatMessage::user("hello")])
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("model not loaded"));
    }
}
