use std::sync::Arc;

use assess::ClientMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::keys;
use crate::store::KvStore;

const PLACEHOLDER_TEXT: &str = "Type information here";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientStatus {
    Approved,
    #[serde(rename = "Under review")]
    UnderReview,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub loan_amount: u64,
    pub deposit_amount: u64,
    pub employment_status: String,
    pub current_role: String,
    pub company: String,
    pub property_type: String,
    pub status: ClientStatus,
}

impl ClientRecord {
    fn with_defaults(id: String, name: String, loan_amount: u64, deposit_amount: u64) -> Self {
        Self {
            id,
            name,
            loan_amount,
            deposit_amount,
            employment_status: "Employed (PAYE)".to_string(),
            current_role: PLACEHOLDER_TEXT.to_string(),
            company: PLACEHOLDER_TEXT.to_string(),
            property_type: "First-time buyer".to_string(),
            status: ClientStatus::UnderReview,
        }
    }

    /// The record shown when nothing has been stored yet.
    pub fn sample() -> Self {
        Self::with_defaults("1".to_string(), "John Smith".to_string(), 350_000, 50_000)
    }

    /// Details handed to the cross-document analysis. The name is left out.
    pub fn metadata(&self) -> ClientMetadata {
        ClientMetadata {
            loan_amount: Some(self.loan_amount),
            deposit_amount: Some(self.deposit_amount),
            employment_status: Some(self.employment_status.clone()),
            current_role: Some(self.current_role.clone()),
            company: Some(self.company.clone()),
            property_type: Some(self.property_type.clone()),
        }
    }
}

/// Partial edit of a client record; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub loan_amount: Option<u64>,
    pub deposit_amount: Option<u64>,
    pub employment_status: Option<String>,
    pub current_role: Option<String>,
    pub company: Option<String>,
    pub property_type: Option<String>,
    pub status: Option<ClientStatus>,
}

impl ClientUpdate {
    fn apply(self, record: &mut ClientRecord) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(v) = self.loan_amount {
            record.loan_amount = v;
        }
        if let Some(v) = self.deposit_amount {
            record.deposit_amount = v;
        }
        if let Some(v) = self.employment_status {
            record.employment_status = v;
        }
        if let Some(v) = self.current_role {
            record.current_role = v;
        }
        if let Some(v) = self.company {
            record.company = v;
        }
        if let Some(v) = self.property_type {
            record.property_type = v;
        }
        if let Some(v) = self.status {
            record.status = v;
        }
    }
}

/// The broker's client list and which client is open.
pub struct ClientRoster {
    kv: Arc<dyn KvStore>,
    namespace: String,
    clients: Vec<ClientRecord>,
    active: Option<String>,
}

impl ClientRoster {
    /// Load the stored roster. Empty storage yields the sample client, made
    /// active and written back.
    pub fn load(kv: Arc<dyn KvStore>, namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let clients_key = keys::clients_key(&namespace);
        let active_key = keys::active_client_key(&namespace);

        let clients: Vec<ClientRecord> = match read(kv.as_ref(), &clients_key)? {
            Some(json) => serde_json::from_str(&json).map_err(|source| SessionError::Corrupt {
                key: clients_key.clone(),
                source,
            })?,
            None => Vec::new(),
        };
        let stored_active = read(kv.as_ref(), &active_key)?;

        let mut roster = Self {
            kv,
            namespace,
            clients,
            active: None,
        };

        if roster.clients.is_empty() {
            let sample = ClientRecord::sample();
            roster.active = Some(sample.id.clone());
            roster.clients.push(sample);
            roster.save()?;
            tracing::info!("Initialized client roster with sample client");
        } else {
            roster.active = stored_active
                .filter(|id| roster.get(id).is_some())
                .or_else(|| roster.clients.first().map(|c| c.id.clone()));
            tracing::info!(clients = roster.clients.len(), "Loaded client roster");
        }

        Ok(roster)
    }

    pub fn clients(&self) -> &[ClientRecord] {
        &self.clients
    }

    pub fn get(&self, id: &str) -> Option<&ClientRecord> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_client(&self) -> Option<&ClientRecord> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    /// Append a client with the new-client defaults and make it active.
    pub fn add_client(&mut self, name: &str) -> Result<&ClientRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyClientName);
        }

        let record = ClientRecord::with_defaults(
            Uuid::new_v4().to_string(),
            name.to_string(),
            300_000,
            30_000,
        );
        tracing::info!(client_id = %record.id, "Added client");
        self.active = Some(record.id.clone());
        self.clients.push(record);
        self.save()?;

        let added = self.clients.len() - 1;
        Ok(&self.clients[added])
    }

    pub fn update_client(&mut self, id: &str, update: ClientUpdate) -> Result<&ClientRecord> {
        let index = self.index_of(id)?;
        update.apply(&mut self.clients[index]);
        self.save()?;
        Ok(&self.clients[index])
    }

    /// Remove the client and its session record. If it was active, the first
    /// remaining client becomes active.
    pub fn remove_client(&mut self, id: &str) -> Result<ClientRecord> {
        let index = self.index_of(id)?;
        let removed = self.clients.remove(index);

        let session_key = keys::session_key(id, &self.namespace);
        self.kv
            .remove(&session_key)
            .map_err(|source| SessionError::Storage { key: session_key, source })?;

        if self.active.as_deref() == Some(id) {
            self.active = self.clients.first().map(|c| c.id.clone());
        }
        self.save()?;

        tracing::info!(client_id = id, remaining = self.clients.len(), "Removed client");
        Ok(removed)
    }

    pub fn set_active(&mut self, id: &str) -> Result<()> {
        self.index_of(id)?;
        self.active = Some(id.to_string());
        self.save()
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.clients
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| SessionError::UnknownClient(id.to_string()))
    }

    fn save(&self) -> Result<()> {
        let clients_key = keys::clients_key(&self.namespace);
        let json = serde_json::to_string(&self.clients).map_err(|source| SessionError::Serialize {
            key: clients_key.clone(),
            source,
        })?;
        write(self.kv.as_ref(), &clients_key, &json)?;

        let active_key = keys::active_client_key(&self.namespace);
        match &self.active {
            Some(id) => write(self.kv.as_ref(), &active_key, id),
            None => self
                .kv
                .remove(&active_key)
                .map_err(|source| SessionError::Storage { key: active_key, source }),
        }
    }
}

fn read(kv: &dyn KvStore, key: &str) -> Result<Option<String>> {
    kv.get(key).map_err(|source| SessionError::Storage {
        key: key.to_string(),
        source,
    })
}

fn write(kv: &dyn KvStore, key: &str, value: &str) -> Result<()> {
    kv.set(key, value).map_err(|source| SessionError::Storage {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use assess::NOT_SPECIFIED;

    fn roster() -> (Arc<MemoryStore>, ClientRoster) {
        let kv = Arc::new(MemoryStore::new());
        let roster = ClientRoster::load(kv.clone(), keys::DEFAULT_NAMESPACE).unwrap();
        (kv, roster)
    }

    #[test]
    fn test_empty_storage_gets_sample_client() {
        let (kv, roster) = roster();

        assert_eq!(roster.clients().len(), 1);
        let client = roster.active_client().unwrap();
        assert_eq!(client.name, "John Smith");
        assert_eq!(client.loan_amount, 350_000);
        assert_eq!(client.status, ClientStatus::UnderReview);
        assert_eq!(kv.get("mortgage-check-active-client-a1").unwrap().as_deref(), Some("1"));
        assert!(kv.get("mortgage-check-clients-a1").unwrap().unwrap().contains("\"Under review\""));
    }

    #[test]
    fn test_add_client_becomes_active_and_persists() {
        let (kv, mut roster) = roster();

        let id = roster.add_client("  Jane Doe ").unwrap().id.clone();

        let reloaded = ClientRoster::load(kv, keys::DEFAULT_NAMESPACE).unwrap();
        let jane = reloaded.get(&id).unwrap();
        assert_eq!(jane.name, "Jane Doe");
        assert_eq!(jane.loan_amount, 300_000);
        assert_eq!(jane.deposit_amount, 30_000);
        assert_eq!(reloaded.active_id(), Some(id.as_str()));
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let (_, mut roster) = roster();
        assert!(matches!(roster.add_client("   "), Err(SessionError::EmptyClientName)));
        assert_eq!(roster.clients().len(), 1);
    }

    #[test]
    fn test_update_client_is_partial() {
        let (_, mut roster) = roster();
        let update = ClientUpdate {
            company: Some("NHS Trust".into()),
            status: Some(ClientStatus::Approved),
            ..Default::default()
        };

        let client = roster.update_client("1", update).unwrap();

        assert_eq!(client.company, "NHS Trust");
        assert_eq!(client.status, ClientStatus::Approved);
        assert_eq!(client.name, "John Smith");
    }

    #[test]
    fn test_remove_active_client_moves_selection_and_clears_session() {
        let (kv, mut roster) = roster();
        let jane = roster.add_client("Jane Doe").unwrap().id.clone();
        kv.set(&keys::session_key(&jane, "a1"), "{}").unwrap();

        roster.remove_client(&jane).unwrap();

        assert_eq!(roster.active_id(), Some("1"));
        assert!(kv.get(&keys::session_key(&jane, "a1")).unwrap().is_none());
        assert!(matches!(roster.remove_client(&jane), Err(SessionError::UnknownClient(_))));
    }

    #[test]
    fn test_stale_active_id_falls_back_to_first_client() {
        let kv = Arc::new(MemoryStore::new());
        let clients = vec![ClientRecord::sample()];
        kv.set("mortgage-check-clients-a1", &serde_json::to_string(&clients).unwrap()).unwrap();
        kv.set("mortgage-check-active-client-a1", "deleted").unwrap();

        let roster = ClientRoster::load(kv, "a1").unwrap();

        assert_eq!(roster.active_id(), Some("1"));
    }

    #[test]
    fn test_metadata_normalizes_placeholders() {
        let metadata = ClientRecord::sample().metadata();
        let value = metadata.normalized();

        assert_eq!(value["loanAmount"], 350_000);
        assert_eq!(value["employmentStatus"], "Employed (PAYE)");
        assert_eq!(value["currentRole"], NOT_SPECIFIED);
        assert_eq!(value["company"], NOT_SPECIFIED);
        assert!(value.get("name").is_none());
    }
}
