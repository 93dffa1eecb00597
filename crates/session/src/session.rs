use std::sync::Arc;

use chrono::{DateTime, Utc};
use extract::{ChatMessage, RiskFinding};
use ingest::{AttachedDocument, DocumentId};
use pipeline::SummaryCache;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::keys;
use crate::store::KvStore;

const SYSTEM_SEED: &str = "You are a helpful assigtant for a UK based mortgage broker. Your role is to analyse the documents and information submitted by the broker and determine if the client can be safely lended to. You should amongs other things verify consistency of provided information, their expenditure and any concerning spending and whether they can afford the morgage";

const GREETING_SEED: &str = "Hello! I'm your AI Mortgage Broker assistant. You can attach the document you want to analyse for you clients on the left. Please include any other information like the clients name, how much they are looking to borrow and the value of the property they are looking to buy in the chat ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Bot,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
    /// RFC 3339 on disk.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Bot, content)
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            MessageRole::User => ChatMessage::user(&self.content),
            MessageRole::Bot => ChatMessage::assistant(&self.content),
            MessageRole::System => ChatMessage::system(&self.content),
        }
    }
}

/// Everything the broker has built up for one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSession {
    pub client_id: String,
    #[serde(default)]
    pub documents: Vec<AttachedDocument>,
    #[serde(default)]
    pub chat_transcript: Vec<Message>,
    #[serde(default)]
    pub last_analysis: Vec<RiskFinding>,
    /// Summaries of this client's documents, keyed by document id.
    #[serde(default)]
    pub summaries: SummaryCache,
}

impl ClientSession {
    /// No documents, no analysis, and the two-message seed transcript.
    pub fn new(client_id: impl Into<String>) -> Self {
        let now = Utc::now();
        let seed = |id: &str, role, content: &str| Message {
            id: id.to_string(),
            content: content.to_string(),
            role,
            timestamp: now,
        };

        Self {
            client_id: client_id.into(),
            documents: Vec::new(),
            chat_transcript: vec![
                seed("1", MessageRole::System, SYSTEM_SEED),
                seed("2", MessageRole::Bot, GREETING_SEED),
            ],
            last_analysis: Vec::new(),
            summaries: SummaryCache::new(),
        }
    }

    pub fn document(&self, id: &DocumentId) -> Option<&AttachedDocument> {
        self.documents.iter().find(|d| d.id == *id)
    }

    pub fn active_documents(&self) -> Vec<AttachedDocument> {
        self.documents.iter().filter(|d| d.is_active).cloned().collect()
    }

    pub fn transcript_for_model(&self) -> Vec<ChatMessage> {
        self.chat_transcript.iter().map(Message::to_chat_message).collect()
    }

    /// Copy in entries of `summaries` whose document is still attached.
    pub fn absorb_summaries(&mut self, summaries: &SummaryCache) {
        for (id, summary) in summaries.snapshot() {
            if self.document(&id).is_some() {
                self.summaries.insert(id, summary);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No client selected.
    Uninitialized,
    /// Selected and identical to what is persisted, or a fresh default.
    Loaded,
    /// Mutated in memory, write-back pending.
    Dirty,
    /// Last mutation written back.
    Persisted,
}

/// Working session of the selected client, written back whole after every
/// mutation.
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    namespace: String,
    current: Option<ClientSession>,
    state: SessionState,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        Self {
            kv,
            namespace: namespace.into(),
            current: None,
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current(&self) -> Option<&ClientSession> {
        self.current.as_ref()
    }

    pub fn current_client_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.client_id.as_str())
    }

    /// Persisted record of `client_id`, without selecting it.
    pub fn load(&self, client_id: &str) -> Result<Option<ClientSession>> {
        let key = keys::session_key(client_id, &self.namespace);
        let stored = self
            .kv
            .get(&key)
            .map_err(|source| SessionError::Storage { key: key.clone(), source })?;

        match stored {
            Some(json) => {
                let session = serde_json::from_str(&json)
                    .map_err(|source| SessionError::Corrupt { key, source })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Make `client_id` current, restoring its persisted session or starting
    /// from the default one.
    pub fn select_client(&mut self, client_id: &str) -> Result<&ClientSession> {
        let session = match self.load(client_id)? {
            Some(session) => {
                tracing::info!(
                    client_id,
                    documents = session.documents.len(),
                    messages = session.chat_transcript.len(),
                    "Restored client session"
                );
                session
            }
            None => {
                tracing::info!(client_id, "No stored session, starting from default");
                ClientSession::new(client_id)
            }
        };

        self.state = SessionState::Loaded;
        Ok(&*self.current.insert(session))
    }

    pub fn add_document(&mut self, doc: AttachedDocument) -> Result<()> {
        self.mutate(|session| {
            session.documents.push(doc);
            Ok(())
        })
    }

    /// Removes the document together with its cached summary.
    pub fn remove_document(&mut self, id: DocumentId) -> Result<AttachedDocument> {
        self.mutate(|session| {
            let position = session
                .documents
                .iter()
                .position(|d| d.id == id)
                .ok_or(SessionError::UnknownDocument(id))?;
            session.summaries.remove(&id);
            Ok(session.documents.remove(position))
        })
    }

    /// Flip membership in the working set; returns the new state.
    pub fn toggle_document(&mut self, id: DocumentId) -> Result<bool> {
        self.mutate(|session| {
            let doc = session
                .documents
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or(SessionError::UnknownDocument(id))?;
            doc.is_active = !doc.is_active;
            Ok(doc.is_active)
        })
    }

    pub fn push_message(&mut self, message: Message) -> Result<()> {
        self.mutate(|session| {
            session.chat_transcript.push(message);
            Ok(())
        })
    }

    pub fn set_last_analysis(&mut self, findings: Vec<RiskFinding>) -> Result<()> {
        self.mutate(|session| {
            session.last_analysis = findings;
            Ok(())
        })
    }

    /// Store the outcome of a run started for `client_id`, merging in the
    /// summaries it computed for documents the client still has.
    ///
    /// If another client was selected meanwhile the stored record is updated
    /// instead. A client deleted meanwhile stays deleted.
    pub fn record_analysis(
        &mut self,
        client_id: &str,
        findings: Vec<RiskFinding>,
        summaries: &SummaryCache,
    ) -> Result<()> {
        if self.current_client_id() == Some(client_id) {
            return self.mutate(|session| {
                session.absorb_summaries(summaries);
                session.last_analysis = findings;
                Ok(())
            });
        }

        let Some(mut session) = self.load(client_id)? else {
            tracing::warn!(client_id, "Client removed during analysis, dropping result");
            return Ok(());
        };
        session.absorb_summaries(summaries);
        session.last_analysis = findings;
        self.write(&session)
    }

    /// Delete the persisted record. If the client is current, nothing stays
    /// selected.
    pub fn delete_client(&mut self, client_id: &str) -> Result<()> {
        let key = keys::session_key(client_id, &self.namespace);
        self.kv
            .remove(&key)
            .map_err(|source| SessionError::Storage { key, source })?;

        if self.current_client_id() == Some(client_id) {
            self.current = None;
            self.state = SessionState::Uninitialized;
        }
        tracing::info!(client_id, "Deleted client session");
        Ok(())
    }

    fn mutate<T>(&mut self, f: impl FnOnce(&mut ClientSession) -> Result<T>) -> Result<T> {
        let session = self.current.as_mut().ok_or(SessionError::NoActiveClient)?;
        let value = f(session)?;
        self.state = SessionState::Dirty;

        let session = self.current.as_ref().ok_or(SessionError::NoActiveClient)?;
        self.write(session)?;
        self.state = SessionState::Persisted;
        Ok(value)
    }

    fn write(&self, session: &ClientSession) -> Result<()> {
        let key = keys::session_key(&session.client_id, &self.namespace);
        let json = serde_json::to_string(session).map_err(|source| SessionError::Serialize {
            key: key.clone(),
            source,
        })?;
        self.kv
            .set(&key, &json)
            .map_err(|source| SessionError::Storage { key, source })?;

        tracing::debug!(client_id = %session.client_id, bytes = json.len(), "Persisted client session");
        Ok(())
    }
}
