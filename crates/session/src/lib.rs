pub mod error;
pub mod keys;
pub mod roster;
pub mod session;
pub mod store;

pub use error::SessionError;
pub use keys::DEFAULT_NAMESPACE;
pub use roster::{ClientRecord, ClientRoster, ClientStatus, ClientUpdate};
pub use session::{ClientSession, Message, MessageRole, SessionState, SessionStore};
pub use store::{FileStore, KvStore, MemoryStore};
