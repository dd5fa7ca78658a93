pub mod config;
pub mod error;
pub mod identity;
pub mod manager;
pub mod node;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod stats;
pub mod store;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use identity::SiteIdentity;
pub use manager::SyncManager;
pub use node::{NodeState, SyncNode};
pub use protocol::{ChangeRecord, PrimaryKey, SiteId, SyncMessage, SyncPayload};
pub use store::{ChangeLogStore, MemoryChangeLog};
