//! In-process backends for single-node runs and tests.
//!
//! Nothing here is durable: jobs, records and outcomes live as long as the process.

mod auth;
pub use auth::{AllowAll, DenyOwners};

mod queue;
pub use queue::{MemoryQueue, Settlement};

mod storage;
pub use storage::MemoryStorage;
