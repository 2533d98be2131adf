//! HTTP transport between a worker and its fleet controller.

mod config;
pub use config::FleetConfig;

mod errors;
pub use errors::FleetError;

mod event_log;
pub use event_log::HttpEventLog;

mod heartbeat;
pub use heartbeat::status_heartbeat;
