//! Domain types shared by every hive crate.
//!
//! Everything here is plain data: identifiers, job payloads, execution records and the
//! serializable views the worker exposes to the fleet.

mod domain;
pub use domain::*;
