//! Core event-to-file routing for the Slack archiver.
//!
//! Everything in this crate is platform-agnostic: events are opaque
//! [`serde_json::Value`] objects, the platform directory sits behind the
//! [`Directory`] trait, and delivery order is whatever order the caller
//! feeds events in. The binary crate owns the actual connection.

pub mod event;
pub mod resolver;
pub mod router;
pub mod sink;

pub use resolver::Directory;
pub use router::{DropPolicy, Router};
pub use sink::{ArchiveError, FileSink};
