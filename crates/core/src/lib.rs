//! Coordination core for shared browser sessions.
//!
//! One automated browser page is driven by many remote participants: a single
//! controller submits actions, everyone else observes a live mirror. This
//! crate owns the hard parts of that arrangement:
//!
//! - who may act, and the timed auto-grant protocol for contested control
//! - strict per-session serialization of actions against the page
//! - causally ordered event fan-out to every participant
//! - abrupt disconnect handling without corrupting the recording
//! - exactly-once export and teardown when a session empties
//!
//! Each live session is one actor task draining a private queue; the
//! [`Coordinator`] is the only entry point and resolves sessions by ID
//! through the [`store::SessionStore`], never through long-lived references.
//!
//! The browser itself, the issue-analysis service, and the export target are
//! collaborator traits ([`driver::BrowserDriver`], [`analysis::IssueAnalyzer`],
//! [`export::ExportSink`]) implemented outside this crate.

pub mod analysis;
pub mod arbiter;
pub mod coordinator;
pub mod directory;
pub mod driver;
pub mod error;
pub mod export;
pub mod ids;
pub mod lifecycle;
pub mod recording;
pub mod session;
pub mod store;
pub mod synthesis;

mod executor;

pub use cobrowse_protocol as protocol;

pub use coordinator::Coordinator;
pub use error::{CoreError, Result};
