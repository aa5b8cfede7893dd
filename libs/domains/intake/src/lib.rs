//! Intake Domain
//!
//! Polls document-store collections for newly created records (enrollment
//! applications, contact messages, admin notifications), emails the people
//! each record concerns, and writes the outcome back onto the record.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Scheduler    │  ← one single-flight job per Monitor (app crate)
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │     Scanner     │  ← query unprocessed → per-record workflow
//! └────────┬────────┘
//!          │ claim → compose → fan-out → finalize
//! ┌────────▼────────┐   ┌───────────────────┐
//! │ MessageComposer │   │ RecipientResolver │ ← guardians / admin directory
//! └────────┬────────┘   └─────────┬─────────┘
//!          │                      │
//! ┌────────▼──────────────────────▼─┐
//! │ Notifier (email crate)          │  ← parallel sends, joined
//! └─────────────────────────────────┘
//! ```
//!
//! The record itself is the only state. Claiming (writing the processed
//! marker) happens before any email is sent, so a crash mid-send never
//! leads to a second notification.

pub mod directory;
pub mod error;
pub mod firebase_auth;
pub mod firestore;
pub mod google_auth;
pub mod messages;
pub mod models;
pub mod monitor;
pub mod recipients;
pub mod scanner;
pub mod store;

pub use directory::{IdentityDirectory, InMemoryDirectory, UserRecord};
pub use error::{IntakeError, IntakeResult};
pub use firebase_auth::FirebaseAuthDirectory;
pub use firestore::FirestoreStore;
pub use google_auth::{GoogleTokenSource, ServiceAccountKey};
pub use messages::{ComposedMessage, MessageComposer, NotificationType};
pub use models::{
    Document, EmailStatus, FieldFilter, FieldValue, Fields, ProcessedMarker, TrackingFields,
};
pub use monitor::{Monitor, MonitorKind};
pub use recipients::{RecipientResolver, RelationshipMode, guardian_recipients};
pub use scanner::{RecordOutcome, ScanReport, Scanner};
pub use store::{DocumentStore, InMemoryDocumentStore};
