//! Email delivery building blocks for the intake notifier
//!
//! ## Components
//!
//! - **Models**: [`Email`], the single-recipient HTML message handed to a transport
//! - **Providers**: [`EmailProvider`] with an SMTP implementation (lettre) and a
//!   recording [`MockEmailProvider`]
//! - **Notifier**: [`Notifier`] wraps a provider with a timeout/attempt policy and
//!   reports a [`SendOutcome`] instead of an error
//! - **Templates**: [`TemplateStore`] (disk or memory) and [`TemplateRenderer`],
//!   which fills fixed marker tokens by literal replacement
//!
//! ## Usage
//!
//! ```ignore
//! use email::{FileTemplateStore, Notifier, SendPolicy, SmtpProvider, TemplateRenderer};
//!
//! let notifier = Notifier::new(Arc::new(SmtpProvider::new(smtp_config)?), SendPolicy::default());
//! let renderer = TemplateRenderer::new(Arc::new(FileTemplateStore::new("templates")));
//!
//! let body = renderer.render("confirmation.template.html", &[("{{ id }}", "abc123")])?;
//! let outcome = notifier.send("Subject", &body, "guardian@example.com", None).await;
//! ```

pub mod error;
pub mod models;
pub mod notifier;
pub mod provider;
pub mod templates;

pub use error::{EmailError, EmailResult};
pub use models::Email;
pub use notifier::{Notifier, SendOutcome, SendPolicy};
pub use provider::{EmailProvider, MockEmailProvider, SendResult, SmtpConfig, SmtpProvider};
pub use templates::{FileTemplateStore, InMemoryTemplateStore, TemplateRenderer, TemplateStore};
