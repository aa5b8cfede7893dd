//! Subject and body for each kind of record
//!
//! Bodies come from HTML templates with fixed marker tokens that are replaced
//! literally, in order. A payload value that is missing renders as the empty
//! string.

use email::TemplateRenderer;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::IntakeResult;
use crate::models::Document;
use crate::monitor::MonitorKind;

pub const ENROLLMENT_SUBJECT: &str = "Confirmação de Receção de Inscrição";
pub const ENROLLMENT_TEMPLATE: &str = "confirmation.template.html";

pub const CONTACT_SUBJECT: &str = "AEMC - Nova Mensagem";
pub const CONTACT_TEMPLATE: &str = "message.template.html";

/// Subject and body used for an unrecognized notification type
pub const FALLBACK_SUBJECT: &str = "AEMC";
pub const FALLBACK_BODY: &str = "AEMC";

/// Field of an admin notification that selects its message
pub const TYPE_FIELD: &str = "type";

/// A rendered message, ready to fan out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub subject: String,
    pub body_html: String,
}

/// Kinds of admin notification records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
    /// Sent to the applicant once the request is stored
    RequestReceived,
    /// Sent to the admins
    NewRequest,
    /// Carries the issued account credentials
    RequestApproved,
    RequestRejected,
}

impl NotificationType {
    pub fn subject(self) -> &'static str {
        match self {
            NotificationType::RequestReceived => "Pedido de Adesão Recebido - AEMC",
            NotificationType::NewRequest => "Novo Pedido de Adesão - AEMC",
            NotificationType::RequestApproved => "Pedido de Adesão Aprovado - AEMC",
            NotificationType::RequestRejected => "Pedido de Adesão Rejeitado - AEMC",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            NotificationType::RequestReceived => "requestmember.template.html",
            NotificationType::NewRequest => "requestadmin.template.html",
            NotificationType::RequestApproved => "responsemember.template.html",
            NotificationType::RequestRejected => "rejectmember.template.html",
        }
    }

    /// `(marker, payload field)` pairs, in replacement order
    pub fn markers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            NotificationType::RequestReceived | NotificationType::NewRequest => &[("AiTECH", "name")],
            NotificationType::RequestApproved => &[
                ("AiTECH", "name"),
                ("adminEmail", "adminEmail"),
                ("adminPassword", "adminPassword"),
            ],
            NotificationType::RequestRejected => &[("AiTECH", "name"), ("aemcReason", "reason")],
        }
    }
}

const CONTACT_MARKERS: &[(&str, &str)] = &[
    ("aemcSubject", "assunto"),
    ("aemcName", "nome"),
    ("aemcEmail", "email"),
    ("aemcMessage", "mensagem"),
];

/// Builds the message for a record of a given monitor
#[derive(Clone)]
pub struct MessageComposer {
    renderer: TemplateRenderer,
}

impl MessageComposer {
    pub fn new(renderer: TemplateRenderer) -> Self {
        Self { renderer }
    }

    /// Fails only when a template cannot be read
    pub fn compose(&self, kind: MonitorKind, document: &Document) -> IntakeResult<ComposedMessage> {
        match kind {
            MonitorKind::Enrollment => self.enrollment_confirmation(document),
            MonitorKind::ContactMessages => self.contact_message(document),
            MonitorKind::AdminNotifications => self.admin_notification(document),
        }
    }

    pub fn enrollment_confirmation(&self, document: &Document) -> IntakeResult<ComposedMessage> {
        let body_html = self
            .renderer
            .render(ENROLLMENT_TEMPLATE, &[("{{ id }}", document.id.as_str())])?;
        Ok(ComposedMessage {
            subject: ENROLLMENT_SUBJECT.to_string(),
            body_html,
        })
    }

    pub fn contact_message(&self, document: &Document) -> IntakeResult<ComposedMessage> {
        Ok(ComposedMessage {
            subject: CONTACT_SUBJECT.to_string(),
            body_html: self.render_fields(CONTACT_TEMPLATE, CONTACT_MARKERS, document)?,
        })
    }

    /// Dispatch on the record's `type`; unknown or missing types get the fallback
    pub fn admin_notification(&self, document: &Document) -> IntakeResult<ComposedMessage> {
        let kind = document
            .get_str(TYPE_FIELD)
            .and_then(|raw| raw.parse::<NotificationType>().ok());

        match kind {
            Some(kind) => Ok(ComposedMessage {
                subject: kind.subject().to_string(),
                body_html: self.render_fields(kind.template(), kind.markers(), document)?,
            }),
            None => Ok(ComposedMessage {
                subject: FALLBACK_SUBJECT.to_string(),
                body_html: FALLBACK_BODY.to_string(),
            }),
        }
    }

    fn render_fields(
        &self,
        template: &str,
        markers: &[(&str, &str)],
        document: &Document,
    ) -> IntakeResult<String> {
        let values: Vec<(&str, &str)> = markers
            .iter()
            .map(|(marker, field)| (*marker, document.get_str(field).unwrap_or_default()))
            .collect();
        Ok(self.renderer.render(template, &values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IntakeError;
    use email::InMemoryTemplateStore;
    use serde_json::json;
    use std::sync::Arc;

    fn composer() -> MessageComposer {
        let store = InMemoryTemplateStore::new()
            .with(ENROLLMENT_TEMPLATE, "<p>Inscrição {{ id }}</p><small>ref {{ id }}</small>")
            .with(CONTACT_TEMPLATE, "<h1>aemcSubject</h1><p>aemcName &lt;aemcEmail&gt;</p><p>aemcMessage</p>")
            .with("requestmember.template.html", "<p>Olá AiTECH, recebemos o seu pedido.</p>")
            .with("responsemember.template.html", "<p>AiTECH: adminEmail / adminPassword</p>")
            .with("rejectmember.template.html", "<p>AiTECH: aemcReason</p>");
        MessageComposer::new(TemplateRenderer::new(Arc::new(store)))
    }

    #[test]
    fn test_enrollment_confirmation() {
        let doc = Document::from_json("abc123", json!({"notification": []}));
        let message = composer().compose(MonitorKind::Enrollment, &doc).unwrap();

        assert_eq!(message.subject, "Confirmação de Receção de Inscrição");
        assert_eq!(message.body_html, "<p>Inscrição abc123</p><small>ref abc123</small>");
    }

    #[test]
    fn test_contact_message() {
        let doc = Document::from_json(
            "m1",
            json!({"assunto": "Horários", "nome": "Rita", "email": "rita@example.com", "mensagem": "Bom dia"}),
        );
        let message = composer().compose(MonitorKind::ContactMessages, &doc).unwrap();

        assert_eq!(message.subject, "AEMC - Nova Mensagem");
        assert_eq!(
            message.body_html,
            "<h1>Horários</h1><p>Rita &lt;rita@example.com&gt;</p><p>Bom dia</p>"
        );
    }

    #[test]
    fn test_approved_request_fills_credentials() {
        let doc = Document::from_json(
            "n1",
            json!({"type": "request_approved", "name": "Oficina Lda", "adminEmail": "oficina@example.com", "adminPassword": "s3cret"}),
        );
        let message = composer().compose(MonitorKind::AdminNotifications, &doc).unwrap();

        assert_eq!(message.subject, "Pedido de Adesão Aprovado - AEMC");
        assert_eq!(message.body_html, "<p>Oficina Lda: oficina@example.com / s3cret</p>");
    }

    #[test]
    fn test_missing_value_renders_empty() {
        let doc = Document::from_json("n2", json!({"type": "request_rejected", "name": "Oficina Lda"}));
        let message = composer().admin_notification(&doc).unwrap();

        assert_eq!(message.subject, "Pedido de Adesão Rejeitado - AEMC");
        assert_eq!(message.body_html, "<p>Oficina Lda: </p>");
    }

    #[test]
    fn test_unknown_type_falls_back_without_error() {
        let composer = composer();
        for doc in [
            Document::from_json("n3", json!({"type": "membership_expired"})),
            Document::from_json("n4", json!({})),
        ] {
            let message = composer.admin_notification(&doc).unwrap();
            assert_eq!(message.subject, "AEMC");
            assert!(!message.body_html.is_empty());
        }
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let doc = Document::from_json("n5", json!({"type": "new_request", "name": "X"}));
        let err = composer().admin_notification(&doc).unwrap_err();
        assert!(matches!(err, IntakeError::Template(_)));
    }

    #[test]
    fn test_notification_type_names() {
        assert_eq!(
            "request_received".parse::<NotificationType>().unwrap(),
            NotificationType::RequestReceived
        );
        assert_eq!(NotificationType::NewRequest.to_string(), "new_request");
    }
}
