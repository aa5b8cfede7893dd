//! The shipped templates render through the message composer

use domain_intake::{Document, MessageComposer, MonitorKind};
use email::{FileTemplateStore, TemplateRenderer};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates")
}

fn composer() -> MessageComposer {
    MessageComposer::new(TemplateRenderer::new(Arc::new(FileTemplateStore::new(
        templates_dir(),
    ))))
}

#[test]
fn test_confirmation_only_swaps_the_id_marker() {
    let source = std::fs::read_to_string(templates_dir().join("confirmation.template.html")).unwrap();
    assert!(source.matches("{{ id }}").count() >= 2);

    let doc = Document::from_json("abc123", json!({"notification": []}));
    let message = composer().compose(MonitorKind::Enrollment, &doc).unwrap();

    assert_eq!(message.body_html, source.replace("{{ id }}", "abc123"));
    assert!(!message.body_html.contains("{{ id }}"));
}

#[test]
fn test_every_notification_type_has_a_template() {
    let composer = composer();
    for kind in ["request_received", "new_request", "request_approved", "request_rejected"] {
        let doc = Document::from_json(
            "n1",
            json!({
                "type": kind,
                "name": "Oficina Lda",
                "adminEmail": "oficina@example.com",
                "adminPassword": "s3cret",
                "reason": "Documentação incompleta"
            }),
        );
        let message = composer.compose(MonitorKind::AdminNotifications, &doc).unwrap();

        assert!(message.subject.ends_with("- AEMC"), "{}", kind);
        assert!(message.body_html.contains("Oficina Lda"), "{}", kind);
        assert!(!message.body_html.contains("AiTECH"), "{}", kind);
    }
}

#[test]
fn test_contact_message_fills_all_markers() {
    let doc = Document::from_json(
        "m1",
        json!({"assunto": "Horários", "nome": "Rita", "email": "rita@example.com", "mensagem": "Bom dia"}),
    );
    let message = composer().compose(MonitorKind::ContactMessages, &doc).unwrap();

    for marker in ["aemcSubject", "aemcName", "aemcEmail", "aemcMessage"] {
        assert!(!message.body_html.contains(marker), "{}", marker);
    }
    assert!(message.body_html.contains("rita@example.com"));
}
