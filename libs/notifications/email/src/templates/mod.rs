//! Email template storage and marker substitution
//!
//! Templates are plain HTML files containing fixed marker tokens (for example
//! `{{ id }}` or `aemcName`). Rendering is literal find-and-replace of each
//! marker, applied in the order given; no escaping or templating language is
//! involved, so the output is the source file with the markers swapped out.

use crate::error::{EmailError, EmailResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Template store trait
pub trait TemplateStore: Send + Sync {
    /// Read the raw text of a template
    fn read(&self, name: &str) -> EmailResult<String>;
}

/// Templates read from a directory on disk on every render
#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateStore for FileTemplateStore {
    fn read(&self, name: &str) -> EmailResult<String> {
        let path = self.dir.join(name);
        std::fs::read_to_string(&path).map_err(|e| EmailError::TemplateNotFound {
            name: name.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

/// In-memory template store
#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<String, String>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.set(name, body);
        self
    }

    pub fn set(&self, name: impl Into<String>, body: impl Into<String>) {
        if let Ok(mut templates) = self.templates.write() {
            templates.insert(name.into(), body.into());
        }
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn read(&self, name: &str) -> EmailResult<String> {
        self.templates
            .read()
            .ok()
            .and_then(|templates| templates.get(name).cloned())
            .ok_or_else(|| EmailError::TemplateNotFound {
                name: name.to_string(),
                reason: "not registered".to_string(),
            })
    }
}

/// Renders templates from a [`TemplateStore`]
#[derive(Clone)]
pub struct TemplateRenderer {
    store: Arc<dyn TemplateStore>,
}

impl TemplateRenderer {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    /// Read `name` and replace every occurrence of each marker with its value
    pub fn render(&self, name: &str, markers: &[(&str, &str)]) -> EmailResult<String> {
        let raw = self.store.read(name)?;
        Ok(substitute(&raw, markers))
    }
}

/// Ordered literal replacement. Empty markers are ignored.
pub fn substitute(template: &str, markers: &[(&str, &str)]) -> String {
    markers
        .iter()
        .filter(|(marker, _)| !marker.is_empty())
        .fold(template.to_string(), |acc, (marker, value)| {
            acc.replace(marker, value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIRMATION: &str =
        "<html><body><p>Inscrição nº {{ id }}</p><a href=\"/s/{{ id }}\">ver</a></body></html>";

    #[test]
    fn test_render_replaces_every_occurrence_and_nothing_else() {
        let store = InMemoryTemplateStore::new().with("confirmation.template.html", CONFIRMATION);
        let renderer = TemplateRenderer::new(Arc::new(store));

        let out = renderer
            .render("confirmation.template.html", &[("{{ id }}", "abc123")])
            .unwrap();

        assert_eq!(
            out,
            "<html><body><p>Inscrição nº abc123</p><a href=\"/s/abc123\">ver</a></body></html>"
        );
    }

    #[test]
    fn test_substitute_applies_markers_in_order() {
        let out = substitute("Olá AiTECH (adminEmail)", &[("AiTECH", "Acme"), ("adminEmail", "x@y.pt")]);
        assert_eq!(out, "Olá Acme (x@y.pt)");
    }

    #[test]
    fn test_substitute_ignores_empty_marker() {
        assert_eq!(substitute("abc", &[("", "zzz")]), "abc");
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let renderer = TemplateRenderer::new(Arc::new(InMemoryTemplateStore::new()));
        let err = renderer.render("nope.html", &[]).unwrap_err();
        assert!(err.to_string().contains("nope.html"));
    }

    #[test]
    fn test_file_store_reads_from_directory() {
        let dir = std::env::temp_dir().join(format!("intake-templates-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("message.template.html"), "<p>aemcName</p>").unwrap();

        let renderer = TemplateRenderer::new(Arc::new(FileTemplateStore::new(&dir)));
        let out = renderer
            .render("message.template.html", &[("aemcName", "Maria")])
            .unwrap();
        assert_eq!(out, "<p>Maria</p>");

        let missing = renderer.render("other.html", &[]).unwrap_err();
        assert!(matches!(missing, EmailError::TemplateNotFound { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
