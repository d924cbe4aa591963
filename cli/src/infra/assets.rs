//! Built-in configuration template bodies compiled into the binary.

use include_dir::{Dir, include_dir};

use crate::application::ports::TemplateSource;

static EMBEDDED_TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// `TemplateSource` backed by the embedded `templates/` directory.
pub struct EmbeddedTemplates;

impl TemplateSource for EmbeddedTemplates {
    fn body(&self, file: &str) -> Option<String> {
        EMBEDDED_TEMPLATES
            .get_file(file)
            .and_then(|f| f.contents_utf8())
            .map(str::to_string)
    }
}
