//! Prompt rendering for the generating stages.
//!
//! Instructions live in `assets/prompts.yaml` as Handlebars templates with
//! two helpers:
//! - join: Join an array with a separator
//! - humanize: Replace underscores with spaces (`saas_landing` → `saas landing`)

use handlebars::{handlebars_helper, Handlebars};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use sitesmith_core::{Result, SmithError};

const BUILTIN_PROMPTS: &str = include_str!("../assets/prompts.yaml");

static BUILTIN: OnceCell<PromptRenderer> = OnceCell::new();

pub const INTENT_SYSTEM: &str = "intent_system";
pub const DESIGN_SYSTEM: &str = "design_system";
pub const DESIGN_USER: &str = "design_user";
pub const CONTENT_SYSTEM: &str = "content_system";
pub const CONTENT_USER: &str = "content_user";
pub const CODEGEN_SYSTEM: &str = "codegen_system";
pub const CODEGEN_USER: &str = "codegen_user";
pub const ITERATE_SYSTEM: &str = "iterate_system";

/// Top-level prompts file structure
#[derive(Debug, Clone, Deserialize)]
pub struct PromptsFile {
    pub version: String,
    pub templates: HashMap<String, PromptTemplate>,
}

/// A single prompt definition
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    pub description: String,
    pub template: String,
}

handlebars_helper!(join: |items: array, sep: str| {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(sep)
});

handlebars_helper!(humanize: |text: str| text.replace('_', " "));

/// Compiled prompt templates
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl PromptRenderer {
    /// Compile every template in a prompts file
    pub fn new(file: PromptsFile) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text; nothing may be HTML-escaped.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_helper("join", Box::new(join));
        handlebars.register_helper("humanize", Box::new(humanize));

        for (name, prompt) in &file.templates {
            handlebars
                .register_template_string(name, &prompt.template)
                .map_err(|e| SmithError::Template(format!("{name}: {e}")))?;
        }

        Ok(Self { handlebars })
    }

    /// Parse and compile prompts from YAML content
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: PromptsFile = serde_yaml::from_str(yaml)
            .map_err(|e| SmithError::Template(format!("invalid prompts file: {e}")))?;
        Self::new(file)
    }

    /// The prompts compiled into the crate.
    pub fn builtin() -> Result<&'static PromptRenderer> {
        BUILTIN.get_or_try_init(|| Self::from_yaml(BUILTIN_PROMPTS))
    }

    /// Render a named template with data
    pub fn render(&self, name: &str, data: &Value) -> Result<String> {
        self.handlebars
            .render(name, data)
            .map_err(|e| SmithError::Template(format!("{name}: {e}")))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }
}

/// Renders a builtin template.
pub fn render(name: &str, data: &Value) -> Result<String> {
    PromptRenderer::builtin()?.render(name, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_templates_compile() {
        let renderer = PromptRenderer::builtin().unwrap();
        for name in [
            INTENT_SYSTEM,
            DESIGN_SYSTEM,
            DESIGN_USER,
            CONTENT_SYSTEM,
            CONTENT_USER,
            CODEGEN_SYSTEM,
            CODEGEN_USER,
            ITERATE_SYSTEM,
        ] {
            assert!(renderer.has_template(name), "missing {name}");
        }
    }

    #[test]
    fn test_helpers() {
        let yaml = r#"
version: "1.0"
templates:
  t:
    description: test
    template: "{{join items \", \"}} / {{humanize kind}}"
"#;
        let renderer = PromptRenderer::from_yaml(yaml).unwrap();
        let out = renderer
            .render("t", &json!({ "items": ["hero", "features", 3], "kind": "saas_landing" }))
            .unwrap();
        assert_eq!(out, "hero, features, 3 / saas landing");
    }

    #[test]
    fn test_markup_is_not_escaped() {
        let yaml = r#"
version: "1.0"
templates:
  t:
    description: test
    template: "{{value}}"
"#;
        let renderer = PromptRenderer::from_yaml(yaml).unwrap();
        let out = renderer.render("t", &json!({ "value": "<!DOCTYPE html> & \"quotes\"" })).unwrap();
        assert_eq!(out, "<!DOCTYPE html> & \"quotes\"");
    }

    #[test]
    fn test_invalid_template_rejected() {
        let yaml = r#"
version: "1.0"
templates:
  broken:
    description: test
    template: "{{#if open}}never closed"
"#;
        let err = PromptRenderer::from_yaml(yaml).err().unwrap();
        assert!(err.to_string().starts_with("TEMPLATE/broken"));
    }

    #[test]
    fn test_unknown_template() {
        assert!(render("nope", &json!({})).is_err());
    }
}
