//! Request payload generation.
//!
//! Valid payloads come from typed builders ([`experiment`], [`results`],
//! [`profiles`]). Negative cases that need a field blanked, nulled or
//! dropped go through the [`Renderer`], which fills an embedded tera
//! template from a [`TemplateVars`] map.
//!
//! ## Omitting keys
//!
//! A variable set to [`TemplateValue::Omit`] renders as [`OMIT_SENTINEL`].
//! After parsing, every object key and array element whose value is the
//! sentinel is removed. JSON `null` is a regular value and stays in place.

pub mod experiment;
pub mod profiles;
pub mod results;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;
use serde_json::Value;
use tera::{Context, Tera};
use tracing::debug;

use crate::error::{HarnessError, Result};

/// Placeholder value that marks a key for removal after rendering.
pub const OMIT_SENTINEL: &str = "__kruize_e2e_omit__";

pub const UPDATE_RESULTS_TEMPLATE: &str = "update_results.json";
pub const UPDATE_RESULTS_NAMESPACE_TEMPLATE: &str = "update_results_namespace.json";
pub const METRIC_PROFILE_TEMPLATE: &str = "metric_profile.json";
pub const METADATA_PROFILE_TEMPLATE: &str = "metadata_profile.json";

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Value bound to one template placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Value(Value),
    /// Drop the key (or array element) holding this placeholder.
    Omit,
}

impl TemplateValue {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Parse a CLI-style literal: `omit`, or JSON, or a bare string.
    pub fn parse_literal(raw: &str) -> Self {
        if raw == "omit" {
            return Self::Omit;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::Value(value),
            Err(_) => Self::Value(Value::String(raw.to_string())),
        }
    }
}

impl From<Value> for TemplateValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

/// Placeholder name → value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateVars {
    vars: BTreeMap<String, TemplateValue>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn omit(&mut self, name: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), TemplateValue::Omit);
        self
    }

    pub fn null(&mut self, name: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), TemplateValue::Value(Value::Null));
        self
    }

    pub fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.vars.get(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn to_context(&self) -> Context {
        let mut context = Context::new();
        for (name, value) in &self.vars {
            match value {
                TemplateValue::Value(v) => context.insert(name.as_str(), v),
                TemplateValue::Omit => context.insert(name.as_str(), OMIT_SENTINEL),
            }
        }
        context
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders named templates into JSON documents.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Renderer loaded with every embedded template.
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        for name in Templates::iter() {
            let file = Templates::get(&name).ok_or_else(|| HarnessError::Template {
                template: name.to_string(),
                message: "embedded template vanished".into(),
            })?;
            let source = std::str::from_utf8(&file.data).map_err(|e| HarnessError::Template {
                template: name.to_string(),
                message: e.to_string(),
            })?;
            tera.add_raw_template(&name, source)
                .map_err(|e| template_error(&name, &e))?;
        }
        Ok(Self { tera })
    }

    /// Register an additional template (or replace an embedded one).
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.tera
            .add_raw_template(name, source)
            .map_err(|e| template_error(name, &e))
    }

    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tera.get_template_names().collect();
        names.sort_unstable();
        names
    }

    /// Render `template` with `vars` and parse the result.
    ///
    /// Fails on an unknown template, an undefined placeholder, or output that
    /// is not JSON. Omitted keys are stripped from the parsed document.
    pub fn render(&self, template: &str, vars: &TemplateVars) -> Result<Value> {
        let text = self
            .tera
            .render(template, &vars.to_context())
            .map_err(|e| template_error(template, &e))?;
        let mut value: Value =
            serde_json::from_str(&text).map_err(|source| HarnessError::RenderedJson {
                template: template.to_string(),
                source,
            })?;
        strip_omitted(&mut value);
        debug!(template, vars = vars.len(), "rendered payload");
        Ok(value)
    }
}

fn template_error(template: &str, err: &tera::Error) -> HarnessError {
    // tera nests the useful part ("Variable `x` not found") in the source chain.
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    HarnessError::Template {
        template: template.to_string(),
        message,
    }
}

fn is_omitted(value: &Value) -> bool {
    value.as_str() == Some(OMIT_SENTINEL)
}

/// Remove every key and array element holding the omit sentinel.
pub fn strip_omitted(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !is_omitted(v));
            map.values_mut().for_each(strip_omitted);
        }
        Value::Array(items) => {
            items.retain(|v| !is_omitted(v));
            items.iter_mut().for_each(strip_omitted);
        }
        _ => {}
    }
}

/// Write `payload` as pretty JSON to `dir/file_name`, creating `dir`.
pub fn write_payload(dir: &Path, file_name: &str, payload: &Value) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, serde_json::to_string_pretty(payload)?)?;
    debug!(path = %path.display(), "wrote payload");
    Ok(path)
}

// ===========================================================================
// Tests
// ===========================================================================
