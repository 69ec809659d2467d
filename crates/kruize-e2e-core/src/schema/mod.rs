//! Structural JSON validation.
//!
//! A [`Schema`] is a small tagged union covering the subset of JSON Schema the
//! Kruize responses need: typed scalars, arrays with an item schema, and
//! objects with named properties, required-key sets and regex-keyed
//! `patternProperties` (used for timestamp-keyed recommendation maps).
//!
//! Validation is permissive: keys not declared in `properties` are tolerated,
//! optional keys may be absent, and an empty array satisfies any `items`
//! schema. Every violation found is reported with the path at which it
//! occurred; an empty list means the document conforms.

pub mod catalog;

use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{HarnessError, Result};

/// Expected shape of a JSON value.
#[derive(Debug, Clone)]
pub enum Schema {
    /// Accepts any value (`{}` or `true` in JSON Schema).
    Any,
    String,
    /// Any JSON number, integral or not.
    Number,
    Integer,
    Boolean,
    Array(ArraySchema),
    Object(ObjectSchema),
}

/// Array node: an optional schema applied to every element.
#[derive(Debug, Clone, Default)]
pub struct ArraySchema {
    pub items: Option<Box<Schema>>,
}

/// Object node.
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    properties: Vec<(String, Schema)>,
    required: Vec<String>,
    pattern_properties: Vec<PatternProperty>,
    /// When false (descriptor without `"type": "object"`), non-object values
    /// are accepted without descending.
    enforce_type: bool,
}

/// A `patternProperties` entry: every key matching `pattern` is validated
/// against `schema`.
#[derive(Debug, Clone)]
pub struct PatternProperty {
    pattern: Regex,
    schema: Schema,
}

impl PatternProperty {
    pub fn new(pattern: &str, schema: Schema) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| HarnessError::Schema(format!("invalid pattern '{pattern}': {e}")))?;
        Ok(Self { pattern, schema })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for ObjectSchema {
    fn default() -> Self {
        Self {
            properties: Vec::new(),
            required: Vec::new(),
            pattern_properties: Vec::new(),
            enforce_type: true,
        }
    }
}

impl ObjectSchema {
    /// Declare an optional property.
    pub fn property(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        let name = name.into();
        let schema = schema.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = schema,
            None => self.properties.push((name, schema)),
        }
        self
    }

    /// Declare a property and mark it required in one step.
    pub fn required_property(self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        let name = name.into();
        self.property(name.clone(), schema).required([name])
    }

    /// Add keys to the required set. Keys need not be declared as properties.
    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.required.contains(&name) {
                self.required.push(name);
            }
        }
        self
    }

    /// Add a regex-keyed child schema.
    pub fn pattern_property(mut self, pattern: &str, schema: impl Into<Schema>) -> Result<Self> {
        self.pattern_properties
            .push(PatternProperty::new(pattern, schema.into())?);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn required_keys(&self) -> &[String] {
        &self.required
    }

    pub fn pattern_properties(&self) -> &[PatternProperty] {
        &self.pattern_properties
    }
}

impl From<ObjectSchema> for Schema {
    fn from(value: ObjectSchema) -> Self {
        Schema::Object(value)
    }
}

impl From<ArraySchema> for Schema {
    fn from(value: ArraySchema) -> Self {
        Schema::Array(value)
    }
}

impl Schema {
    pub fn object() -> ObjectSchema {
        ObjectSchema::default()
    }

    pub fn array(items: impl Into<Schema>) -> Schema {
        Schema::Array(ArraySchema {
            items: Some(Box::new(items.into())),
        })
    }

    /// Array whose elements are unconstrained.
    pub fn any_array() -> Schema {
        Schema::Array(ArraySchema::default())
    }

    /// Object whose keys all match `pattern` and map to `values`.
    pub fn pattern_map(pattern: &str, values: impl Into<Schema>) -> Result<Schema> {
        Ok(Schema::object().pattern_property(pattern, values)?.into())
    }

    /// Name of the JSON type this node expects, as JSON Schema spells it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::String => "string",
            Schema::Number => "number",
            Schema::Integer => "integer",
            Schema::Boolean => "boolean",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
        }
    }

    /// Parse a JSON-schema-as-data descriptor.
    ///
    /// Recognises `type` (`object`, `array`, `string`, `number`, `integer`,
    /// `boolean`), `properties`, `items`, `required` and `patternProperties`.
    /// Other keywords are ignored. `{}` and `true` accept anything.
    pub fn from_json(descriptor: &Value) -> Result<Schema> {
        parse_descriptor(descriptor, "$")
    }

    /// Validate `value`, returning every violation found.
    pub fn validate(&self, value: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();
        walk(self, value, "$", &mut violations);
        violations
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate(value).is_empty()
    }
}

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// One structural mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location of the offending value, e.g. `$[0].kubernetes_objects[1].name`.
    pub path: String,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    MissingRequired(String),
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl Violation {
    pub fn new(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::MissingRequired(key) => {
                write!(f, "{}: missing required key '{key}'", self.path)
            }
            ViolationKind::TypeMismatch { expected, actual } => {
                write!(f, "{}: expected {expected}, found {actual}", self.path)
            }
        }
    }
}

/// Render violations as one message per line; empty string when valid.
pub fn error_message(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validate and turn violations into a [`HarnessError::SchemaViolation`].
pub fn ensure_valid(schema_name: &str, schema: &Schema, value: &Value) -> Result<()> {
    let violations = schema.validate(value);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::SchemaViolation {
            schema: schema_name.to_string(),
            violations,
        })
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn child_path(parent: &str, key: &str) -> String {
    let simple = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !key.starts_with(|c: char| c.is_ascii_digit());
    if simple {
        format!("{parent}.{key}")
    } else {
        format!("{parent}[{key:?}]")
    }
}

fn mismatch(path: &str, expected: &'static str, value: &Value, out: &mut Vec<Violation>) {
    out.push(Violation::new(
        path,
        ViolationKind::TypeMismatch {
            expected,
            actual: json_type_name(value),
        },
    ));
}

fn walk(schema: &Schema, value: &Value, path: &str, out: &mut Vec<Violation>) {
    match schema {
        Schema::Any => {}
        Schema::String => {
            if !value.is_string() {
                mismatch(path, "string", value, out);
            }
        }
        Schema::Number => {
            if !value.is_number() {
                mismatch(path, "number", value, out);
            }
        }
        Schema::Integer => {
            if !is_integral(value) {
                mismatch(path, "integer", value, out);
            }
        }
        Schema::Boolean => {
            if !value.is_boolean() {
                mismatch(path, "boolean", value, out);
            }
        }
        Schema::Array(array) => match value {
            Value::Array(elements) => {
                if let Some(items) = &array.items {
                    for (i, element) in elements.iter().enumerate() {
                        walk(items, element, &format!("{path}[{i}]"), out);
                    }
                }
            }
            other => mismatch(path, "array", other, out),
        },
        Schema::Object(object) => match value {
            Value::Object(map) => walk_object(object, map, path, out),
            other if object.enforce_type => mismatch(path, "object", other, out),
            _ => {}
        },
    }
}

fn walk_object(
    object: &ObjectSchema,
    map: &Map<String, Value>,
    path: &str,
    out: &mut Vec<Violation>,
) {
    for key in &object.required {
        if !map.contains_key(key) {
            out.push(Violation::new(
                path,
                ViolationKind::MissingRequired(key.clone()),
            ));
        }
    }

    for (name, child) in &object.properties {
        if let Some(child_value) = map.get(name) {
            walk(child, child_value, &child_path(path, name), out);
        }
    }

    if object.pattern_properties.is_empty() {
        return;
    }
    for (key, child_value) in map {
        for entry in &object.pattern_properties {
            if entry.pattern.is_match(key) {
                walk(&entry.schema, child_value, &child_path(path, key), out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor parsing
// ---------------------------------------------------------------------------

fn parse_descriptor(descriptor: &Value, path: &str) -> Result<Schema> {
    let map = match descriptor {
        Value::Bool(true) => return Ok(Schema::Any),
        Value::Object(map) => map,
        other => {
            return Err(HarnessError::Schema(format!(
                "{path}: schema node must be an object or `true`, found {}",
                json_type_name(other)
            )))
        }
    };

    let declared = match map.get("type") {
        None => None,
        Some(Value::String(t)) => Some(t.as_str()),
        Some(other) => {
            return Err(HarnessError::Schema(format!(
                "{path}: unsupported `type` value {other}"
            )))
        }
    };

    let looks_like_object = map.contains_key("properties")
        || map.contains_key("required")
        || map.contains_key("patternProperties");

    match declared {
        Some("string") => Ok(Schema::String),
        Some("number") => Ok(Schema::Number),
        Some("integer") => Ok(Schema::Integer),
        Some("boolean") => Ok(Schema::Boolean),
        Some("array") => {
            let items = match map.get("items") {
                Some(items) => Some(Box::new(parse_descriptor(items, &format!("{path}.items"))?)),
                None => None,
            };
            Ok(Schema::Array(ArraySchema { items }))
        }
        Some("object") => parse_object(map, path, true),
        None if looks_like_object => parse_object(map, path, false),
        None => Ok(Schema::Any),
        Some(other) => Err(HarnessError::Schema(format!(
            "{path}: unsupported type '{other}'"
        ))),
    }
}

fn parse_object(map: &Map<String, Value>, path: &str, enforce_type: bool) -> Result<Schema> {
    let mut object = ObjectSchema {
        enforce_type,
        ..ObjectSchema::default()
    };

    if let Some(properties) = map.get("properties") {
        let properties = properties.as_object().ok_or_else(|| {
            HarnessError::Schema(format!("{path}: `properties` must be an object"))
        })?;
        for (name, child) in properties {
            let child = parse_descriptor(child, &child_path(&format!("{path}.properties"), name))?;
            object = object.property(name.clone(), child);
        }
    }

    if let Some(required) = map.get("required") {
        let required = required.as_array().ok_or_else(|| {
            HarnessError::Schema(format!("{path}: `required` must be an array"))
        })?;
        let mut names = Vec::with_capacity(required.len());
        for name in required {
            let name = name.as_str().ok_or_else(|| {
                HarnessError::Schema(format!("{path}: `required` entries must be strings"))
            })?;
            names.push(name.to_string());
        }
        object = object.required(names);
    }

    if let Some(patterns) = map.get("patternProperties") {
        let patterns = patterns.as_object().ok_or_else(|| {
            HarnessError::Schema(format!("{path}: `patternProperties` must be an object"))
        })?;
        for (pattern, child) in patterns {
            let child = parse_descriptor(child, &format!("{path}.patternProperties[{pattern:?}]"))?;
            object = object.pattern_property(pattern, child)?;
        }
    }

    Ok(Schema::Object(object))
}

// ===========================================================================
// Tests
// ===========================================================================
