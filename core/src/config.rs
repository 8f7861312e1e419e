//! Configuration model: built-in profiles, the merge law used to layer user
//! overrides on top of them, and validation into a compiled [`Config`].

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::classify::{EntityKind, SplitStrategy};
use crate::parser::ParseOptions;
use crate::rules::Rule;

const DEFAULT_PROFILE_JSON: &str = include_str!("../profiles/default.json");
const SPEC_PROFILE_JSON: &str = include_str!("../profiles/spec.json");

/// Names of the profiles shipped with the crate.
pub const BUILTIN_PROFILES: &[&str] = &["default", "spec"];

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(name)
    }
}

/// Problem found while building a [`Config`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown profile `{0}`")]
    UnknownProfile(String),
    #[error("malformed config document: {0}")]
    Malformed(String),
    #[error("invalid FILE_EXTENSION_SPLIT `{0}` (expected `firstDot` or `lastDot`)")]
    InvalidSplit(String),
    #[error("NAME_TYPES.{id}: {reason}")]
    MalformedNameType { id: String, reason: String },
    #[error("NAME_TYPES.{id}: invalid pattern: {message}")]
    InvalidPattern { id: String, message: String },
    #[error("NAME_TYPES.{id}: example `{example}` does not match its own pattern")]
    ExampleMismatch { id: String, example: String },
    #[error("ENTITY_NAME_TYPES: unknown entity `{0}` (expected ROOT, DIR, FILE, or META)")]
    UnknownEntity(String),
    #[error("ENTITY_NAME_TYPES.{entity} references undefined NAME_TYPE `{id}`")]
    UnknownNameType { entity: String, id: String },
    #[error("RULES: unknown rule `{0}`")]
    UnknownRule(String),
    #[error("RULES.{rule}: {reason}")]
    MalformedRule { rule: String, reason: String },
    #[error("SPEC: {0}")]
    MalformedSpec(String),
}

/// Every problem found in one configuration, reported together.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", format_errors(.0))]
pub struct ConfigErrors(pub Vec<ConfigError>);

fn format_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<ConfigError> for ConfigErrors {
    fn from(err: ConfigError) -> Self {
        ConfigErrors(vec![err])
    }
}

/// A compiled naming-style pattern.
#[derive(Debug, Clone)]
pub struct NameType {
    pub id: String,
    pub pattern: String,
    regex: Regex,
    pub word_delimiter: Option<char>,
    pub allowed_version_delimiters: Vec<char>,
    pub examples: Vec<String>,
}

impl NameType {
    /// Full-match test of a bare name against this style.
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

#[derive(Debug, Deserialize)]
struct NameTypeDef {
    pattern: String,
    #[serde(default)]
    word_delimiter: Option<String>,
    #[serde(default)]
    allowed_version_delimiters: Vec<String>,
    #[serde(default)]
    examples: Vec<String>,
}

/// Per-rule toggle, severity, and free-form options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSetting {
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
    pub options: Map<String, Value>,
}

/// Expected header values and root label enforced under the `spec` profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecExpectations {
    pub root_base: String,
    pub style: String,
    pub name_type: Vec<(String, String)>,
    pub separation_delimiters: Vec<String>,
}

/// Effective, validated configuration. Read-only once built.
#[derive(Debug, Clone)]
pub struct Config {
    pub profile: String,
    pub split: SplitStrategy,
    pub name_types: Vec<NameType>,
    pub entity_name_types: BTreeMap<EntityKind, Vec<String>>,
    pub rules: BTreeMap<Rule, RuleSetting>,
    pub rules_default: bool,
    pub spec: SpecExpectations,
}

impl Default for Config {
    fn default() -> Self {
        Config::builtin("default").expect("built-in default profile is valid")
    }
}

impl Config {
    /// Built-in profile without user overrides.
    pub fn builtin(profile: &str) -> Result<Self, ConfigErrors> {
        load_effective_config(Some(profile), None)
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigErrors> {
        let value = normalize_document(value.clone());
        let Value::Object(root) = &value else {
            return Err(ConfigError::Malformed("top level must be an object".into()).into());
        };
        let mut errors = Vec::new();

        let profile = root
            .get("profile")
            .or_else(|| root.get("ptree"))
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();

        let split = match root.get("FILE_EXTENSION_SPLIT") {
            None | Some(Value::Null) => SplitStrategy::default(),
            Some(Value::String(name)) => SplitStrategy::from_name(name).unwrap_or_else(|| {
                errors.push(ConfigError::InvalidSplit(name.clone()));
                SplitStrategy::default()
            }),
            Some(other) => {
                errors.push(ConfigError::InvalidSplit(other.to_string()));
                SplitStrategy::default()
            }
        };

        let name_types = compile_name_types(root.get("NAME_TYPES"), &mut errors);
        let entity_name_types =
            compile_entity_name_types(root.get("ENTITY_NAME_TYPES"), &name_types, &mut errors);
        let (rules, rules_default) = compile_rules(root.get("RULES"), &mut errors);
        let spec = compile_spec(root.get("SPEC"), &mut errors);

        if !errors.is_empty() {
            return Err(ConfigErrors(errors));
        }
        Ok(Self {
            profile,
            split,
            name_types,
            entity_name_types,
            rules,
            rules_default,
            spec,
        })
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions { split: self.split }
    }

    pub fn name_type(&self, id: &str) -> Option<&NameType> {
        self.name_types.iter().find(|nt| nt.id == id)
    }

    /// Allowed NAME_TYPE ids for an entity, in preference order.
    pub fn allowed_name_types(&self, kind: EntityKind) -> &[String] {
        self.entity_name_types
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn rule_enabled(&self, rule: Rule) -> bool {
        self.rules
            .get(&rule)
            .and_then(|setting| setting.enabled)
            .unwrap_or(self.rules_default)
    }

    pub fn rule_severity(&self, rule: Rule) -> Severity {
        self.rules
            .get(&rule)
            .and_then(|setting| setting.severity)
            .unwrap_or(Severity::Warning)
    }

    pub fn rule_flag(&self, rule: Rule, option: &str, default: bool) -> bool {
        self.rules
            .get(&rule)
            .and_then(|setting| setting.options.get(option))
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }
}

/// Built-in profile document. `spec` is layered over `default`.
pub fn builtin_profile(name: &str) -> Result<Value, ConfigError> {
    let default = parse_embedded(DEFAULT_PROFILE_JSON, "default")?;
    match name {
        "default" => Ok(default),
        "spec" => {
            let spec = parse_embedded(SPEC_PROFILE_JSON, "spec")?;
            Ok(merge(&default, &spec))
        }
        other => Err(ConfigError::UnknownProfile(other.to_string())),
    }
}

fn parse_embedded(text: &str, name: &str) -> Result<Value, ConfigError> {
    serde_json::from_str(text)
        .map(normalize_document)
        .map_err(|e| ConfigError::Malformed(format!("built-in profile `{name}`: {e}")))
}

/// Merges the built-in profile with an optional user document.
///
/// The profile is the explicit argument, else the override's `profile`
/// field, else its `ptree` field, else `default`.
pub fn load_effective_config(
    profile: Option<&str>,
    user: Option<&Value>,
) -> Result<Config, ConfigErrors> {
    let user = user.cloned().map(normalize_document);
    let requested = profile
        .map(str::to_string)
        .or_else(|| {
            user.as_ref().and_then(|doc| {
                doc.get("profile")
                    .or_else(|| doc.get("ptree"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| "default".to_string());
    debug!(profile = %requested, has_override = user.is_some(), "resolving config");

    let base = builtin_profile(&requested)?;
    let mut shape_errors = user
        .as_ref()
        .map(|doc| check_override_shapes(&base, doc))
        .unwrap_or_default();
    let mut merged = match &user {
        Some(doc) => merge(&base, doc),
        None => base,
    };
    if let Value::Object(map) = &mut merged {
        map.insert("profile".into(), Value::String(requested));
    }
    match Config::from_value(&merged) {
        Ok(cfg) if shape_errors.is_empty() => Ok(cfg),
        Ok(_) => Err(ConfigErrors(shape_errors)),
        Err(ConfigErrors(mut errors)) => {
            shape_errors.append(&mut errors);
            Err(ConfigErrors(shape_errors))
        }
    }
}

/// Shapes that [`merge`] would silently drop because the built-in side holds
/// an object at the same position.
fn check_override_shapes(base: &Value, doc: &Value) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let Value::Object(root) = doc else {
        errors.push(ConfigError::Malformed("override must be an object".into()));
        return errors;
    };
    if let Value::Object(base_root) = base {
        check_object_positions(base_root, root, "", &mut errors);
    }
    if let Some(Value::Object(rules)) = root.get("RULES") {
        for (key, value) in rules {
            if key == "default" || Rule::from_code(key).is_none() || value.is_object() {
                continue;
            }
            errors.push(ConfigError::MalformedRule {
                rule: key.clone(),
                reason: format!(
                    "expected a boolean, a severity name, `off`, or an object; found {value}"
                ),
            });
        }
    }
    if let Some(Value::Object(types)) = root.get("NAME_TYPES") {
        for (id, value) in types {
            if !value.is_object() {
                errors.push(ConfigError::MalformedNameType {
                    id: id.clone(),
                    reason: "definition must be an object".into(),
                });
            }
        }
    }
    errors
}

/// Reports every override position holding a non-object where `base` holds
/// an object. Direct entries of `RULES` and `NAME_TYPES` are reported by
/// [`check_override_shapes`] with their own error kinds.
fn check_object_positions(
    base: &Map<String, Value>,
    overlay: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<ConfigError>,
) {
    for (key, value) in overlay {
        let Some(Value::Object(base_child)) = base.get(key) else {
            continue;
        };
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        match value {
            Value::Object(overlay_child) => {
                check_object_positions(base_child, overlay_child, &child_path, errors)
            }
            _ if matches!(path, "RULES" | "NAME_TYPES") => {}
            _ => errors.push(ConfigError::Malformed(format!(
                "{child_path} must be an object; found {value}"
            ))),
        }
    }
}

/// Deep merge of two config documents.
///
/// Objects merge key-wise. An object meeting a non-object keeps the object;
/// two non-objects resolve to `overlay`. Arrays are replaced wholesale.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut out = base_map.clone();
            for (key, value) in overlay_map {
                let merged = match out.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Object(_), _) => base.clone(),
        _ => overlay.clone(),
    }
}

/// Rewrites `RULES` shorthands into object form so they merge key-wise:
/// `true`/`false` set `enabled`, a severity name sets `severity`, `off`
/// disables.
pub fn normalize_document(mut value: Value) -> Value {
    if let Some(Value::Object(rules)) = value.get_mut("RULES") {
        for (key, setting) in rules.iter_mut() {
            if key == "default" {
                continue;
            }
            let replacement = match setting {
                Value::Bool(enabled) => Some(serde_json::json!({ "enabled": *enabled })),
                Value::String(name) if name == "off" => {
                    Some(serde_json::json!({ "enabled": false }))
                }
                Value::String(name) if Severity::from_name(name).is_some() => {
                    Some(serde_json::json!({ "severity": name }))
                }
                _ => None,
            };
            if let Some(replacement) = replacement {
                *setting = replacement;
            }
        }
    }
    value
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

fn compile_name_types(value: Option<&Value>, errors: &mut Vec<ConfigError>) -> Vec<NameType> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Value::Object(entries) = value else {
        errors.push(ConfigError::Malformed("NAME_TYPES must be an object".into()));
        return Vec::new();
    };

    let mut out = Vec::new();
    for (id, raw) in entries {
        let def: NameTypeDef = match serde_json::from_value(raw.clone()) {
            Ok(def) => def,
            Err(e) => {
                errors.push(ConfigError::MalformedNameType {
                    id: id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let regex = match Regex::new(&format!("^(?:{})$", def.pattern)) {
            Ok(regex) => regex,
            Err(e) => {
                errors.push(ConfigError::InvalidPattern {
                    id: id.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };
        let word_delimiter = match def.word_delimiter.as_deref() {
            None | Some("") => None,
            Some(text) => match single_char(text) {
                Some(ch) => Some(ch),
                None => {
                    errors.push(ConfigError::MalformedNameType {
                        id: id.clone(),
                        reason: format!("word_delimiter `{text}` must be a single character"),
                    });
                    continue;
                }
            },
        };
        let mut allowed_version_delimiters = Vec::new();
        for text in &def.allowed_version_delimiters {
            match single_char(text) {
                Some(ch) => allowed_version_delimiters.push(ch),
                None => errors.push(ConfigError::MalformedNameType {
                    id: id.clone(),
                    reason: format!("version delimiter `{text}` must be a single character"),
                }),
            }
        }
        for example in &def.examples {
            if !regex.is_match(example) {
                errors.push(ConfigError::ExampleMismatch {
                    id: id.clone(),
                    example: example.clone(),
                });
            }
        }
        out.push(NameType {
            id: id.clone(),
            pattern: def.pattern,
            regex,
            word_delimiter,
            allowed_version_delimiters,
            examples: def.examples,
        });
    }
    out
}

fn compile_entity_name_types(
    value: Option<&Value>,
    registry: &[NameType],
    errors: &mut Vec<ConfigError>,
) -> BTreeMap<EntityKind, Vec<String>> {
    let mut out = BTreeMap::new();
    let Some(value) = value else {
        return out;
    };
    let Value::Object(entries) = value else {
        errors.push(ConfigError::Malformed("ENTITY_NAME_TYPES must be an object".into()));
        return out;
    };
    for (entity, ids) in entries {
        let kind = match entity.as_str() {
            "ROOT" => EntityKind::Root,
            "DIR" => EntityKind::Dir,
            "FILE" => EntityKind::File,
            "META" => EntityKind::Meta,
            _ => {
                errors.push(ConfigError::UnknownEntity(entity.clone()));
                continue;
            }
        };
        let Value::Array(items) = ids else {
            errors.push(ConfigError::Malformed(format!(
                "ENTITY_NAME_TYPES.{entity} must be a list of NAME_TYPE ids"
            )));
            continue;
        };
        let mut list = Vec::new();
        for item in items {
            let Some(id) = item.as_str() else {
                errors.push(ConfigError::Malformed(format!(
                    "ENTITY_NAME_TYPES.{entity} entries must be strings"
                )));
                continue;
            };
            if !registry.iter().any(|nt| nt.id == id) {
                errors.push(ConfigError::UnknownNameType {
                    entity: entity.clone(),
                    id: id.to_string(),
                });
                continue;
            }
            list.push(id.to_string());
        }
        out.insert(kind, list);
    }
    out
}

fn compile_rules(
    value: Option<&Value>,
    errors: &mut Vec<ConfigError>,
) -> (BTreeMap<Rule, RuleSetting>, bool) {
    let mut out = BTreeMap::new();
    let mut default_enabled = true;
    let Some(value) = value else {
        return (out, default_enabled);
    };
    let Value::Object(entries) = value else {
        errors.push(ConfigError::Malformed("RULES must be an object".into()));
        return (out, default_enabled);
    };
    for (key, raw) in entries {
        if key == "default" {
            match raw {
                Value::Bool(enabled) => default_enabled = *enabled,
                other => errors.push(ConfigError::MalformedRule {
                    rule: key.clone(),
                    reason: format!("expected a boolean, found {other}"),
                }),
            }
            continue;
        }
        let Some(rule) = Rule::from_code(key) else {
            errors.push(ConfigError::UnknownRule(key.clone()));
            continue;
        };
        let Value::Object(fields) = raw else {
            errors.push(ConfigError::MalformedRule {
                rule: key.clone(),
                reason: format!(
                    "expected a boolean, a severity name, `off`, or an object; found {raw}"
                ),
            });
            continue;
        };
        let mut setting = RuleSetting::default();
        for (field, field_value) in fields {
            match field.as_str() {
                "enabled" => match field_value {
                    Value::Bool(enabled) => setting.enabled = Some(*enabled),
                    other => errors.push(ConfigError::MalformedRule {
                        rule: key.clone(),
                        reason: format!("`enabled` must be a boolean, found {other}"),
                    }),
                },
                "severity" => match field_value.as_str().and_then(Severity::from_name) {
                    Some(severity) => setting.severity = Some(severity),
                    None => errors.push(ConfigError::MalformedRule {
                        rule: key.clone(),
                        reason: format!(
                            "`severity` must be error, warning, or info; found {field_value}"
                        ),
                    }),
                },
                _ => {
                    setting.options.insert(field.clone(), field_value.clone());
                }
            }
        }
        out.insert(rule, setting);
    }
    (out, default_enabled)
}

fn compile_spec(value: Option<&Value>, errors: &mut Vec<ConfigError>) -> SpecExpectations {
    let mut spec = SpecExpectations::default();
    let Some(value) = value else {
        return spec;
    };
    let Value::Object(fields) = value else {
        errors.push(ConfigError::MalformedSpec("must be an object".into()));
        return spec;
    };
    for (field, raw) in fields {
        match field.as_str() {
            "root_base" | "style" => {
                let Some(text) = raw.as_str() else {
                    errors.push(ConfigError::MalformedSpec(format!("`{field}` must be a string")));
                    continue;
                };
                if field == "root_base" {
                    spec.root_base = text.to_string();
                } else {
                    spec.style = text.to_string();
                }
            }
            "name_type" => match raw {
                Value::Object(mapping) => {
                    for (entity, id) in mapping {
                        match id.as_str() {
                            Some(id) => spec.name_type.push((entity.clone(), id.to_string())),
                            None => errors.push(ConfigError::MalformedSpec(format!(
                                "`name_type.{entity}` must be a string"
                            ))),
                        }
                    }
                }
                _ => errors.push(ConfigError::MalformedSpec(
                    "`name_type` must be an object".into(),
                )),
            },
            "separation_delimiters" => match raw {
                Value::Array(items) => {
                    for item in items {
                        match item.as_str() {
                            Some(text) => spec.separation_delimiters.push(text.to_string()),
                            None => errors.push(ConfigError::MalformedSpec(
                                "`separation_delimiters` entries must be strings".into(),
                            )),
                        }
                    }
                }
                _ => errors.push(ConfigError::MalformedSpec(
                    "`separation_delimiters` must be a list".into(),
                )),
            },
            _ => {}
        }
    }
    spec
}
