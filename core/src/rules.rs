//! Rule engine: evaluates the PT000–PT015 catalogue against a parsed
//! [`Document`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::classify::{
    bare_name, compare_siblings, find_any_name_type, find_matching_name_type, is_strict_semver,
    naming_subject, split_file, split_version, strip_name_prefixes, EntityKind,
};
use crate::config::{Config, Severity};
use crate::parser::{parse_bracket_list, parse_bracket_mapping, Directive, Document, RootKind};

/// Legacy misspelling still accepted for `@separation_delimiters`.
pub const LEGACY_SEPARATION_KEY: &str = "seperation_delimiters";
pub const SEPARATION_KEY: &str = "separation_delimiters";

/// Rule identifiers; serialized as their `PTxxx` code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    #[serde(rename = "PT000")]
    ParseError,
    #[serde(rename = "PT001")]
    RootLine,
    #[serde(rename = "PT002")]
    ParentIsDirectory,
    #[serde(rename = "PT003")]
    PtreeDirective,
    #[serde(rename = "PT004")]
    NameType,
    #[serde(rename = "PT005")]
    VersionDelimiter,
    #[serde(rename = "PT006")]
    NoSpaces,
    #[serde(rename = "PT007")]
    ExtensionCase,
    #[serde(rename = "PT008")]
    MixedDelimiters,
    #[serde(rename = "PT009")]
    SiblingOrder,
    #[serde(rename = "PT010")]
    SpecPtree,
    #[serde(rename = "PT011")]
    SpecStyle,
    #[serde(rename = "PT012")]
    SpecVersion,
    #[serde(rename = "PT013")]
    SpecNameType,
    #[serde(rename = "PT014")]
    SpecSeparationDelimiters,
    #[serde(rename = "PT015")]
    SpecRootLabel,
}

impl Rule {
    pub const ALL: [Rule; 16] = [
        Rule::ParseError,
        Rule::RootLine,
        Rule::ParentIsDirectory,
        Rule::PtreeDirective,
        Rule::NameType,
        Rule::VersionDelimiter,
        Rule::NoSpaces,
        Rule::ExtensionCase,
        Rule::MixedDelimiters,
        Rule::SiblingOrder,
        Rule::SpecPtree,
        Rule::SpecStyle,
        Rule::SpecVersion,
        Rule::SpecNameType,
        Rule::SpecSeparationDelimiters,
        Rule::SpecRootLabel,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Rule::ParseError => "PT000",
            Rule::RootLine => "PT001",
            Rule::ParentIsDirectory => "PT002",
            Rule::PtreeDirective => "PT003",
            Rule::NameType => "PT004",
            Rule::VersionDelimiter => "PT005",
            Rule::NoSpaces => "PT006",
            Rule::ExtensionCase => "PT007",
            Rule::MixedDelimiters => "PT008",
            Rule::SiblingOrder => "PT009",
            Rule::SpecPtree => "PT010",
            Rule::SpecStyle => "PT011",
            Rule::SpecVersion => "PT012",
            Rule::SpecNameType => "PT013",
            Rule::SpecSeparationDelimiters => "PT014",
            Rule::SpecRootLabel => "PT015",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Rule::ALL.iter().copied().find(|rule| rule.code() == code)
    }

    /// Rules that only run when the resolved profile is `spec`.
    pub fn spec_only(self) -> bool {
        matches!(
            self,
            Rule::SpecPtree
                | Rule::SpecStyle
                | Rule::SpecVersion
                | Rule::SpecNameType
                | Rule::SpecSeparationDelimiters
                | Rule::SpecRootLabel
        )
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Diagnostic emitted by [`validate`]. Lines are 1-based, columns 0-based
/// with an exclusive end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LintMessage {
    pub code: Rule,
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub start_col: usize,
    pub end_col: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Forces the profile used to gate PT010–PT015.
    pub profile: Option<String>,
}

/// Explicit override, else `@ptree: spec`, else the config's own profile.
pub fn resolve_profile(doc: &Document, cfg: &Config, explicit: Option<&str>) -> String {
    if let Some(profile) = explicit {
        return profile.to_string();
    }
    if doc.directive("ptree") == Some("spec") {
        return "spec".to_string();
    }
    cfg.profile.clone()
}

pub fn validate(doc: &Document, cfg: &Config) -> Vec<LintMessage> {
    validate_with(doc, cfg, &ValidateOptions::default())
}

pub fn validate_with(doc: &Document, cfg: &Config, options: &ValidateOptions) -> Vec<LintMessage> {
    let profile = resolve_profile(doc, cfg, options.profile.as_deref());
    let mut checker = Checker {
        doc,
        cfg,
        messages: Vec::new(),
    };
    let spec_mode = profile == "spec";

    for rule in Rule::ALL {
        if !cfg.rule_enabled(rule) || (rule.spec_only() && !spec_mode) {
            continue;
        }
        match rule {
            Rule::ParseError => checker.parse_errors(),
            Rule::RootLine => checker.root_line(),
            Rule::ParentIsDirectory => checker.parent_is_directory(),
            Rule::PtreeDirective => checker.ptree_directive(),
            Rule::NameType => checker.name_types(),
            Rule::VersionDelimiter => checker.version_delimiters(),
            Rule::NoSpaces => checker.no_spaces(),
            Rule::ExtensionCase => checker.extension_case(),
            Rule::MixedDelimiters => checker.mixed_delimiters(),
            Rule::SiblingOrder => checker.sibling_order(),
            Rule::SpecPtree => checker.spec_ptree(),
            Rule::SpecStyle => checker.spec_style(),
            Rule::SpecVersion => checker.spec_version(),
            Rule::SpecNameType => checker.spec_name_type(),
            Rule::SpecSeparationDelimiters => checker.spec_separation_delimiters(),
            Rule::SpecRootLabel => checker.spec_root_label(),
        }
    }

    let mut messages = checker.messages;
    messages.sort_by(|a, b| {
        (a.line, a.start_col, a.code).cmp(&(b.line, b.start_col, b.code))
    });
    messages
}

/// A root label or node name together with its span.
struct NamedEntity<'a> {
    kind: EntityKind,
    name: &'a str,
    line: usize,
    start_col: usize,
    end_col: usize,
}

struct Checker<'a> {
    doc: &'a Document,
    cfg: &'a Config,
    messages: Vec<LintMessage>,
}

impl<'a> Checker<'a> {
    fn push(&mut self, rule: Rule, line: usize, span: (usize, usize), message: String) {
        let severity = if rule == Rule::ParseError {
            Severity::Warning
        } else {
            self.cfg.rule_severity(rule)
        };
        self.messages.push(LintMessage {
            code: rule,
            severity,
            message,
            line,
            start_col: span.0,
            end_col: span.1,
        });
    }

    /// Anchors document-level findings on line 1 when nothing better exists.
    fn push_header(&mut self, rule: Rule, directive: Option<&Directive>, message: String) {
        match directive {
            Some(d) => self.push(rule, d.line, (d.key_start_col, d.value_end_col), message),
            None => self.push(rule, 1, (0, 0), message),
        }
    }

    fn entities(&self) -> Vec<NamedEntity<'a>> {
        let mut out = Vec::new();
        if let Some(root) = &self.doc.root {
            if root.kind == RootKind::RootLabel {
                out.push(NamedEntity {
                    kind: EntityKind::Root,
                    name: root.value.as_str(),
                    line: root.line,
                    start_col: root.start_col,
                    end_col: root.end_col,
                });
            }
        }
        out.extend(self.doc.nodes.iter().map(|node| NamedEntity {
            kind: node.kind(),
            name: node.name.as_str(),
            line: node.line,
            start_col: node.start_col,
            end_col: node.end_col,
        }));
        out
    }

    /// Bare name, or the stem for files.
    fn name_source(&self, entity: &NamedEntity<'_>) -> String {
        let bare = bare_name(entity.name);
        if entity.kind == EntityKind::File {
            split_file(bare, self.cfg.split).stem
        } else {
            bare.to_string()
        }
    }

    fn parse_errors(&mut self) {
        for err in &self.doc.errors {
            self.push(
                Rule::ParseError,
                err.line,
                (err.start_col, err.end_col),
                err.message.clone(),
            );
        }
    }

    fn root_line(&mut self) {
        let require_label = self.cfg.rule_flag(Rule::RootLine, "require_label", true);
        match &self.doc.root {
            None => self.push(
                Rule::RootLine,
                1,
                (0, 0),
                "Missing root line (e.g. `PROJECT//`)".into(),
            ),
            Some(root) if require_label && root.kind == RootKind::RootPath => self.push(
                Rule::RootLine,
                root.line,
                (root.start_col, root.end_col),
                format!("Root `{}` should be a label ending in `//`", root.value),
            ),
            Some(_) => {}
        }
    }

    fn parent_is_directory(&mut self) {
        let doc = self.doc;
        for node in &doc.nodes {
            if node.has_children && node.kind() == EntityKind::File {
                self.push(
                    Rule::ParentIsDirectory,
                    node.line,
                    (node.start_col, node.end_col),
                    format!("`{}` has children and must end with `/`", node.name),
                );
            }
        }
    }

    fn ptree_directive(&mut self) {
        if self.doc.directive("ptree").is_none() {
            self.push(
                Rule::PtreeDirective,
                1,
                (0, 0),
                "Missing `@ptree` directive".into(),
            );
        }
    }

    fn name_types(&mut self) {
        let cfg = self.cfg;
        for entity in self.entities() {
            let allowed = cfg.allowed_name_types(entity.kind);
            if allowed.is_empty() {
                continue;
            }
            let source = self.name_source(&entity);
            let Some(subject) = naming_subject(&source) else {
                continue;
            };
            if find_matching_name_type(&subject, allowed, &cfg.name_types).is_some() {
                continue;
            }
            let list = allowed.join(", ");
            let message = match find_any_name_type(&subject, &cfg.name_types) {
                Some(found) => format!(
                    "{} name `{subject}` is {}, but {} names must be one of: {list}",
                    entity.kind, found.id, entity.kind
                ),
                None => format!(
                    "{} name `{subject}` does not match any allowed NAME_TYPE ({list})",
                    entity.kind
                ),
            };
            self.push(
                Rule::NameType,
                entity.line,
                (entity.start_col, entity.end_col),
                message,
            );
        }
    }

    fn version_delimiters(&mut self) {
        let cfg = self.cfg;
        for entity in self.entities() {
            let source = self.name_source(&entity);
            let split = split_version(strip_name_prefixes(&source));
            let (Some(delimiter), Some(version)) = (split.delimiter, split.version.as_deref())
            else {
                continue;
            };
            let allowed = cfg.allowed_name_types(entity.kind);
            let Some(name_type) =
                find_matching_name_type(&split.base, allowed, &cfg.name_types)
                    .or_else(|| find_any_name_type(&split.base, &cfg.name_types))
            else {
                continue;
            };
            let span = (entity.start_col, entity.end_col);
            if name_type.word_delimiter == Some(delimiter) {
                self.push(
                    Rule::VersionDelimiter,
                    entity.line,
                    span,
                    format!(
                        "Version `{version}` is joined with `{delimiter}`, which is the word delimiter of {}",
                        name_type.id
                    ),
                );
            } else if !name_type.allowed_version_delimiters.contains(&delimiter) {
                let allowed: Vec<String> = name_type
                    .allowed_version_delimiters
                    .iter()
                    .map(|ch| format!("`{ch}`"))
                    .collect();
                self.push(
                    Rule::VersionDelimiter,
                    entity.line,
                    span,
                    format!(
                        "Version delimiter `{delimiter}` is not allowed for {} (allowed: {})",
                        name_type.id,
                        if allowed.is_empty() {
                            "none".to_string()
                        } else {
                            allowed.join(", ")
                        }
                    ),
                );
            }
        }
    }

    fn no_spaces(&mut self) {
        let doc = self.doc;
        for node in &doc.nodes {
            if node.name.contains(' ') {
                self.push(
                    Rule::NoSpaces,
                    node.line,
                    (node.start_col, node.end_col),
                    format!("`{}` contains spaces", node.name),
                );
            }
        }
    }

    fn extension_case(&mut self) {
        let doc = self.doc;
        for node in &doc.nodes {
            if node.kind() != EntityKind::File {
                continue;
            }
            let split = split_file(node.bare_name(), self.cfg.split);
            let Some(last) = split.extensions.last() else {
                continue;
            };
            let lower = last.to_lowercase();
            if *last != lower {
                self.push(
                    Rule::ExtensionCase,
                    node.line,
                    (node.start_col, node.end_col),
                    format!("Extension `.{last}` should be lowercase (`.{lower}`)"),
                );
            }
        }
    }

    fn mixed_delimiters(&mut self) {
        for entity in self.entities() {
            let source = self.name_source(&entity);
            let base = split_version(strip_name_prefixes(&source)).base;
            if base.contains('-') && base.contains('_') {
                self.push(
                    Rule::MixedDelimiters,
                    entity.line,
                    (entity.start_col, entity.end_col),
                    format!("`{base}` mixes `-` and `_` word delimiters"),
                );
            }
        }
    }

    fn sibling_order(&mut self) {
        let case_sensitive = self.cfg.rule_flag(Rule::SiblingOrder, "case_sensitive", false);
        let doc = self.doc;
        for group in doc.sibling_groups() {
            for pair in group.children.windows(2) {
                let prev = &doc.nodes[pair[0]];
                let next = &doc.nodes[pair[1]];
                if compare_siblings(&prev.name, &next.name, case_sensitive) != Ordering::Greater {
                    continue;
                }
                let message = if next.kind().is_container() && !prev.kind().is_container() {
                    format!(
                        "Directory `{}` should be listed before file `{}`",
                        next.name, prev.name
                    )
                } else {
                    format!("`{}` should be listed before `{}`", next.name, prev.name)
                };
                self.push(
                    Rule::SiblingOrder,
                    next.line,
                    (next.start_col, next.end_col),
                    message,
                );
            }
        }
    }

    fn spec_ptree(&mut self) {
        let directive = self.doc.directive_line("ptree");
        match directive {
            None => self.push_header(
                Rule::SpecPtree,
                None,
                "Missing `@ptree: spec` directive".into(),
            ),
            Some(d) if d.value != "spec" => self.push_header(
                Rule::SpecPtree,
                Some(d),
                format!("`@ptree` must be `spec`, found `{}`", d.value),
            ),
            Some(_) => {}
        }
    }

    fn spec_style(&mut self) {
        let expected = self.cfg.spec.style.clone();
        match self.doc.directive_line("style") {
            None => self.push_header(
                Rule::SpecStyle,
                None,
                format!("Missing `@style: {expected}` directive"),
            ),
            Some(d) if d.value != expected => self.push_header(
                Rule::SpecStyle,
                Some(d),
                format!("`@style` must be `{expected}`, found `{}`", d.value),
            ),
            Some(_) => {}
        }
        if expected != "unicode" {
            return;
        }
        let doc = self.doc;
        for node in &doc.nodes {
            if node.connector.is_ascii() {
                self.push(
                    Rule::SpecStyle,
                    node.line,
                    (0, node.start_col),
                    "ASCII connector used where `@style: unicode` requires `├──`/`└──`".into(),
                );
            }
        }
    }

    fn spec_version(&mut self) {
        match self.doc.directive_line("version") {
            None => self.push_header(
                Rule::SpecVersion,
                None,
                "Missing `@version` directive".into(),
            ),
            Some(d) if !is_strict_semver(&d.value) => self.push_header(
                Rule::SpecVersion,
                Some(d),
                format!("`@version` `{}` is not a strict SemVer version", d.value),
            ),
            Some(_) => {}
        }
    }

    fn spec_name_type(&mut self) {
        let Some(directive) = self.doc.directive_line("name_type") else {
            self.push_header(
                Rule::SpecNameType,
                None,
                "Missing `@name_type` block".into(),
            );
            return;
        };
        let actual = parse_bracket_mapping(&directive.value);
        let expected = self.cfg.spec.name_type.clone();
        let mut problems = Vec::new();
        for (entity, id) in &expected {
            match actual.iter().find(|(key, _)| key == entity) {
                None => problems.push(format!("missing `{entity}: '{id}'`")),
                Some((_, found)) if found != id => {
                    problems.push(format!("`{entity}` should be `{id}`, found `{found}`"))
                }
                Some(_) => {}
            }
        }
        for (key, _) in &actual {
            if !expected.iter().any(|(entity, _)| entity == key) {
                problems.push(format!("unexpected entry `{key}`"));
            }
        }
        if !problems.is_empty() {
            self.push_header(
                Rule::SpecNameType,
                Some(directive),
                format!("`@name_type` block: {}", problems.join("; ")),
            );
        }
    }

    fn spec_separation_delimiters(&mut self) {
        let doc = self.doc;
        let directive = doc
            .directive_line(SEPARATION_KEY)
            .or_else(|| doc.directive_line(LEGACY_SEPARATION_KEY));
        let Some(directive) = directive else {
            self.push_header(
                Rule::SpecSeparationDelimiters,
                None,
                "Missing `@separation_delimiters` block".into(),
            );
            return;
        };
        let actual = parse_bracket_list(&directive.value);
        let cfg = self.cfg;
        let expected = &cfg.spec.separation_delimiters;
        let missing: Vec<&str> = expected
            .iter()
            .filter(|d| !actual.contains(d))
            .map(String::as_str)
            .collect();
        let unexpected: Vec<&str> = actual
            .iter()
            .filter(|d| !expected.contains(d))
            .map(String::as_str)
            .collect();
        if missing.is_empty() && unexpected.is_empty() {
            return;
        }
        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing {}", quote_all(&missing)));
        }
        if !unexpected.is_empty() {
            parts.push(format!("unexpected {}", quote_all(&unexpected)));
        }
        let message = format!(
            "`@{}` must list exactly {}: {}",
            directive.key,
            quote_all(&expected.iter().map(String::as_str).collect::<Vec<_>>()),
            parts.join(", ")
        );
        self.push_header(Rule::SpecSeparationDelimiters, Some(directive), message);
    }

    fn spec_root_label(&mut self) {
        let Some(root) = &self.doc.root else {
            return;
        };
        let base = self.cfg.spec.root_base.clone();
        let version = self
            .doc
            .directive("version")
            .filter(|v| is_strict_semver(v))
            .map(str::to_string);
        let expected = format!("{base}-{}//", version.as_deref().unwrap_or("<version>"));
        let span = (root.start_col, root.end_col);

        if root.kind != RootKind::RootLabel {
            self.push(
                Rule::SpecRootLabel,
                root.line,
                span,
                format!("Root must be the label `{expected}`, found `{}`", root.value),
            );
            return;
        }
        let split = split_version(bare_name(&root.value));
        let Some(found_version) = split.version.as_deref() else {
            self.push(
                Rule::SpecRootLabel,
                root.line,
                span,
                format!(
                    "Root label `{}` is missing a version suffix; expected `{expected}`",
                    root.value
                ),
            );
            return;
        };
        if split.base != base {
            self.push(
                Rule::SpecRootLabel,
                root.line,
                span,
                format!("Root label base `{}` does not match `{base}`", split.base),
            );
        }
        if split.delimiter != Some('-') {
            self.push(
                Rule::SpecRootLabel,
                root.line,
                span,
                format!("Root label must join base and version with `-`; expected `{expected}`"),
            );
        }
        if let Some(version) = &version {
            if found_version != version {
                self.push(
                    Rule::SpecRootLabel,
                    root.line,
                    span,
                    format!(
                        "Root label version `{found_version}` does not match `@version: {version}`"
                    ),
                );
            }
        }
    }
}

fn quote_all(items: &[&str]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("`{item}`")).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn codes(messages: &[LintMessage]) -> Vec<&'static str> {
        messages.iter().map(|m| m.code.code()).collect()
    }

    #[test]
    fn codes_round_trip() {
        for rule in Rule::ALL {
            assert_eq!(Rule::from_code(rule.code()), Some(rule));
        }
        assert_eq!(Rule::from_code("PT016"), None);
    }

    #[test]
    fn clean_default_document_has_no_messages() {
        let cfg = Config::default();
        let doc = parse("@ptree: 1.0\nMY_PROJECT//\n├── src/\n│   └── main.rs\n└── README.md");
        assert_eq!(validate(&doc, &cfg), Vec::new());
    }

    #[test]
    fn file_with_children_is_flagged() {
        let cfg = Config::default();
        let doc = parse("@ptree: 1.0\nROOT//\n└── src\n    └── main.rs");
        let messages = validate(&doc, &cfg);
        assert_eq!(codes(&messages), vec!["PT002"]);
        assert_eq!(messages[0].severity, Severity::Error);
        assert_eq!(messages[0].line, 3);
        assert_eq!((messages[0].start_col, messages[0].end_col), (4, 7));
    }

    #[test]
    fn messages_are_sorted_by_position() {
        let cfg = Config::default();
        let doc = parse("ROOT//\n├── My File.TXT\n└── a-b_c.md");
        let messages = validate(&doc, &cfg);
        let lines: Vec<usize> = messages.iter().map(|m| m.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert_eq!(codes(&messages)[0], "PT003");
        assert!(codes(&messages).contains(&"PT006"));
        assert!(codes(&messages).contains(&"PT007"));
        assert!(codes(&messages).contains(&"PT008"));
    }

    #[test]
    fn spec_rules_only_in_spec_profile() {
        let cfg = Config::default();
        let doc = parse("@ptree: 1.0\nPTREE//\n└── a.txt");
        assert!(validate(&doc, &cfg).iter().all(|m| !m.code.spec_only()));
        let forced = validate_with(
            &doc,
            &cfg,
            &ValidateOptions {
                profile: Some("spec".into()),
            },
        );
        assert!(codes(&forced).contains(&"PT010"));
        assert!(codes(&forced).contains(&"PT012"));
    }
}
