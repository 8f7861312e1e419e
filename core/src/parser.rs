//! Line-oriented PTREE parser and round-trip printer.
//!
//! [`parse`] is total: every anomaly in the input becomes a [`ParseError`]
//! on the returned [`Document`] and scanning continues with the next line.
//! [`print`] rebuilds text from the raw content stored on each record.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classify::{
    bare_name, classify_entity, is_index_name, numeral_prefix, split_file, EntityKind,
    SplitStrategy,
};

static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s+director(?:y|ies),\s+(\d+)\s+files?\s*$")
        .expect("valid summary regex")
});

static DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*@([A-Za-z0-9_.-]+)").expect("valid directive regex"));

static NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((?:[│|][ \x{00A0}]{3}|[ \x{00A0}]{4})*)(├──|└──|\|--|`--)[ \x{00A0}]+(\S.*)$",
    )
    .expect("valid node regex")
});

static METADATA_BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}[#\[]").expect("valid metadata boundary regex"));

const SYMLINK_ARROW: &str = " -> ";

/// Options that influence derived node fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub split: SplitStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Directive {
    pub line: usize,
    pub key: String,
    pub value: String,
    /// Source text; spans several lines (joined by `\n`) for bracket blocks.
    pub raw: String,
    pub key_start_col: usize,
    pub key_end_col: usize,
    pub value_start_col: usize,
    pub value_end_col: usize,
    pub separator: Option<char>,
}

impl Directive {
    /// Number of source lines this directive occupies.
    pub fn line_span(&self) -> usize {
        self.raw.split('\n').count()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RootKind {
    RootLabel,
    RootPath,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootLine {
    pub line: usize,
    pub raw: String,
    pub value: String,
    pub kind: RootKind,
    pub start_col: usize,
    pub end_col: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Connector {
    Tee,
    Elbow,
    AsciiTee,
    AsciiElbow,
}

impl Connector {
    fn from_glyph(glyph: &str) -> Option<Self> {
        match glyph {
            "├──" => Some(Connector::Tee),
            "└──" => Some(Connector::Elbow),
            "|--" => Some(Connector::AsciiTee),
            "`--" => Some(Connector::AsciiElbow),
            _ => None,
        }
    }

    pub fn is_ascii(self) -> bool {
        matches!(self, Connector::AsciiTee | Connector::AsciiElbow)
    }
}

/// Attributes and comment trailing a node name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineMetadata {
    pub attributes: Vec<(String, String)>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub line: usize,
    pub raw: String,
    pub depth: usize,
    pub connector: Connector,
    pub name: String,
    /// Everything after the name: symlink arrow, target, metadata.
    pub trailing: String,
    pub symlink_target: Option<String>,
    pub start_col: usize,
    pub end_col: usize,
    pub has_children: bool,
    pub numeral_prefix: Option<String>,
    pub is_index_file: bool,
    pub stem: Option<String>,
    pub extension: Option<String>,
    pub inline_metadata: Option<InlineMetadata>,
}

impl Node {
    pub fn kind(&self) -> EntityKind {
        classify_entity(&self.name)
    }

    pub fn bare_name(&self) -> &str {
        bare_name(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryLine {
    pub line: usize,
    pub raw: String,
    pub directories: u64,
    pub files: u64,
}

/// A line kept only so the printer can reproduce it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawLine {
    pub line: usize,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ParseErrorKind {
    UnclosedBracket,
    DepthJump,
    Unrecognized,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
    pub message: String,
    pub start_col: usize,
    pub end_col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingGroup {
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Last value seen per directive key.
    pub directives: BTreeMap<String, String>,
    /// Every directive occurrence in source order.
    pub directive_lines: Vec<Directive>,
    pub root: Option<RootLine>,
    pub nodes: Vec<Node>,
    pub blank_lines: Vec<RawLine>,
    pub comment_lines: Vec<RawLine>,
    pub unrecognized_lines: Vec<RawLine>,
    pub summary: Option<SummaryLine>,
    pub errors: Vec<ParseError>,
}

impl Document {
    pub fn directive(&self, key: &str) -> Option<&str> {
        self.directives.get(key).map(String::as_str)
    }

    /// Last occurrence of `key`, the one whose value is effective.
    pub fn directive_line(&self, key: &str) -> Option<&Directive> {
        self.directive_lines.iter().rev().find(|d| d.key == key)
    }

    pub fn has_depth_jumps(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.kind == ParseErrorKind::DepthJump)
    }

    /// Children of each parent (`None` for top-level nodes), as indices into
    /// `nodes`, ordered by parent.
    pub fn sibling_groups(&self) -> Vec<SiblingGroup> {
        let mut groups: BTreeMap<Option<usize>, Vec<usize>> = BTreeMap::new();
        let mut ancestors: Vec<usize> = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            while let Some(&top) = ancestors.last() {
                if self.nodes[top].depth >= node.depth {
                    ancestors.pop();
                } else {
                    break;
                }
            }
            groups.entry(ancestors.last().copied()).or_default().push(idx);
            ancestors.push(idx);
        }
        groups
            .into_iter()
            .map(|(parent, children)| SiblingGroup { parent, children })
            .collect()
    }

    /// Index of the first line (0-based) that is not blank, comment, or a
    /// directive. Equals the line count when the document is header-only.
    pub fn header_boundary(&self) -> usize {
        let mut boundary = usize::MAX;
        if let Some(root) = &self.root {
            boundary = boundary.min(root.line);
        }
        if let Some(node) = self.nodes.first() {
            boundary = boundary.min(node.line);
        }
        if let Some(summary) = &self.summary {
            boundary = boundary.min(summary.line);
        }
        if let Some(unknown) = self.unrecognized_lines.first() {
            boundary = boundary.min(unknown.line);
        }
        if boundary == usize::MAX {
            self.line_count()
        } else {
            boundary - 1
        }
    }

    /// Number of source lines covered by all records.
    pub fn line_count(&self) -> usize {
        let directive_end = self
            .directive_lines
            .iter()
            .map(|d| d.line + d.line_span() - 1)
            .max()
            .unwrap_or(0);
        let others = self
            .root
            .iter()
            .map(|r| r.line)
            .chain(self.nodes.iter().map(|n| n.line))
            .chain(self.blank_lines.iter().map(|l| l.line))
            .chain(self.comment_lines.iter().map(|l| l.line))
            .chain(self.unrecognized_lines.iter().map(|l| l.line))
            .chain(self.summary.iter().map(|s| s.line))
            .max()
            .unwrap_or(0);
        directive_end.max(others)
    }
}

pub fn parse(text: &str) -> Document {
    parse_with_options(text, &ParseOptions::default())
}

pub fn parse_with_options(text: &str, options: &ParseOptions) -> Document {
    let lines: Vec<&str> = text.lines().collect();
    let mut doc = Document::default();
    let mut idx = 0;

    while idx < lines.len() {
        let raw = lines[idx];
        let line = idx + 1;

        if raw.trim().is_empty() {
            doc.blank_lines.push(RawLine {
                line,
                raw: raw.to_string(),
            });
            idx += 1;
            continue;
        }

        if raw.trim_start().starts_with('#') {
            doc.comment_lines.push(RawLine {
                line,
                raw: raw.to_string(),
            });
            idx += 1;
            continue;
        }

        if let Some(caps) = SUMMARY_RE.captures(raw) {
            match (caps[1].parse::<u64>(), caps[2].parse::<u64>()) {
                (Ok(directories), Ok(files)) => {
                    let summary = SummaryLine {
                        line,
                        raw: raw.to_string(),
                        directories,
                        files,
                    };
                    if let Some(previous) = doc.summary.replace(summary) {
                        push_unrecognized(
                            &mut doc,
                            previous.line,
                            &previous.raw,
                            format!("Summary line superseded by line {line}"),
                        );
                    }
                }
                _ => push_unrecognized(&mut doc, line, raw, "Summary count out of range".into()),
            }
            idx += 1;
            continue;
        }

        if DIRECTIVE_RE.is_match(raw) {
            let consumed = parse_directive(&lines, idx, &mut doc);
            idx += consumed;
            continue;
        }

        if let Some(node) = parse_node_line(raw, line) {
            doc.nodes.push(node);
        } else if doc.root.is_none() {
            doc.root = Some(parse_root_line(raw, line));
        } else {
            let message = format!("Unrecognized line: `{}`", raw.trim());
            push_unrecognized(&mut doc, line, raw, message);
        }
        idx += 1;
    }

    derive_node_fields(&mut doc, options);
    doc.unrecognized_lines.sort_by_key(|l| l.line);
    doc.errors.sort_by_key(|e| e.line);
    doc
}

fn push_unrecognized(doc: &mut Document, line: usize, raw: &str, message: String) {
    doc.errors.push(ParseError {
        line,
        kind: ParseErrorKind::Unrecognized,
        message,
        start_col: 0,
        end_col: raw.chars().count(),
    });
    doc.unrecognized_lines.push(RawLine {
        line,
        raw: raw.to_string(),
    });
}

/// Parses the directive starting at `lines[start]` and returns how many
/// source lines it consumed.
fn parse_directive(lines: &[&str], start: usize, doc: &mut Document) -> usize {
    let raw = lines[start];
    let line = start + 1;
    let Some(key_match) = DIRECTIVE_RE.captures(raw).and_then(|caps| caps.get(1)) else {
        return 1;
    };
    let key = key_match.as_str().to_string();
    let key_start_col = char_col(raw, key_match.start()) - 1;
    let key_end_col = char_col(raw, key_match.end());

    let rest = &raw[key_match.end()..];
    let after_ws = rest.trim_start();
    let (separator, value_part) = match after_ws.chars().next() {
        Some(ch @ (':' | '=')) => (Some(ch), &after_ws[1..]),
        _ => (None, after_ws),
    };
    let first_value = value_part.trim();
    let value_offset = raw.len() - value_part.trim_start().len();
    let value_start_col = char_col(raw, value_offset);
    let value_end_col = value_start_col + first_value.chars().count();

    let mut raw_lines = vec![raw];
    let mut value_lines = vec![first_value];
    let mut balance = bracket_delta(first_value);
    let mut next = start + 1;
    while balance > 0 && next < lines.len() {
        raw_lines.push(lines[next]);
        value_lines.push(lines[next]);
        balance += bracket_delta(lines[next]);
        next += 1;
    }
    if balance > 0 {
        let width = raw.chars().count();
        doc.errors.push(ParseError {
            line,
            kind: ParseErrorKind::UnclosedBracket,
            message: format!(
                "Directive `@{key}` has {balance} unclosed bracket(s) at end of input"
            ),
            start_col: key_start_col,
            end_col: width,
        });
    }

    let value = value_lines.join("\n").trim().to_string();
    doc.directives.insert(key.clone(), value.clone());
    doc.directive_lines.push(Directive {
        line,
        key,
        value,
        raw: raw_lines.join("\n"),
        key_start_col,
        key_end_col,
        value_start_col,
        value_end_col,
        separator,
    });
    raw_lines.len()
}

fn parse_root_line(raw: &str, line: usize) -> RootLine {
    let value = raw.trim();
    let kind = if value.ends_with("//") {
        RootKind::RootLabel
    } else {
        RootKind::RootPath
    };
    let leading = raw.len() - raw.trim_start().len();
    let start_col = char_col(raw, leading);
    RootLine {
        line,
        raw: raw.to_string(),
        value: value.to_string(),
        kind,
        start_col,
        end_col: start_col + value.chars().count(),
    }
}

fn parse_node_line(raw: &str, line: usize) -> Option<Node> {
    let caps = NODE_RE.captures(raw)?;
    let prefix = caps.get(1).map_or("", |m| m.as_str());
    let connector = Connector::from_glyph(&caps[2])?;
    let remainder_match = caps.get(3)?;
    let remainder = remainder_match.as_str();

    let meta_at = METADATA_BOUNDARY_RE.find(remainder).map(|m| m.start());
    let arrow_at = remainder
        .find(SYMLINK_ARROW)
        .filter(|arrow| meta_at.map_or(true, |meta| *arrow < meta));
    let name_end = arrow_at.or(meta_at).unwrap_or(remainder.len());
    let name = remainder[..name_end].trim_end();
    let trailing = &remainder[name.len()..];

    let symlink_target = arrow_at.map(|arrow| {
        let end = meta_at.unwrap_or(remainder.len());
        remainder[arrow + SYMLINK_ARROW.len()..end].trim().to_string()
    });
    let inline_metadata = meta_at.map(|meta| parse_inline_metadata(&remainder[meta..]));

    let start_col = char_col(raw, remainder_match.start());
    Some(Node {
        line,
        raw: raw.to_string(),
        depth: prefix.chars().count() / 4,
        connector,
        name: name.to_string(),
        trailing: trailing.to_string(),
        symlink_target,
        start_col,
        end_col: start_col + name.chars().count(),
        has_children: false,
        numeral_prefix: None,
        is_index_file: false,
        stem: None,
        extension: None,
        inline_metadata,
    })
}

fn parse_inline_metadata(text: &str) -> InlineMetadata {
    let mut meta = InlineMetadata::default();
    let mut rest = text.trim_start();
    if let Some(inner_start) = rest.strip_prefix('[') {
        let (inner, after) = match inner_start.find(']') {
            Some(close) => (&inner_start[..close], &inner_start[close + 1..]),
            None => (inner_start, ""),
        };
        for item in split_items(inner) {
            let (key, value) = split_pair(&item);
            meta.attributes.push((key, value));
        }
        rest = after.trim_start();
    }
    if let Some(comment) = rest.strip_prefix('#') {
        let comment = comment.trim();
        if !comment.is_empty() {
            meta.comment = Some(comment.to_string());
        }
    }
    meta
}

fn derive_node_fields(doc: &mut Document, options: &ParseOptions) {
    let mut previous: Option<usize> = None;
    for node in &doc.nodes {
        let allowed = previous.map_or(0, |depth| depth + 1);
        if node.depth > allowed {
            let message = match previous {
                Some(prev) => format!(
                    "Depth jumps from {prev} to {} (expected at most {allowed})",
                    node.depth
                ),
                None => format!("First node starts at depth {} (expected 0)", node.depth),
            };
            doc.errors.push(ParseError {
                line: node.line,
                kind: ParseErrorKind::DepthJump,
                message,
                start_col: 0,
                end_col: node.end_col,
            });
        }
        previous = Some(node.depth);
    }

    let depths: Vec<usize> = doc.nodes.iter().map(|n| n.depth).collect();
    for (idx, node) in doc.nodes.iter_mut().enumerate() {
        node.has_children = depths
            .get(idx + 1)
            .map_or(false, |next| *next == node.depth + 1);

        let bare = bare_name(&node.name);
        node.numeral_prefix = numeral_prefix(bare).map(str::to_string);
        node.is_index_file = is_index_name(bare);
        if classify_entity(&node.name) == EntityKind::File {
            let split = split_file(bare, options.split);
            node.extension = split.extension();
            node.stem = Some(split.stem);
        }
    }
}

/// Rebuilds document text from the raw content of every record.
pub fn print(doc: &Document) -> String {
    let mut rows: Vec<(usize, &str)> = Vec::new();
    rows.extend(doc.directive_lines.iter().map(|d| (d.line, d.raw.as_str())));
    rows.extend(doc.root.iter().map(|r| (r.line, r.raw.as_str())));
    rows.extend(doc.nodes.iter().map(|n| (n.line, n.raw.as_str())));
    rows.extend(doc.blank_lines.iter().map(|l| (l.line, l.raw.as_str())));
    rows.extend(doc.comment_lines.iter().map(|l| (l.line, l.raw.as_str())));
    rows.extend(doc.unrecognized_lines.iter().map(|l| (l.line, l.raw.as_str())));
    rows.extend(doc.summary.iter().map(|s| (s.line, s.raw.as_str())));
    rows.sort_by_key(|(line, _)| *line);
    // An empty last line only exists in the source if a newline follows it.
    let ends_blank = rows
        .last()
        .is_some_and(|(_, raw)| raw.is_empty() || raw.ends_with('\n'));
    let mut text = rows
        .into_iter()
        .map(|(_, raw)| raw)
        .collect::<Vec<_>>()
        .join("\n");
    if ends_blank {
        text.push('\n');
    }
    text
}

/// Items of a bracketed list value such as `['-', '_']`.
pub fn parse_bracket_list(value: &str) -> Vec<String> {
    split_items(bracket_inner(value))
        .into_iter()
        .map(|item| unquote(&item).to_string())
        .collect()
}

/// `KEY: 'value'` pairs of a bracketed mapping value, in source order.
pub fn parse_bracket_mapping(value: &str) -> Vec<(String, String)> {
    split_items(bracket_inner(value))
        .iter()
        .map(|item| split_pair(item))
        .collect()
}

fn bracket_inner(value: &str) -> &str {
    let trimmed = value.trim();
    let start = trimmed.find('[').map_or(0, |idx| idx + 1);
    let end = trimmed.rfind(']').filter(|end| *end >= start).unwrap_or(trimmed.len());
    &trimmed[start..end]
}

/// Splits on `,` and newlines outside of quotes; drops empty items.
fn split_items(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in inner.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                ',' | '\n' => {
                    let item = current.trim();
                    if !item.is_empty() {
                        items.push(item.to_string());
                    }
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
    }
    let item = current.trim();
    if !item.is_empty() {
        items.push(item.to_string());
    }
    items
}

fn split_pair(item: &str) -> (String, String) {
    match item.find([':', '=']) {
        Some(idx) => (
            unquote(&item[..idx]).to_string(),
            unquote(&item[idx + 1..]).to_string(),
        ),
        None => (unquote(item).to_string(), String::new()),
    }
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    for q in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(q) && text.ends_with(q) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Net count of `[` over `]` outside quoted spans.
fn bracket_delta(text: &str) -> i64 {
    let mut delta = 0i64;
    let mut quote: Option<char> = None;
    for ch in text.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '[' => delta += 1,
                ']' => delta -= 1,
                _ => {}
            },
        }
    }
    delta
}

fn char_col(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_tree() {
        let doc = parse("ROOT//\n├── file.txt\n└── dir/");
        assert_eq!(doc.nodes.len(), 2);
        assert!(doc.nodes.iter().all(|n| n.depth == 0));
        assert!(!doc.nodes[1].has_children);
        let root = doc.root.expect("root line");
        assert_eq!(root.kind, RootKind::RootLabel);
        assert_eq!(root.value, "ROOT//");
    }

    #[test]
    fn records_depth_jump() {
        let doc = parse("ROOT//\n├── a.txt\n│       └── deep.txt");
        assert_eq!(doc.nodes[1].depth, 2);
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].kind, ParseErrorKind::DepthJump);
        assert_eq!(doc.errors[0].line, 3);
    }

    #[test]
    fn computes_has_children_and_depth() {
        let doc = parse("ROOT//\n├── src/\n│   └── lib.rs\n`-- README.md");
        assert!(doc.nodes[0].has_children);
        assert_eq!(doc.nodes[1].depth, 1);
        assert!(!doc.nodes[1].has_children);
        assert_eq!(doc.nodes[2].connector, Connector::AsciiElbow);
        assert!(doc.errors.is_empty());
    }

    #[test]
    fn splits_symlink_and_metadata() {
        let doc = parse("ROOT//\n└── current -> releases/v2  [owner=ops, pinned]  # live");
        let node = &doc.nodes[0];
        assert_eq!(node.name, "current");
        assert_eq!(node.symlink_target.as_deref(), Some("releases/v2"));
        assert_eq!(node.trailing, " -> releases/v2  [owner=ops, pinned]  # live");
        let meta = node.inline_metadata.as_ref().expect("metadata");
        assert_eq!(
            meta.attributes,
            vec![
                ("owner".to_string(), "ops".to_string()),
                ("pinned".to_string(), String::new())
            ]
        );
        assert_eq!(meta.comment.as_deref(), Some("live"));
        assert_eq!(node.start_col, 4);
        assert_eq!(node.end_col, 11);
    }

    #[test]
    fn metadata_before_arrow_wins() {
        let doc = parse("ROOT//\n└── notes.md  # moved a -> b");
        let node = &doc.nodes[0];
        assert_eq!(node.name, "notes.md");
        assert_eq!(node.symlink_target, None);
        assert_eq!(
            node.inline_metadata.as_ref().and_then(|m| m.comment.as_deref()),
            Some("moved a -> b")
        );
    }

    #[test]
    fn parses_multiline_directive() {
        let text = "@ptree: spec\n@name_type:[\n    ROOT: 'SCREAMING_SNAKE_CASE',\n    DIR: 'kebab-case'\n]\nPTREE-1.0.0//";
        let doc = parse(text);
        assert_eq!(doc.directive("ptree"), Some("spec"));
        let block = doc.directive_line("name_type").expect("name_type");
        assert_eq!(block.line, 2);
        assert_eq!(block.line_span(), 4);
        assert_eq!(
            parse_bracket_mapping(&block.value),
            vec![
                ("ROOT".to_string(), "SCREAMING_SNAKE_CASE".to_string()),
                ("DIR".to_string(), "kebab-case".to_string())
            ]
        );
        assert_eq!(doc.root.as_ref().map(|r| r.line), Some(6));
    }

    #[test]
    fn unclosed_bracket_is_reported_but_kept() {
        let doc = parse("@separation_delimiters: [\n  '-',\n  '_'");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].kind, ParseErrorKind::UnclosedBracket);
        assert_eq!(doc.errors[0].line, 1);
        assert!(doc.errors[0].message.contains("1 unclosed"));
        let value = doc.directive("separation_delimiters").expect("value");
        assert_eq!(parse_bracket_list(value), vec!["-", "_"]);
    }

    #[test]
    fn directive_columns_and_separators() {
        let doc = parse("@version = 1.2.3\n@style unicode");
        let version = &doc.directive_lines[0];
        assert_eq!(version.separator, Some('='));
        assert_eq!(version.key_start_col, 0);
        assert_eq!(version.key_end_col, 8);
        assert_eq!(version.value_start_col, 11);
        assert_eq!(version.value_end_col, 16);
        assert_eq!(doc.directive_lines[1].separator, None);
        assert_eq!(doc.directive("style"), Some("unicode"));
    }

    #[test]
    fn later_directive_overwrites_mapping() {
        let doc = parse("@version: 1.0.0\n@version: 2.0.0");
        assert_eq!(doc.directive("version"), Some("2.0.0"));
        assert_eq!(doc.directive_lines.len(), 2);
        assert_eq!(doc.directive_line("version").map(|d| d.line), Some(2));
    }

    #[test]
    fn summary_and_second_root_candidate() {
        let doc = parse("/srv/app\n├── a/\nstray text\n\n1 directory, 0 files");
        assert_eq!(doc.root.as_ref().map(|r| r.kind), Some(RootKind::RootPath));
        let summary = doc.summary.as_ref().expect("summary");
        assert_eq!((summary.directories, summary.files), (1, 0));
        assert_eq!(doc.unrecognized_lines.len(), 1);
        assert_eq!(doc.errors[0].kind, ParseErrorKind::Unrecognized);
    }

    #[test]
    fn only_the_last_summary_is_kept() {
        let text = "ROOT//\n└── a.txt\n1 directory, 0 files\n0 directories, 1 file";
        let doc = parse(text);
        let summary = doc.summary.as_ref().expect("summary");
        assert_eq!((summary.line, summary.files), (4, 1));
        assert_eq!(doc.unrecognized_lines[0].line, 3);
        assert_eq!(doc.errors.len(), 1);
        assert!(doc.errors[0].message.contains("superseded by line 4"));
        assert_eq!(print(&doc), text);
    }

    #[test]
    fn oversized_summary_counts_are_not_stored() {
        let text = "ROOT//\n99999999999999999999 directories, 1 file";
        let doc = parse(text);
        assert!(doc.summary.is_none());
        assert_eq!(doc.unrecognized_lines.len(), 1);
        assert_eq!(doc.errors[0].kind, ParseErrorKind::Unrecognized);
        assert_eq!(doc.errors[0].line, 2);
        assert_eq!(print(&doc), text);
    }

    #[test]
    fn trailing_blank_lines_survive_printing() {
        let texts = [
            "ROOT//\n└── a.txt\n\n",
            "ROOT//\n\n\n",
            "\n",
            "ROOT//\n \n\n",
            "@name_type: [\n\n",
        ];
        for text in texts {
            let doc = parse(text);
            assert_eq!(print(&doc), text);
            assert_eq!(parse(&print(&doc)), doc);
        }
    }

    #[test]
    fn derives_file_fields() {
        let text = "ROOT//\n├── (index).md\n├── 01-intro.md\n└── .gitignore";
        let doc = parse_with_options(
            text,
            &ParseOptions {
                split: SplitStrategy::LastDot,
            },
        );
        assert!(doc.nodes[0].is_index_file);
        assert_eq!(doc.nodes[1].numeral_prefix.as_deref(), Some("01"));
        assert_eq!(doc.nodes[1].stem.as_deref(), Some("01-intro"));
        assert_eq!(doc.nodes[1].extension.as_deref(), Some("md"));
        assert_eq!(doc.nodes[2].extension, None);
    }

    #[test]
    fn groups_siblings_by_parent() {
        let doc = parse("ROOT//\n├── a/\n│   ├── x.txt\n│   └── y.txt\n└── b.txt");
        let groups = doc.sibling_groups();
        assert_eq!(
            groups,
            vec![
                SiblingGroup {
                    parent: None,
                    children: vec![0, 3]
                },
                SiblingGroup {
                    parent: Some(0),
                    children: vec![1, 2]
                },
            ]
        );
    }

    #[test]
    fn print_reproduces_lines() {
        let text = "# header\n@ptree: spec\n\nROOT//\n├── a.txt  # note\n└── b/\n    └── c.txt\n\n2 directories, 2 files";
        assert_eq!(print(&parse(text)), text);
    }

    #[test]
    fn header_boundary_skips_directives_and_comments() {
        let doc = parse("# c\n@ptree: spec\n\nROOT//\n└── a.txt");
        assert_eq!(doc.header_boundary(), 3);
        let header_only = parse("@ptree: spec\n");
        assert_eq!(header_only.header_boundary(), 1);
    }
}
