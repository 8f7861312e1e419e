//! Mechanical fixer. Produces a new text from the original plus a set of
//! line edits; never renames a node to satisfy a naming style.

use std::collections::BTreeMap;

use tracing::debug;

use crate::classify::{bare_name, is_strict_semver, sibling_sort_key, split_file, split_version};
use crate::config::Config;
use crate::parser::{Document, RootKind};
use crate::rules::{resolve_profile, Rule, LEGACY_SEPARATION_KEY, SEPARATION_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOptions {
    /// Forces the profile that decides whether spec headers are upserted.
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixResult {
    pub fixed_text: String,
    /// Human-readable description of each change, in application order.
    pub applied: Vec<String>,
}

impl FixResult {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

pub fn fix(text: &str, doc: &Document, cfg: &Config) -> FixResult {
    fix_with(text, doc, cfg, &FixOptions::default())
}

/// `doc` must be the parse of `text` under `cfg.parse_options()`.
pub fn fix_with(text: &str, doc: &Document, cfg: &Config, options: &FixOptions) -> FixResult {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut edits = LineEdits::default();
    let mut applied = Vec::new();

    let profile = resolve_profile(doc, cfg, options.profile.as_deref());
    if profile == "spec" {
        let version = fix_spec_header(doc, cfg, &lines, &mut edits, &mut applied);
        if let Some(version) = version {
            fix_root_label(doc, cfg, &lines, &version, &mut edits, &mut applied);
        }
    }
    fix_nodes(doc, cfg, &lines, &mut edits, &mut applied);

    debug!(profile = %profile, changes = applied.len(), "fix pass complete");
    if applied.is_empty() {
        return FixResult {
            fixed_text: text.to_string(),
            applied,
        };
    }
    FixResult {
        fixed_text: edits.apply(&lines),
        applied,
    }
}

/// Replacements keyed by original 0-based line index, plus lines inserted
/// before an index. Indices always refer to the original text.
#[derive(Debug, Default)]
struct LineEdits {
    replacements: BTreeMap<usize, Vec<String>>,
    insertions: BTreeMap<usize, Vec<String>>,
}

impl LineEdits {
    fn replace(&mut self, idx: usize, line: String) {
        self.replacements.insert(idx, vec![line]);
    }

    fn remove(&mut self, idx: usize) {
        self.replacements.insert(idx, Vec::new());
    }

    fn insert_before(&mut self, idx: usize, lines: impl IntoIterator<Item = String>) {
        self.insertions.entry(idx).or_default().extend(lines);
    }

    fn apply(&self, original: &[&str]) -> String {
        let mut out: Vec<String> = Vec::with_capacity(original.len());
        for idx in 0..=original.len() {
            if let Some(inserted) = self.insertions.get(&idx) {
                out.extend(inserted.iter().cloned());
            }
            if idx == original.len() {
                break;
            }
            match self.replacements.get(&idx) {
                Some(replacement) => out.extend(replacement.iter().cloned()),
                None => out.push(original[idx].to_string()),
            }
        }
        out.join("\n")
    }
}

/// Carries a `\r` from the source line over to its replacement.
fn with_ending(source: &str, replacement: String) -> String {
    if source.ends_with('\r') {
        format!("{replacement}\r")
    } else {
        replacement
    }
}

/// Upserts `@ptree`, `@style`, `@version` and the two spec blocks. Returns
/// the version the root label should carry, when one is known.
fn fix_spec_header(
    doc: &Document,
    cfg: &Config,
    lines: &[&str],
    edits: &mut LineEdits,
    applied: &mut Vec<String>,
) -> Option<String> {
    let boundary = doc.header_boundary();
    let mut inserted = Vec::new();

    for (key, expected) in [("ptree", "spec"), ("style", cfg.spec.style.as_str())] {
        let canonical = format!("@{key}: {expected}");
        match doc.directive_line(key) {
            Some(d) if d.value == expected => {}
            Some(d) => {
                replace_directive(lines, d.line - 1, d.line_span(), canonical.clone(), edits);
                applied.push(format!("Set `{canonical}` (line {})", d.line));
            }
            None => {
                applied.push(format!("Inserted `{canonical}`"));
                inserted.push(canonical);
            }
        }
    }

    let inferred = doc
        .root
        .as_ref()
        .filter(|root| root.kind == RootKind::RootLabel)
        .and_then(|root| split_version(bare_name(&root.value)).version)
        .filter(|v| is_strict_semver(v));
    let version = match doc.directive_line("version") {
        Some(d) if is_strict_semver(&d.value) => Some(d.value.clone()),
        Some(d) => {
            if let Some(v) = &inferred {
                let canonical = format!("@version: {v}");
                replace_directive(lines, d.line - 1, d.line_span(), canonical.clone(), edits);
                applied.push(format!("Set `{canonical}` (line {})", d.line));
            }
            inferred
        }
        None => {
            if let Some(v) = &inferred {
                let canonical = format!("@version: {v}");
                applied.push(format!("Inserted `{canonical}`"));
                inserted.push(canonical);
            }
            inferred
        }
    };

    if doc.directive_line("name_type").is_none() {
        inserted.push("@name_type: [".to_string());
        let count = cfg.spec.name_type.len();
        for (idx, (entity, id)) in cfg.spec.name_type.iter().enumerate() {
            let comma = if idx + 1 < count { "," } else { "" };
            inserted.push(format!("    {entity}: '{id}'{comma}"));
        }
        inserted.push("]".to_string());
        applied.push("Inserted `@name_type` block".to_string());
    }

    if doc.directive_line(SEPARATION_KEY).is_none() {
        match doc.directive_line(LEGACY_SEPARATION_KEY) {
            Some(d) => {
                let idx = d.line - 1;
                let renamed = lines[idx].replacen(
                    &format!("@{LEGACY_SEPARATION_KEY}"),
                    &format!("@{SEPARATION_KEY}"),
                    1,
                );
                edits.replace(idx, renamed);
                applied.push(format!(
                    "Renamed `@{LEGACY_SEPARATION_KEY}` to `@{SEPARATION_KEY}` (line {})",
                    d.line
                ));
            }
            None => {
                inserted.push(format!("@{SEPARATION_KEY}: ["));
                let count = cfg.spec.separation_delimiters.len();
                for (idx, delimiter) in cfg.spec.separation_delimiters.iter().enumerate() {
                    let comma = if idx + 1 < count { "," } else { "" };
                    inserted.push(format!("    '{delimiter}'{comma}"));
                }
                inserted.push("]".to_string());
                applied.push(format!("Inserted `@{SEPARATION_KEY}` block"));
            }
        }
    }

    if !inserted.is_empty() {
        debug!(at = boundary, lines = inserted.len(), "inserting header lines");
        let ending_source = lines.get(boundary).copied().unwrap_or("");
        edits.insert_before(
            boundary,
            inserted
                .into_iter()
                .map(|line| with_ending(ending_source, line)),
        );
    }
    version
}

/// Replaces a directive spanning `span` lines from `first` with one line.
fn replace_directive(
    lines: &[&str],
    first: usize,
    span: usize,
    canonical: String,
    edits: &mut LineEdits,
) {
    edits.replace(first, with_ending(lines[first], canonical));
    for idx in first + 1..first + span {
        edits.remove(idx);
    }
}

fn fix_root_label(
    doc: &Document,
    cfg: &Config,
    lines: &[&str],
    version: &str,
    edits: &mut LineEdits,
    applied: &mut Vec<String>,
) {
    let Some(root) = &doc.root else {
        return;
    };
    let expected = format!("{}-{version}//", cfg.spec.root_base);
    if root.raw.trim_end_matches('\r') == expected {
        return;
    }
    let idx = root.line - 1;
    edits.replace(idx, with_ending(lines[idx], expected.clone()));
    applied.push(format!(
        "Rewrote root `{}` to `{expected}` (line {})",
        root.value, root.line
    ));
}

/// A node line split at its name: scaffold and connector before, the
/// (possibly fixed) name and untouched trailing text after.
struct NodeRow {
    prefix: String,
    name: String,
    rest: String,
}

impl NodeRow {
    fn content(&self) -> String {
        format!("{}{}", self.name, self.rest)
    }
}

fn fix_nodes(
    doc: &Document,
    cfg: &Config,
    lines: &[&str],
    edits: &mut LineEdits,
    applied: &mut Vec<String>,
) {
    if doc.nodes.is_empty() {
        return;
    }
    let append_slash = cfg.rule_enabled(Rule::ParentIsDirectory);
    let lowercase_ext = cfg.rule_enabled(Rule::ExtensionCase);

    let mut rows = Vec::with_capacity(doc.nodes.len());
    let mut renamed = vec![false; doc.nodes.len()];
    for (idx, node) in doc.nodes.iter().enumerate() {
        let chars: Vec<char> = lines[node.line - 1].chars().collect();
        let start = node.start_col.min(chars.len());
        let end = node.end_col.min(chars.len());
        let mut name = node.name.clone();

        if append_slash && node.has_children && !name.ends_with('/') {
            applied.push(format!("Appended `/` to `{}` (line {})", node.name, node.line));
            name.push('/');
        } else if lowercase_ext && !name.ends_with('/') {
            if let Some(last) = split_file(&name, cfg.split).extensions.last() {
                let lower = last.to_lowercase();
                if *last != lower {
                    name.truncate(name.len() - last.len());
                    name.push_str(&lower);
                    applied.push(format!(
                        "Lowercased extension of `{}` (line {})",
                        node.name, node.line
                    ));
                }
            }
        }

        renamed[idx] = name != node.name;
        rows.push(NodeRow {
            prefix: chars[..start].iter().collect(),
            name,
            rest: chars[end..].iter().collect(),
        });
    }

    let mut slots: Vec<(usize, usize)> = (0..doc.nodes.len()).map(|idx| (idx, idx)).collect();
    if cfg.rule_enabled(Rule::SiblingOrder) {
        if doc.has_depth_jumps() {
            debug!("skipping sibling sort: document has depth jumps");
        } else {
            let case_sensitive = cfg.rule_flag(Rule::SiblingOrder, "case_sensitive", false);
            let sorter = SiblingSorter {
                doc,
                rows: &rows,
                case_sensitive,
            };
            slots = sorter.arrange(0, doc.nodes.len(), applied);
        }
    }

    for (slot, &(content, prefix)) in slots.iter().enumerate() {
        if content == slot && prefix == slot && !renamed[slot] {
            continue;
        }
        let line = format!("{}{}", rows[prefix].prefix, rows[content].content());
        edits.replace(doc.nodes[slot].line - 1, line);
    }
}

struct SiblingSorter<'a> {
    doc: &'a Document,
    rows: &'a [NodeRow],
    case_sensitive: bool,
}

impl SiblingSorter<'_> {
    /// One past the last descendant of `idx`.
    fn subtree_end(&self, idx: usize) -> usize {
        let depth = self.doc.nodes[idx].depth;
        self.doc.nodes[idx + 1..]
            .iter()
            .position(|node| node.depth <= depth)
            .map_or(self.doc.nodes.len(), |offset| idx + 1 + offset)
    }

    /// Arranges the sibling blocks in `start..end`, innermost groups first.
    /// Each entry is `(content row, prefix row)` for consecutive node slots:
    /// a block's top row takes the prefix of the slot it lands in, while its
    /// descendants move with their own prefixes.
    fn arrange(&self, start: usize, end: usize, applied: &mut Vec<String>) -> Vec<(usize, usize)> {
        let mut blocks: Vec<Vec<(usize, usize)>> = Vec::new();
        let mut idx = start;
        while idx < end {
            let block_end = self.subtree_end(idx).min(end);
            let mut block = vec![(idx, idx)];
            block.extend(self.arrange(idx + 1, block_end, applied));
            blocks.push(block);
            idx = block_end;
        }
        if blocks.len() < 2 {
            return blocks.into_iter().flatten().collect();
        }

        let tops: Vec<usize> = blocks.iter().map(|block| block[0].0).collect();
        let mut order: Vec<usize> = (0..blocks.len()).collect();
        order.sort_by_cached_key(|&b| {
            sibling_sort_key(&self.rows[tops[b]].name, self.case_sensitive)
        });
        if order.iter().enumerate().any(|(pos, &b)| pos != b) {
            let parent = (start > 0).then(|| self.rows[start - 1].name.as_str());
            applied.push(match parent {
                Some(parent) => format!("Sorted {} siblings under `{parent}`", blocks.len()),
                None => format!("Sorted {} top-level siblings", blocks.len()),
            });
        }

        let mut out = Vec::with_capacity(end - start);
        for (pos, &b) in order.iter().enumerate() {
            let block = &blocks[b];
            out.push((block[0].0, tops[pos]));
            out.extend(block[1..].iter().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_effective_config;
    use crate::parser::parse_with_options;
    use serde_json::json;

    fn run(text: &str, cfg: &Config) -> FixResult {
        let doc = parse_with_options(text, &cfg.parse_options());
        fix(text, &doc, cfg)
    }

    fn sorting_config() -> Config {
        load_effective_config(None, Some(&json!({ "RULES": { "PT009": true } })))
            .expect("valid override")
    }

    #[test]
    fn appends_slash_and_lowercases_extension() {
        let cfg = Config::default();
        let text = "ROOT//\n├── src  # sources\n│   └── main.RS\n└── notes.TXT -> ../n.TXT\n";
        let result = run(text, &cfg);
        assert_eq!(
            result.fixed_text,
            "ROOT//\n├── src/  # sources\n│   └── main.rs\n└── notes.txt -> ../n.TXT\n"
        );
        assert_eq!(result.applied.len(), 3);
    }

    #[test]
    fn clean_text_is_returned_unchanged() {
        let cfg = Config::default();
        let text = "@ptree: 1.0\nROOT//\n└── a.txt";
        let result = run(text, &cfg);
        assert!(!result.changed());
        assert_eq!(result.fixed_text, text);
    }

    #[test]
    fn sorts_blocks_with_descendants() {
        let cfg = sorting_config();
        let text = "ROOT//\n├── zeta.md\n├── lib/\n│   ├── b.rs\n│   └── a.rs\n└── docs/\n    └── x.md";
        let result = run(text, &cfg);
        assert_eq!(
            result.fixed_text,
            "ROOT//\n├── docs/\n    └── x.md\n├── lib/\n│   ├── a.rs\n│   └── b.rs\n└── zeta.md"
        );
        let again = run(&result.fixed_text, &cfg);
        assert!(!again.changed(), "{:?}", again.applied);
    }

    #[test]
    fn sort_is_skipped_with_depth_jumps() {
        let cfg = sorting_config();
        let text = "ROOT//\n├── b.txt\n│       └── deep.txt\n└── a.txt";
        assert!(!run(text, &cfg).changed());
    }

    #[test]
    fn spec_mode_upserts_headers_and_root() {
        let cfg = Config::default();
        let text = "@ptree: spec\n@style: ascii\n\nPTREE_0.0.4//\n└── readme.md\n";
        let result = run(text, &cfg);
        assert!(result
            .fixed_text
            .starts_with("@ptree: spec\n@style: unicode\n\n@version: 0.0.4\n@name_type: [\n"));
        assert!(result.fixed_text.contains("\nPTREE-0.0.4//\n"));
        let again = run(&result.fixed_text, &cfg);
        assert!(!again.changed(), "{:?}", again.applied);
    }

    #[test]
    fn legacy_separation_key_is_renamed_in_place() {
        let cfg = Config::default();
        let text = "@ptree: spec\n@seperation_delimiters: ['-', '_', '.']\nPTREE-1.0.0//";
        let result = run(text, &cfg);
        let lines: Vec<&str> = result.fixed_text.lines().collect();
        assert!(lines.contains(&"@separation_delimiters: ['-', '_', '.']"));
        assert!(!result.fixed_text.contains("seperation"));
    }
}
