//! Name classification helpers shared by the rule engine, the fixer, and
//! editor-side highlighting.
//!
//! Everything here is a pure function of a node name (plus, for NAME_TYPE
//! lookups, the compiled registry held by [`crate::Config`]).

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::NameType;

/// Kind of entity a tree name denotes, derived from its trailing slashes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    Root,
    Dir,
    File,
    Meta,
}

impl EntityKind {
    /// Key used in `ENTITY_NAME_TYPES`.
    pub fn config_key(self) -> &'static str {
        match self {
            EntityKind::Root => "ROOT",
            EntityKind::Dir => "DIR",
            EntityKind::File => "FILE",
            EntityKind::Meta => "META",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, EntityKind::Dir | EntityKind::Meta)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Where a file name is split into stem and extensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SplitStrategy {
    #[default]
    #[serde(rename = "firstDot")]
    FirstDot,
    #[serde(rename = "lastDot")]
    LastDot,
}

impl SplitStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "firstDot" => Some(SplitStrategy::FirstDot),
            "lastDot" => Some(SplitStrategy::LastDot),
            _ => None,
        }
    }
}

/// Stem and extension segments of a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSplit {
    pub stem: String,
    pub extensions: Vec<String>,
}

impl FileSplit {
    /// Extensions joined back with `.`; `None` when the name has none.
    pub fn extension(&self) -> Option<String> {
        if self.extensions.is_empty() {
            None
        } else {
            Some(self.extensions.join("."))
        }
    }
}

/// A trailing semantic version split off a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSplit {
    pub base: String,
    pub delimiter: Option<char>,
    pub version: Option<String>,
}

const SEMVER_CORE: &str = r"\d+\.\d+\.\d+(?:-[0-9A-Za-z][0-9A-Za-z.-]*)?(?:\+[0-9A-Za-z][0-9A-Za-z.-]*)?";

static VERSION_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(.+?)([-_])({SEMVER_CORE})$")).expect("valid version suffix regex")
});

static STRICT_SEMVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[A-Za-z-][0-9A-Za-z-]*)(?:\.(?:0|[1-9]\d*|\d*[A-Za-z-][0-9A-Za-z-]*))*))?(?:\+([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?$",
    )
    .expect("valid semver regex")
});

static NUMERAL_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[-_]").expect("valid numeral prefix regex"));

/// Marker that flags a node as the index entry of its directory.
pub const INDEX_PREFIX: &str = "(index)";

/// `META` for `//`, `DIR` for a single trailing `/`, otherwise `FILE`.
pub fn classify_entity(name: &str) -> EntityKind {
    if name.ends_with("//") {
        EntityKind::Meta
    } else if name.ends_with('/') {
        EntityKind::Dir
    } else {
        EntityKind::File
    }
}

/// Strips up to two trailing `/` characters.
pub fn bare_name(name: &str) -> &str {
    let once = name.strip_suffix('/').unwrap_or(name);
    once.strip_suffix('/').unwrap_or(once)
}

/// A name starting with `.` with no further `.` (`.gitignore`).
pub fn is_dotfile(name: &str) -> bool {
    name.starts_with('.') && !name[1..].contains('.')
}

pub fn split_file(name: &str, strategy: SplitStrategy) -> FileSplit {
    if is_dotfile(name) {
        return FileSplit {
            stem: name.to_string(),
            extensions: Vec::new(),
        };
    }
    // A leading dot marks a hidden file and never starts an extension.
    let offset = usize::from(name.starts_with('.'));
    let search = &name[offset..];
    let dot = match strategy {
        SplitStrategy::FirstDot => search.find('.'),
        SplitStrategy::LastDot => search.rfind('.'),
    };
    let Some(dot) = dot.map(|idx| idx + offset) else {
        return FileSplit {
            stem: name.to_string(),
            extensions: Vec::new(),
        };
    };
    let remainder = &name[dot + 1..];
    if remainder.is_empty() {
        return FileSplit {
            stem: name.to_string(),
            extensions: Vec::new(),
        };
    }
    let extensions = match strategy {
        SplitStrategy::FirstDot => remainder.split('.').map(str::to_string).collect(),
        SplitStrategy::LastDot => vec![remainder.to_string()],
    };
    FileSplit {
        stem: name[..dot].to_string(),
        extensions,
    }
}

pub fn split_version(name: &str) -> VersionSplit {
    match VERSION_SUFFIX_RE.captures(name) {
        Some(caps) => VersionSplit {
            base: caps[1].to_string(),
            delimiter: caps[2].chars().next(),
            version: Some(caps[3].to_string()),
        },
        None => VersionSplit {
            base: name.to_string(),
            delimiter: None,
            version: None,
        },
    }
}

pub fn is_strict_semver(value: &str) -> bool {
    STRICT_SEMVER_RE.is_match(value)
}

/// Leading `NN-`/`NN_` ordering prefix, returned without its delimiter.
pub fn numeral_prefix(name: &str) -> Option<&str> {
    NUMERAL_PREFIX_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn is_index_name(name: &str) -> bool {
    name.starts_with(INDEX_PREFIX)
}

/// Drops an `(index)` or numeral prefix and a hidden-file dot.
pub fn strip_name_prefixes(name: &str) -> &str {
    let mut subject = name;
    if let Some(rest) = subject.strip_prefix(INDEX_PREFIX) {
        subject = rest.trim_start_matches(['-', '_', '.']);
    } else if let Some(num) = numeral_prefix(subject) {
        subject = &subject[num.len() + 1..];
    }
    subject.strip_prefix('.').unwrap_or(subject)
}

/// The portion of a name that NAME_TYPE patterns are checked against:
/// numeral and `(index)` prefixes, a hidden-file dot, and any version
/// suffix removed. `None` means there is nothing left to check.
pub fn naming_subject(name: &str) -> Option<String> {
    let base = split_version(strip_name_prefixes(name)).base;
    if base.is_empty() {
        None
    } else {
        Some(base)
    }
}

/// First id in `allowed` whose pattern fully matches `name`. Order is the
/// preference order.
pub fn find_matching_name_type<'a>(
    name: &str,
    allowed: &[String],
    registry: &'a [NameType],
) -> Option<&'a NameType> {
    allowed.iter().find_map(|id| {
        registry
            .iter()
            .find(|nt| &nt.id == id)
            .filter(|nt| nt.matches(name))
    })
}

/// First entry of the whole registry matching `name`, ignoring allow-lists.
pub fn find_any_name_type<'a>(name: &str, registry: &'a [NameType]) -> Option<&'a NameType> {
    registry.iter().find(|nt| nt.matches(name))
}

/// Sort key for sibling ordering: containers first, then by name.
pub fn sibling_sort_key(name: &str, case_sensitive: bool) -> (u8, String) {
    let group = u8::from(!classify_entity(name).is_container());
    let bare = bare_name(name);
    let text = if case_sensitive {
        bare.to_string()
    } else {
        bare.to_lowercase()
    };
    (group, text)
}

pub fn compare_siblings(a: &str, b: &str, case_sensitive: bool) -> Ordering {
    sibling_sort_key(a, case_sensitive).cmp(&sibling_sort_key(b, case_sensitive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_trailing_slashes() {
        assert_eq!(classify_entity("docs//"), EntityKind::Meta);
        assert_eq!(classify_entity("src/"), EntityKind::Dir);
        assert_eq!(classify_entity("main.rs"), EntityKind::File);
        assert_eq!(bare_name("docs//"), "docs");
        assert_eq!(bare_name("src/"), "src");
    }

    #[test]
    fn splits_on_first_or_last_dot() {
        let first = split_file("parser.test.ts", SplitStrategy::FirstDot);
        assert_eq!(first.stem, "parser");
        assert_eq!(first.extensions, vec!["test", "ts"]);
        let last = split_file("parser.test.ts", SplitStrategy::LastDot);
        assert_eq!(last.stem, "parser.test");
        assert_eq!(last.extensions, vec!["ts"]);
    }

    #[test]
    fn dotfiles_have_no_extension() {
        for strategy in [SplitStrategy::FirstDot, SplitStrategy::LastDot] {
            let split = split_file(".gitignore", strategy);
            assert_eq!(split.stem, ".gitignore");
            assert!(split.extensions.is_empty());
        }
        let hidden = split_file(".eslintrc.json", SplitStrategy::FirstDot);
        assert_eq!(hidden.stem, ".eslintrc");
        assert_eq!(hidden.extension().as_deref(), Some("json"));
    }

    #[test]
    fn splits_version_suffix() {
        let split = split_version("PTREE-0.0.4");
        assert_eq!(split.base, "PTREE");
        assert_eq!(split.delimiter, Some('-'));
        assert_eq!(split.version.as_deref(), Some("0.0.4"));

        let pre = split_version("my_lib_1.2.3-rc.1+build.5");
        assert_eq!(pre.base, "my_lib");
        assert_eq!(pre.delimiter, Some('_'));
        assert_eq!(pre.version.as_deref(), Some("1.2.3-rc.1+build.5"));

        let none = split_version("plain-name");
        assert_eq!(none.base, "plain-name");
        assert_eq!(none.version, None);
    }

    #[test]
    fn strict_semver_rejects_leading_zeros() {
        assert!(is_strict_semver("1.0.0"));
        assert!(is_strict_semver("0.0.4-alpha.1+sha.5114f85"));
        assert!(!is_strict_semver("01.0.0"));
        assert!(!is_strict_semver("1.0"));
    }

    #[test]
    fn naming_subject_strips_prefixes() {
        assert_eq!(naming_subject("01-intro").as_deref(), Some("intro"));
        assert_eq!(naming_subject("(index)-overview").as_deref(), Some("overview"));
        assert_eq!(naming_subject("(index)"), None);
        assert_eq!(naming_subject(".github").as_deref(), Some("github"));
        assert_eq!(naming_subject("lib-1.2.3").as_deref(), Some("lib"));
    }

    #[test]
    fn directories_sort_before_files() {
        assert_eq!(compare_siblings("zeta/", "alpha.txt", false), Ordering::Less);
        assert_eq!(compare_siblings("Beta.txt", "alpha.txt", false), Ordering::Greater);
        assert_eq!(compare_siblings("B.txt", "a.txt", true), Ordering::Less);
        assert_eq!(compare_siblings("docs//", "docs/", false), Ordering::Equal);
    }
}
