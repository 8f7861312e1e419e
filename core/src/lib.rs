//! PTREE core: parser, classifier, rule engine, fixer, and configuration
//! model for the line-based directory-tree format.
//!
//! Every entry point is a pure function. A [`Config`] is built once through
//! [`load_effective_config`] and can be shared across threads.

pub mod classify;
pub mod config;
pub mod fix;
pub mod parser;
pub mod rules;

pub use classify::{
    bare_name, classify_entity, find_any_name_type, find_matching_name_type, split_file,
    split_version, EntityKind, FileSplit, SplitStrategy, VersionSplit,
};
pub use config::{
    builtin_profile, load_effective_config, merge, Config, ConfigError, ConfigErrors, NameType,
    Severity,
};
pub use fix::{fix, fix_with, FixOptions, FixResult};
pub use parser::{parse, parse_with_options, print, Document, Node, ParseOptions};
pub use rules::{validate, validate_with, LintMessage, Rule, ValidateOptions};
