use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser};
use console::style;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ptree_core::{
    fix_with, load_effective_config, parse_with_options, validate_with, Config, FixOptions,
    LintMessage, Severity, ValidateOptions,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

/// PTREE linter and fixer.
#[derive(Debug, Parser)]
#[command(name = "ptree", about = "Lint and fix PTREE directory-tree documents.")]
struct Args {
    /// Files or directories to check. Directories are searched for `*.ptree`.
    #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
    paths: Vec<PathBuf>,

    /// Config override (JSON or YAML). Defaults to ptree.yml if present.
    #[arg(long, default_value = "ptree.yml")]
    config: PathBuf,

    /// Force a profile (`default` or `spec`) for config and rule selection.
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,

    /// Apply mechanical fixes before validating.
    #[arg(long, action = ArgAction::SetTrue)]
    fix: bool,

    /// With --fix, write fixed text back to each file instead of printing it.
    #[arg(long, action = ArgAction::SetTrue, requires = "fix")]
    write: bool,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Only print the final summary.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Glob of paths to skip (repeatable).
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    messages: Vec<LintMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixed_text: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    files: Vec<FileResult>,
    total_messages: usize,
    errors: usize,
    warnings: usize,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("ptree=debug,ptree_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ptree=info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);
    debug!(?args, "ptree starting");

    let cfg = match load_config(&args.config, args.profile.as_deref())? {
        Ok(cfg) => cfg,
        Err(errors) => {
            eprintln!(
                "{} {}",
                style("config error:").red().bold(),
                args.config.display()
            );
            for err in errors.0 {
                eprintln!("  - {err}");
            }
            std::process::exit(2);
        }
    };

    let ignore = build_ignore_set(&args.exclude)?;
    let mut files = collect_files(&args.paths, ignore.as_ref())?;
    files.sort();
    files.dedup();
    if files.is_empty() {
        warn!("no .ptree files found");
    }

    let cwd = env::current_dir()?;
    let mut results = Vec::new();
    for path in files {
        let display = pathdiff::diff_paths(&path, &cwd)
            .unwrap_or_else(|| path.clone())
            .to_string_lossy()
            .replace('\\', "/");
        let result = check_file(&path, display, &cfg, &args)?;
        if !args.quiet && !args.json {
            print_human_report(&result);
        }
        results.push(result);
    }

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.messages)
            .filter(|m| m.severity == severity)
            .count()
    };
    let output = OutputReport {
        total_messages: results.iter().map(|r| r.messages.len()).sum(),
        errors: count(Severity::Error),
        warnings: count(Severity::Warning),
        files: results,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "\n{} files, {} messages ({} errors, {} warnings)",
            output.files.len(),
            output.total_messages,
            output.errors,
            output.warnings
        );
    }

    if output.total_messages > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn check_file(
    path: &Path,
    display: String,
    cfg: &Config,
    args: &Args,
) -> anyhow::Result<FileResult> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let parse_options = cfg.parse_options();
    let doc = parse_with_options(&text, &parse_options);
    let validate_options = ValidateOptions {
        profile: args.profile.clone(),
    };

    if !args.fix {
        return Ok(FileResult {
            path: display,
            messages: validate_with(&doc, cfg, &validate_options),
            applied: Vec::new(),
            fixed_text: None,
        });
    }

    let fixed = fix_with(
        &text,
        &doc,
        cfg,
        &FixOptions {
            profile: args.profile.clone(),
        },
    );
    let display_path = display.as_str();
    debug!(path = %display_path, changes = fixed.applied.len(), "fixed");
    let fixed_doc = parse_with_options(&fixed.fixed_text, &parse_options);
    let messages = validate_with(&fixed_doc, cfg, &validate_options);

    let fixed_text = if args.write {
        if fixed.changed() {
            fs::write(path, &fixed.fixed_text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None
    } else {
        Some(fixed.fixed_text)
    };
    Ok(FileResult {
        path: display,
        messages,
        applied: fixed.applied,
        fixed_text,
    })
}

/// Reads the override document, if any, and builds the effective config.
/// The outer error is I/O or syntax; the inner one is config validation.
fn load_config(
    path: &Path,
    profile: Option<&str>,
) -> anyhow::Result<Result<Config, ptree_core::ConfigErrors>> {
    if !path.exists() {
        debug!(path = %path.display(), "no config override");
        return Ok(load_effective_config(profile, None));
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
    let value: JsonValue = if is_json {
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON {}", path.display()))?
    } else {
        let yaml: YamlValue = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse YAML {}", path.display()))?;
        serde_json::to_value(yaml)
            .map_err(|e| anyhow!("Unsupported YAML in {}: {e}", path.display()))?
    };
    debug!(path = %path.display(), "loaded config override");
    Ok(load_effective_config(profile, Some(&value)))
}

fn build_ignore_set(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

fn collect_files(paths: &[PathBuf], ignore: Option<&GlobSet>) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut walker = WalkDir::new(path).into_iter();
            while let Some(entry_res) = walker.next() {
                let entry = entry_res?;
                let entry_path = entry.path();
                if ignore.is_some_and(|set| set.is_match(entry_path)) {
                    if entry.file_type().is_dir() {
                        walker.skip_current_dir();
                    }
                    continue;
                }
                if entry.file_type().is_file() && is_ptree(entry_path) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else if path.is_file() {
            // Explicit files are checked whatever their extension.
            if ignore.is_some_and(|set| set.is_match(path)) {
                continue;
            }
            files.push(path.clone());
        } else {
            return Err(anyhow!("No such file or directory: {}", path.display()));
        }
    }
    Ok(files)
}

fn is_ptree(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("ptree")
}

fn print_human_report(result: &FileResult) {
    println!("{}", style(&result.path).bold());
    for change in &result.applied {
        println!("  {} {}", style("fixed").cyan(), change);
    }
    if let Some(text) = &result.fixed_text {
        for line in text.lines() {
            println!("  │ {line}");
        }
    }
    if result.messages.is_empty() {
        println!("  {}", style("clean").green());
        return;
    }
    for msg in &result.messages {
        let tag = format!("{} {}", msg.code, msg.severity);
        let tag = match msg.severity {
            Severity::Error => style(tag).red(),
            Severity::Warning => style(tag).yellow(),
            Severity::Info => style(tag).cyan(),
        };
        println!(
            "  {}:{} [{}] {}",
            msg.line,
            msg.start_col + 1,
            tag,
            msg.message
        );
    }
}
