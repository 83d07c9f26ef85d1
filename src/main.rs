//! snipsync: keep markdown documentation synchronized with a compilable
//! samples tree, and verify that no code block escapes classification.

mod commit;
mod config;
mod diagnostics;
mod drift;
mod error;
mod index;
mod marker;
mod parallel;
mod report;
mod resolver;
mod scanner;
mod types;
mod watch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "snipsync",
    about = "Snippet synchronization and verification for markdown documentation",
    version
)]
struct Cli {
    /// Verify only; a document that would change is itself a failure.
    #[arg(long)]
    check: bool,

    /// Documentation tree root.
    #[arg(long, value_name = "DIR")]
    docs: Option<PathBuf>,

    /// Path prefix (relative to the docs root) to skip. Repeatable.
    #[arg(long, value_name = "PATH")]
    exclude: Vec<String>,

    /// Stop scanning at the first structural error.
    #[arg(long)]
    fail_fast: bool,

    /// Compilable fence tag; repeat to replace the configured set.
    #[arg(long, value_name = "TAG")]
    fence: Vec<String>,

    /// Report format.
    #[arg(long, default_value = "human", value_parser = ["human", "json"])]
    format: String,

    /// Region end delimiter pattern.
    #[arg(long, value_name = "PATTERN")]
    region_end: Option<String>,

    /// Region start delimiter pattern; must capture `name`.
    #[arg(long, value_name = "PATTERN")]
    region_start: Option<String>,

    /// Samples source tree root.
    #[arg(long, value_name = "DIR")]
    samples: Option<PathBuf>,

    /// Re-run in check mode whenever the docs or samples trees change.
    #[arg(long)]
    watch: bool,

    /// Worker threads for document and samples scanning.
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3)
        },
    }
}

/// Load `.snipsync.toml` and overlay the CLI flags.
///
/// # Errors
///
/// Returns errors from config loading.
fn load_config(cli: &Cli) -> Result<Config, error::Error> {
    let mut config = Config::load(Path::new("."))?;

    if let Some(docs) = &cli.docs {
        config.docs_root = docs.clone();
    }
    config.exclude.extend(cli.exclude.iter().cloned());
    if cli.fail_fast {
        config.fail_fast = true;
    }
    if !cli.fence.is_empty() {
        config.fences = cli.fence.clone();
    }
    if let Some(end) = &cli.region_end {
        config.region_end = end.clone();
    }
    if let Some(start) = &cli.region_start {
        config.region_start = start.clone();
    }
    if let Some(samples) = &cli.samples {
        config.samples_root = samples.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers = workers.max(1);
    }

    return Ok(config);
}

/// Dispatch to watch mode or a single run.
///
/// # Errors
///
/// Returns fatal errors from config loading or the pipeline.
fn run(cli: &Cli) -> Result<ExitCode, error::Error> {
    let config = load_config(cli)?;

    if cli.watch {
        return watch::run(&config, &cli.format);
    }
    return run_once(&config, cli.check, &cli.format);
}

/// One full pipeline pass: index the samples tree, scan the docs tree,
/// resolve snippets in memory, verify generated markers, commit the
/// rewrites (unless checking), and report.
///
/// # Errors
///
/// Returns fatal errors: unreadable roots, invalid region patterns,
/// or I/O failures during commit. Everything else is a finding.
pub(crate) fn run_once(
    config: &Config,
    check: bool,
    format: &str,
) -> Result<ExitCode, error::Error> {
    let grammar = marker::MarkerGrammar::new(&config.fences);
    let matcher = index::RegionMatcher::new(&config.region_start, &config.region_end)?;
    let index =
        index::SourceIndex::build(&config.samples_root, &matcher, config.workers, config.fail_fast)?;
    let scans = scanner::scan(config, &grammar)?;

    let mut report = report::RunReport::new(check, config.fail_fast);
    report.absorb(index.structural.clone());

    let mut writes: Vec<commit::PlannedWrite> = Vec::new();
    for scan in &scans {
        report.absorb(scan.structural.clone());

        let resolution = resolver::resolve_document(scan, &index, config.render_fence());
        report.absorb(resolution.findings);
        for warning in resolution.warnings {
            report.push_warning(warning);
        }

        report.absorb(drift::verify_document(scan, &config.samples_root));

        if resolution.new_text != scan.source {
            report.note_pending(scan.path.clone());
            writes.push(commit::PlannedWrite {
                content: resolution.new_text,
                path: config.docs_root.join(&scan.path),
            });
        }
    }

    report.finish(config.pseudo_warn_ratio);

    // Nothing touches disk until every document has been resolved.
    let aborted = config.fail_fast && report.counts().structural > 0;
    if !check && !aborted {
        commit::persist_all(&writes)?;
    }

    report.print(format);
    return Ok(report.exit_code());
}
