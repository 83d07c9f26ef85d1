//! Documentation tree scanning: walk the docs root, filter, and parse
//! every markdown file into markers on the worker pool.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Error;
use crate::marker::MarkerGrammar;
use crate::parallel;
use crate::types::{Finding, Outcome, ParsedMarker, StructuralKind};

/// One scanned document: its markers, structural findings, and the
/// original text kept for in-memory rewriting.
pub struct DocumentScan {
    /// Markers in document order.
    pub markers: Vec<ParsedMarker>,
    /// Path relative to the docs root.
    pub path: PathBuf,
    /// The document text as read.
    pub source: String,
    /// Structural findings for this document.
    pub structural: Vec<Finding>,
}

impl DocumentScan {
    /// Whether this scan carries any structural finding.
    fn is_broken(&self) -> bool {
        return !self.structural.is_empty();
    }
}

/// Collect the markdown files to scan, sorted for determinism.
/// The samples root is always excluded, even when nested inside the
/// docs root, alongside the configured exclude prefixes.
fn collect_paths(config: &Config) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(&config.docs_root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .filter(|e| !e.path().starts_with(&config.samples_root))
        .map(|e| e.path().to_path_buf())
        .filter(|p| {
            let relative = p.strip_prefix(&config.docs_root).unwrap_or(p);
            config.should_scan(&relative.to_string_lossy())
        })
        .collect();
    paths.sort();
    return paths;
}

/// Read and parse one document. An unreadable document becomes a
/// structural finding, never an abort.
fn parse_document(docs_root: &Path, path: &Path, grammar: &MarkerGrammar) -> DocumentScan {
    let relative = path.strip_prefix(docs_root).unwrap_or(path).to_path_buf();

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            return DocumentScan {
                markers: Vec::new(),
                path: relative.clone(),
                source: String::new(),
                structural: vec![Finding {
                    file: relative,
                    line: 0,
                    outcome: Outcome::Structural {
                        error: StructuralKind::UnreadableFile { detail: e.to_string() },
                    },
                }],
            };
        },
    };

    let parsed = grammar.parse(&source);
    let structural = parsed
        .structural
        .into_iter()
        .map(|(line, error)| Finding {
            file: relative.clone(),
            line,
            outcome: Outcome::Structural { error },
        })
        .collect();

    return DocumentScan {
        markers: parsed.markers,
        path: relative,
        source,
        structural,
    };
}

/// Scan all markdown files under the docs root.
///
/// # Errors
///
/// Returns `Error::DocsRootNotFound` if the docs root is missing;
/// everything else is isolated into per-document findings.
pub fn scan(config: &Config, grammar: &MarkerGrammar) -> Result<Vec<DocumentScan>, Error> {
    if !config.docs_root.is_dir() {
        return Err(Error::DocsRootNotFound { path: config.docs_root.clone() });
    }

    let paths = collect_paths(config);
    let scans = parallel::map_files(
        &paths,
        config.workers,
        config.fail_fast,
        |path| parse_document(&config.docs_root, path, grammar),
        DocumentScan::is_broken,
    );
    return Ok(scans);
}
