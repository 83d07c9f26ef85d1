//! Source indexer: scan the samples tree for named, delimited regions.
//!
//! Region content is opaque text, copied verbatim; the indexer never
//! parses the language inside a region. The index is built once per
//! run and read-only afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::error::Error;
use crate::parallel;
use crate::types::{Finding, Outcome, Region, StructuralKind};

/// Regions and structural findings from one samples file.
struct FileScan {
    /// Regions recorded for this file.
    regions: Vec<Region>,
    /// Structural findings for this file.
    structural: Vec<Finding>,
}

impl FileScan {
    /// Whether this scan carries any structural finding.
    fn is_broken(&self) -> bool {
        return !self.structural.is_empty();
    }
}

/// Compiled region delimiters. The start pattern must expose a `name`
/// capture group; the delimiter syntax is configurable per language.
pub struct RegionMatcher {
    /// End delimiter.
    end: Regex,
    /// Start delimiter with the `name` capture.
    start: Regex,
}

impl RegionMatcher {
    /// Whether a line closes the innermost open region.
    fn is_end(&self, line: &str) -> bool {
        return self.end.is_match(line);
    }

    /// Compile the configured delimiter patterns.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegionPattern` if either pattern fails to
    /// compile or the start pattern has no `name` capture group.
    pub fn new(start: &str, end: &str) -> Result<Self, Error> {
        let start_re = Regex::new(start).map_err(|e| Error::RegionPattern {
            pattern: start.to_string(),
            reason: e.to_string(),
        })?;
        if !start_re.capture_names().flatten().any(|n| n == "name") {
            return Err(Error::RegionPattern {
                pattern: start.to_string(),
                reason: "missing a `name` capture group".to_string(),
            });
        }
        let end_re = Regex::new(end).map_err(|e| Error::RegionPattern {
            pattern: end.to_string(),
            reason: e.to_string(),
        })?;
        return Ok(Self { end: end_re, start: start_re });
    }

    /// The region name opened by a line, if any.
    fn start_name(&self, line: &str) -> Option<String> {
        let cap = self.start.captures(line)?;
        return Some(cap.name("name")?.as_str().to_string());
    }
}

/// The read-only map from region name to every region defining it.
pub struct SourceIndex {
    /// Regions keyed by name; the value lists every defining file.
    regions: HashMap<String, Vec<Region>>,
    /// Structural findings from indexing, in file order.
    pub structural: Vec<Finding>,
}

impl SourceIndex {
    /// Scan the samples tree and build the index.
    ///
    /// # Errors
    ///
    /// Returns `Error::SamplesRootNotFound` if the root is missing;
    /// per-file failures are isolated into structural findings.
    pub fn build(
        root: &Path,
        matcher: &RegionMatcher,
        workers: usize,
        fail_fast: bool,
    ) -> Result<Self, Error> {
        if !root.is_dir() {
            return Err(Error::SamplesRootNotFound { path: root.to_path_buf() });
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .collect();
        paths.sort();

        let scans = parallel::map_files(
            &paths,
            workers,
            fail_fast,
            |path| index_file(root, path, matcher),
            FileScan::is_broken,
        );

        let mut regions: HashMap<String, Vec<Region>> = HashMap::new();
        let mut structural = Vec::new();
        for scan in scans {
            for region in scan.regions {
                regions.entry(region.name.clone()).or_default().push(region);
            }
            structural.extend(scan.structural);
        }
        for candidates in regions.values_mut() {
            candidates.sort_by(|a, b| a.file.cmp(&b.file));
        }

        return Ok(Self { regions, structural });
    }

    /// Every region defining `name`, sorted by file. Empty when the
    /// name is unknown.
    pub fn lookup(&self, name: &str) -> &[Region] {
        return self.regions.get(name).map_or(&[], Vec::as_slice);
    }

    /// A region name equal to `id` after normalization, if any.
    /// Used to suggest a fix for unmatched snippet ids.
    pub fn suggest(&self, id: &str) -> Option<String> {
        let wanted = normalize_name(id);
        let mut names: Vec<&String> = self.regions.keys().collect();
        names.sort();
        return names
            .into_iter()
            .find(|name| name.as_str() != id && normalize_name(name) == wanted)
            .cloned();
    }
}

/// Scan one samples file with a region stack. Duplicate names among
/// open regions poison the name for this file: the boundary is
/// ambiguous, so nothing is recorded under it.
fn index_file(root: &Path, path: &Path, matcher: &RegionMatcher) -> FileScan {
    let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    let mut scan = FileScan { regions: Vec::new(), structural: Vec::new() };

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            scan.structural.push(Finding {
                file: relative,
                line: 0,
                outcome: Outcome::Structural {
                    error: StructuralKind::UnreadableFile { detail: e.to_string() },
                },
            });
            return scan;
        },
    };
    // Binary assets carry no region delimiters.
    let Ok(text) = String::from_utf8(bytes) else {
        return scan;
    };

    let lines: Vec<&str> = text.lines().collect();
    let mut open: Vec<(String, usize)> = Vec::new();
    let mut poisoned: Vec<String> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if let Some(name) = matcher.start_name(line) {
            if open.iter().any(|(n, _)| n == &name) {
                scan.structural.push(Finding {
                    file: relative.clone(),
                    line: line_number(idx),
                    outcome: Outcome::Structural {
                        error: StructuralKind::NestedDuplicateRegion { name: name.clone() },
                    },
                });
                poisoned.push(name.clone());
            }
            open.push((name, idx));
        } else if matcher.is_end(line) {
            let Some((name, start_idx)) = open.pop() else {
                scan.structural.push(Finding {
                    file: relative.clone(),
                    line: line_number(idx),
                    outcome: Outcome::Structural { error: StructuralKind::StrayRegionEnd },
                });
                continue;
            };
            if poisoned.contains(&name) {
                continue;
            }
            let content = lines.get(start_idx.saturating_add(1)..idx).unwrap_or(&[]).join("\n");
            scan.regions.push(Region {
                content,
                end_line: line_number(idx),
                file: relative.clone(),
                name,
                start_line: line_number(start_idx),
            });
        }
    }

    for (name, idx) in open {
        scan.structural.push(Finding {
            file: relative.clone(),
            line: line_number(idx),
            outcome: Outcome::Structural {
                error: StructuralKind::UnterminatedRegion { name },
            },
        });
    }

    return scan;
}

/// Convert a zero-based line index to a one-based line number.
fn line_number(index: usize) -> u32 {
    return u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1);
}

/// Lowercase a name and strip separator characters, so that near-miss
/// ids like `helloWorld` or `hello_world` still suggest `hello-world`.
fn normalize_name(name: &str) -> String {
    return name
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
}
