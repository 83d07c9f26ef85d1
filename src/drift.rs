//! Drift verification for generated markers.
//!
//! A generated marker is a provenance claim: "this is exactly what
//! lines N through M of file X produced." Verification compares, it
//! never heals; healing would hide the shape change the marker exists
//! to surface.

use std::path::Path;

use crate::resolver::strip_indent;
use crate::scanner::DocumentScan;
use crate::types::{Finding, Marker, Outcome, ParsedMarker, StructuralKind};

/// Anchor a broken-reference error to a marker's position.
fn broken(scan: &DocumentScan, marker: &ParsedMarker, detail: String) -> Finding {
    return Finding {
        file: scan.path.clone(),
        line: marker.span.start_line,
        outcome: Outcome::Structural {
            error: StructuralKind::BrokenGeneratedRef { detail },
        },
    };
}

/// Drop at most one trailing newline before comparison.
fn trim_final_newline(text: &str) -> &str {
    return text.strip_suffix('\n').unwrap_or(text);
}

/// Check every generated marker in one document against the current
/// samples tree. Missing files and bad line ranges are structural
/// (the reference itself is broken); content differences are drift.
pub fn verify_document(scan: &DocumentScan, samples_root: &Path) -> Vec<Finding> {
    let mut findings = Vec::new();

    for marker in &scan.markers {
        let Marker::Generated { line_end, line_start, path } = &marker.marker else {
            continue;
        };
        let reference = format!("{}#L{line_start}-L{line_end}", path.display());

        let text = match std::fs::read_to_string(samples_root.join(path)) {
            Ok(t) => t,
            Err(e) => {
                findings.push(broken(scan, marker, format!("{reference}: {e}")));
                continue;
            },
        };

        let lines: Vec<&str> = text.lines().collect();
        let start = usize::try_from(*line_start).unwrap_or(usize::MAX);
        let end = usize::try_from(*line_end).unwrap_or(usize::MAX);
        if start == 0 || end < start || end > lines.len() {
            let total = lines.len();
            findings.push(broken(
                scan,
                marker,
                format!("{reference}: line range out of bounds (file has {total} lines)"),
            ));
            continue;
        }

        let expected = lines.get(start.saturating_sub(1)..end).unwrap_or(&[]).join("\n");
        let actual = strip_indent(&marker.body, &marker.indent);

        if trim_final_newline(&expected) == trim_final_newline(&actual) {
            findings.push(Finding {
                file: scan.path.clone(),
                line: marker.span.start_line,
                outcome: Outcome::MarkerOk { marker: "generated".to_string() },
            });
        } else {
            findings.push(Finding {
                file: scan.path.clone(),
                line: marker.span.start_line,
                outcome: Outcome::Drift { actual, expected, reference },
            });
        }
    }

    return findings;
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::marker::MarkerGrammar;

    fn scan_of(text: &str) -> DocumentScan {
        let grammar = MarkerGrammar::new(&["csharp".to_string()]);
        let parsed = grammar.parse(text);
        DocumentScan {
            markers: parsed.markers,
            path: PathBuf::from("api.md"),
            source: text.to_string(),
            structural: Vec::new(),
        }
    }

    fn samples(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn matching_excerpt_is_ok() {
        let dir = samples(&[("Gen/F.g.cs", "l1\nl2\nl3\nl4\n")]);
        let doc = "<!-- generated:Gen/F.g.cs#L2-L3 -->\n```csharp\nl2\nl3\n```\n";
        let findings = verify_document(&scan_of(doc), dir.path());
        assert_eq!(
            findings.first().map(|f| &f.outcome),
            Some(&Outcome::MarkerOk { marker: "generated".to_string() })
        );
    }

    #[test]
    fn a_changed_line_in_range_drifts_that_marker_only() {
        let dir = samples(&[("Gen/F.g.cs", "l1\nl2 CHANGED\nl3\nstable\n")]);
        let doc = "\
<!-- generated:Gen/F.g.cs#L1-L3 -->
```csharp
l1
l2
l3
```

<!-- generated:Gen/F.g.cs#L4-L4 -->
```csharp
stable
```
";
        let findings = verify_document(&scan_of(doc), dir.path());
        assert_eq!(findings.len(), 2);
        assert!(matches!(
            findings.first().map(|f| &f.outcome),
            Some(Outcome::Drift { .. })
        ));
        assert!(matches!(
            findings.get(1).map(|f| &f.outcome),
            Some(Outcome::MarkerOk { .. })
        ));
    }

    #[test]
    fn drift_carries_both_texts_for_diffing() {
        let dir = samples(&[("F.cs", "new line\n")]);
        let doc = "<!-- generated:F.cs#L1-L1 -->\n```csharp\nold line\n```\n";
        let findings = verify_document(&scan_of(doc), dir.path());
        let Some(Outcome::Drift { actual, expected, reference }) =
            findings.first().map(|f| &f.outcome)
        else {
            panic!("expected drift, got {findings:?}");
        };
        assert_eq!(actual, "old line");
        assert_eq!(expected, "new line");
        assert_eq!(reference, "F.cs#L1-L1");
    }

    #[test]
    fn missing_file_is_broken_not_drift() {
        let dir = samples(&[]);
        let doc = "<!-- generated:Nope.cs#L1-L2 -->\n```csharp\nx\n```\n";
        let findings = verify_document(&scan_of(doc), dir.path());
        assert!(matches!(
            findings.first().map(|f| &f.outcome),
            Some(Outcome::Structural {
                error: StructuralKind::BrokenGeneratedRef { .. }
            })
        ));
    }

    #[test]
    fn out_of_range_lines_are_broken_not_drift() {
        let dir = samples(&[("F.cs", "only one line\n")]);
        let doc = "<!-- generated:F.cs#L1-L9 -->\n```csharp\nonly one line\n```\n";
        let findings = verify_document(&scan_of(doc), dir.path());
        assert!(matches!(
            findings.first().map(|f| &f.outcome),
            Some(Outcome::Structural {
                error: StructuralKind::BrokenGeneratedRef { .. }
            })
        ));
    }

    #[test]
    fn indented_blocks_compare_after_rebasing() {
        let dir = samples(&[("F.cs", "line one\nline two\n")]);
        let doc = "- item\n\n  <!-- generated:F.cs#L1-L2 -->\n  ```csharp\n  line one\n  line two\n  ```\n";
        let findings = verify_document(&scan_of(doc), dir.path());
        assert_eq!(
            findings.first().map(|f| &f.outcome),
            Some(&Outcome::MarkerOk { marker: "generated".to_string() })
        );
    }
}
