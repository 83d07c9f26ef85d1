//! Snippet resolution: match markers to regions and rewrite document
//! interiors in memory.
//!
//! Region-name collisions across files are a first-class error, never
//! resolved by first-match: silent resolution is how documentation
//! drifts from source.

use crate::index::SourceIndex;
use crate::scanner::DocumentScan;
use crate::types::{Finding, Marker, Outcome, ParsedMarker, Region, Warning};

/// Result of resolving one document: findings, advisory warnings, and
/// the rewritten text. Nothing touches disk here.
pub struct Resolution {
    /// Per-marker outcomes in document order.
    pub findings: Vec<Finding>,
    /// The document text after snippet substitution. Equal to the
    /// original when nothing was rewritten.
    pub new_text: String,
    /// Advisory warnings for this document.
    pub warnings: Vec<Warning>,
}

/// Longest whitespace prefix shared by all non-blank lines.
fn common_indent(text: &str) -> String {
    let mut prefix: Option<String> = None;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let end = line.len().saturating_sub(line.trim_start().len());
        let ws = line.get(..end).unwrap_or("");
        let next = match &prefix {
            None => ws.to_string(),
            Some(p) => shared_prefix(p, ws),
        };
        if next.is_empty() {
            return String::new();
        }
        prefix = Some(next);
    }
    return prefix.unwrap_or_default();
}

/// Copy a raw line range into the output buffer.
fn copy_lines(out: &mut Vec<String>, lines: &[&str], from: usize, to: usize) {
    for line in lines.get(from..to).unwrap_or(&[]) {
        out.push((*line).to_string());
    }
}

/// Strip the common leading whitespace from every line.
fn dedent(text: &str) -> String {
    let prefix = common_indent(text);
    if prefix.is_empty() {
        return text.to_string();
    }
    let stripped: Vec<&str> = text
        .lines()
        .map(|l| l.strip_prefix(prefix.as_str()).unwrap_or(l))
        .collect();
    return stripped.join("\n");
}

/// Fence length for rendered content: one backtick more than the
/// longest backtick run opening a line, at least three. Content is
/// copied verbatim; nested fences are contained, never re-parsed.
fn fence_ticks(content: &str) -> usize {
    let longest = content
        .lines()
        .map(|l| l.trim_start().chars().take_while(|c| *c == '`').count())
        .max()
        .unwrap_or(0);
    return longest.saturating_add(1).max(3);
}

/// Anchor an outcome to a marker's position in the document.
fn finding(scan: &DocumentScan, marker: &ParsedMarker, outcome: Outcome) -> Finding {
    return Finding {
        file: scan.path.clone(),
        line: marker.span.start_line,
        outcome,
    };
}

/// Convert a one-based line number to a zero-based index.
fn index0(line: u32) -> usize {
    return usize::try_from(line).unwrap_or(usize::MAX).saturating_sub(1);
}

/// Render a region as a fenced block re-based to the marker's column,
/// so snippets nested in lists or quotes stay valid markdown.
fn render_interior(content: &str, indent: &str, fence_tag: &str) -> Vec<String> {
    let dedented = dedent(content);
    let fence = "`".repeat(fence_ticks(&dedented));

    let mut rendered = Vec::new();
    rendered.push(format!("{indent}{fence}{fence_tag}"));
    for line in dedented.lines() {
        if line.is_empty() {
            rendered.push(String::new());
        } else {
            rendered.push(format!("{indent}{line}"));
        }
    }
    rendered.push(format!("{indent}{fence}"));
    return rendered;
}

/// Resolve every marker in one document against the index.
///
/// Snippet interiors are substituted; invalid and pseudo blocks are
/// left untouched; generated markers are the drift verifier's concern;
/// unmarked blocks are reported and never auto-healed.
pub fn resolve_document(
    scan: &DocumentScan,
    index: &SourceIndex,
    render_fence: &str,
) -> Resolution {
    let lines: Vec<&str> = scan.source.lines().collect();
    let mut findings = Vec::new();
    let mut warnings = Vec::new();
    let mut out: Vec<String> = Vec::new();
    let mut cursor = 0_usize;

    for marker in &scan.markers {
        match &marker.marker {
            // Never rewritten here: the drift verifier owns these.
            Marker::Generated { .. } => {},
            Marker::Invalid { id } | Marker::Pseudo { id } => {
                let label = marker.marker.label().to_string();
                findings.push(finding(scan, marker, Outcome::MarkerOk { marker: label.clone() }));
                if shadows_region(marker, id, index) {
                    warnings.push(Warning::MarkerShadowsRegion {
                        file: scan.path.clone(),
                        id: id.clone(),
                        line: marker.span.start_line,
                        marker: label,
                    });
                }
            },
            Marker::Snippet { id } => match index.lookup(id) {
                [] => {
                    findings.push(finding(
                        scan,
                        marker,
                        Outcome::Unmatched { id: id.clone(), suggestion: index.suggest(id) },
                    ));
                },
                [region] => {
                    let directive_idx = index0(marker.span.start_line);
                    let trailer_idx = index0(marker.span.end_line);
                    let interior = render_interior(&region.content, &marker.indent, render_fence);
                    let old = lines.get(directive_idx.saturating_add(1)..trailer_idx).unwrap_or(&[]);
                    let rewritten = !interior.iter().map(String::as_str).eq(old.iter().copied());

                    copy_lines(&mut out, &lines, cursor, directive_idx.saturating_add(1));
                    out.extend(interior);
                    cursor = trailer_idx;

                    findings.push(finding(
                        scan,
                        marker,
                        Outcome::Resolved { id: id.clone(), rewritten },
                    ));
                },
                candidates => {
                    findings.push(finding(
                        scan,
                        marker,
                        Outcome::Ambiguous {
                            candidates: candidates.iter().map(Region::location).collect(),
                            id: id.clone(),
                        },
                    ));
                },
            },
            Marker::Unmarked { lang } => {
                findings.push(finding(scan, marker, Outcome::Unmarked { lang: lang.clone() }));
            },
        }
    }

    copy_lines(&mut out, &lines, cursor, lines.len());
    let mut new_text = out.join("\n");
    if scan.source.ends_with('\n') && !new_text.is_empty() {
        new_text.push('\n');
    }

    return Resolution { findings, new_text, warnings };
}

/// Whether an invalid/pseudo body is identical to an indexed region
/// with the same id, after dedenting both sides.
fn shadows_region(marker: &ParsedMarker, id: &str, index: &SourceIndex) -> bool {
    let body = dedent(&strip_indent(&marker.body, &marker.indent));
    return index
        .lookup(id)
        .iter()
        .any(|region| dedent(&region.content).trim() == body.trim());
}

/// Longest common prefix of two strings.
fn shared_prefix(a: &str, b: &str) -> String {
    return a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect();
}

/// Remove a known indentation prefix from every line that carries it.
pub(crate) fn strip_indent(text: &str, indent: &str) -> String {
    if indent.is_empty() {
        return text.to_string();
    }
    let stripped: Vec<&str> = text.lines().map(|l| l.strip_prefix(indent).unwrap_or(l)).collect();
    return stripped.join("\n");
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config;
    use crate::index::RegionMatcher;
    use crate::marker::MarkerGrammar;

    fn scan_of(text: &str) -> DocumentScan {
        let grammar = MarkerGrammar::new(&["csharp".to_string()]);
        let parsed = grammar.parse(text);
        DocumentScan {
            markers: parsed.markers,
            path: PathBuf::from("guide.md"),
            source: text.to_string(),
            structural: Vec::new(),
        }
    }

    fn index_of(files: &[(&str, &str)]) -> SourceIndex {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let matcher =
            RegionMatcher::new(config::DEFAULT_REGION_START, config::DEFAULT_REGION_END).unwrap();
        SourceIndex::build(dir.path(), &matcher, 1, false).unwrap()
    }

    #[test]
    fn resolves_a_snippet_from_its_region() {
        let index = index_of(&[(
            "Hello.cs",
            "#region hello-world\nreturn \"Hello, World!\";\n#endregion\n",
        )]);
        let scan = scan_of("# Start\n\nsnippet: hello-world\nendSnippet\n");
        let resolution = resolve_document(&scan, &index, "csharp");

        assert_eq!(
            resolution.new_text,
            "# Start\n\nsnippet: hello-world\n```csharp\nreturn \"Hello, World!\";\n```\nendSnippet\n"
        );
        assert_eq!(
            resolution.findings,
            vec![Finding {
                file: PathBuf::from("guide.md"),
                line: 3,
                outcome: Outcome::Resolved { id: "hello-world".to_string(), rewritten: true },
            }]
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let index = index_of(&[(
            "Hello.cs",
            "#region hello-world\nreturn \"Hello, World!\";\n#endregion\n",
        )]);
        let first = resolve_document(
            &scan_of("snippet: hello-world\nendSnippet\n"),
            &index,
            "csharp",
        );
        let second = resolve_document(&scan_of(&first.new_text), &index, "csharp");

        assert_eq!(second.new_text, first.new_text);
        assert!(matches!(
            second.findings.first().map(|f| &f.outcome),
            Some(Outcome::Resolved { rewritten: false, .. })
        ));
    }

    #[test]
    fn round_trip_preserves_region_content() {
        let content = "var a = 1;\nvar b = 2;";
        let index = index_of(&[("S.cs", "#region demo\nvar a = 1;\nvar b = 2;\n#endregion\n")]);
        let resolution =
            resolve_document(&scan_of("snippet: demo\nendSnippet\n"), &index, "csharp");

        let grammar = MarkerGrammar::new(&["csharp".to_string()]);
        let reparsed = grammar.parse(&resolution.new_text);
        let body = &reparsed.markers.first().unwrap().body;
        assert_eq!(body, &format!("```csharp\n{content}\n```"));
    }

    #[test]
    fn rendered_content_rebases_to_the_directive_indent() {
        let index = index_of(&[(
            "S.cs",
            "class C {\n    #region demo\n    var a = 1;\n\n    var b = 2;\n    #endregion\n}\n",
        )]);
        let scan = scan_of("- step one\n\n  snippet: demo\n  endSnippet\n");
        let resolution = resolve_document(&scan, &index, "csharp");

        assert_eq!(
            resolution.new_text,
            "- step one\n\n  snippet: demo\n  ```csharp\n  var a = 1;\n\n  var b = 2;\n  ```\n  endSnippet\n"
        );
    }

    #[test]
    fn region_name_collisions_are_ambiguous_not_first_match() {
        let index = index_of(&[
            ("A.cs", "#region example-1\nfrom a\n#endregion\n"),
            ("B.cs", "#region example-1\nfrom b\n#endregion\n"),
        ]);
        let scan = scan_of("snippet: example-1\nendSnippet\n");
        let resolution = resolve_document(&scan, &index, "csharp");

        assert_eq!(resolution.new_text, scan.source);
        assert_eq!(
            resolution.findings,
            vec![Finding {
                file: PathBuf::from("guide.md"),
                line: 1,
                outcome: Outcome::Ambiguous {
                    candidates: vec!["A.cs:1-3".to_string(), "B.cs:1-3".to_string()],
                    id: "example-1".to_string(),
                },
            }]
        );
    }

    #[test]
    fn unmatched_snippet_carries_a_suggestion() {
        let index = index_of(&[("A.cs", "#region hello-world\nhi\n#endregion\n")]);
        let scan = scan_of("snippet: helloworld\nendSnippet\n");
        let resolution = resolve_document(&scan, &index, "csharp");

        assert_eq!(
            resolution.findings.first().map(|f| &f.outcome),
            Some(&Outcome::Unmatched {
                id: "helloworld".to_string(),
                suggestion: Some("hello-world".to_string()),
            })
        );
    }

    #[test]
    fn region_containing_a_fence_gets_a_longer_fence() {
        let index = index_of(&[(
            "S.cs",
            "#region demo\nvar md = \"x\";\n```\ninner\n```\n#endregion\n",
        )]);
        let resolution =
            resolve_document(&scan_of("snippet: demo\nendSnippet\n"), &index, "csharp");
        assert!(resolution.new_text.contains("````csharp\n"));
        assert!(resolution.new_text.contains("\n````\nendSnippet\n"));
    }

    #[test]
    fn invalid_blocks_are_left_untouched() {
        let index = index_of(&[("A.cs", "#region other\nx\n#endregion\n")]);
        let doc = "<!-- invalid:wont-compile -->\n```csharp\nvar x = ;\n```\n";
        let resolution = resolve_document(&scan_of(doc), &index, "csharp");

        assert_eq!(resolution.new_text, doc);
        assert_eq!(
            resolution.findings.first().map(|f| &f.outcome),
            Some(&Outcome::MarkerOk { marker: "invalid".to_string() })
        );
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn invalid_block_shadowing_a_region_warns() {
        let index = index_of(&[("A.cs", "#region demo\nvar x = 1;\n#endregion\n")]);
        let doc = "<!-- invalid:demo -->\n```csharp\nvar x = 1;\n```\n";
        let resolution = resolve_document(&scan_of(doc), &index, "csharp");

        assert_eq!(resolution.new_text, doc);
        assert!(matches!(
            resolution.warnings.first(),
            Some(Warning::MarkerShadowsRegion { .. })
        ));
    }

    #[test]
    fn unmarked_blocks_are_reported_never_healed() {
        let index = index_of(&[("A.cs", "#region demo\nx\n#endregion\n")]);
        let doc = "```csharp\nvar orphan = 1;\n```\n";
        let resolution = resolve_document(&scan_of(doc), &index, "csharp");

        assert_eq!(resolution.new_text, doc);
        assert_eq!(
            resolution.findings.first().map(|f| &f.outcome),
            Some(&Outcome::Unmarked { lang: "csharp".to_string() })
        );
    }
}
