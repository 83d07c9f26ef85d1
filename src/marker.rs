//! Marker parser: one pure pass over a document's text that classifies
//! every fenced code block into the closed marker taxonomy.
//!
//! Parse once into tagged variants, then dispatch per variant; no regex
//! dispatch is scattered through the rest of the pipeline.

use std::path::PathBuf;

use regex::Regex;

use crate::types::{Marker, ParsedMarker, Span, StructuralKind};

/// Head of a recognized HTML comment marker, before its fence is read.
enum CommentHead {
    /// `<!-- generated:path#Lstart-Lend -->` with a parsed reference.
    Generated {
        /// One-based inclusive last line.
        line_end: u32,
        /// One-based inclusive first line.
        line_start: u32,
        /// Samples-root-relative path.
        path: PathBuf,
    },
    /// `<!-- invalid:id -->` with a valid id.
    Invalid {
        /// Marker id.
        id: String,
    },
    /// A recognized marker comment with an unusable payload.
    Malformed {
        /// The structural error to report.
        kind: StructuralKind,
    },
    /// `<!-- pseudo:id -->` with a valid id.
    Pseudo {
        /// Marker id.
        id: String,
    },
}

impl CommentHead {
    /// Marker kind label for orphaned-marker reporting.
    fn label(&self) -> &'static str {
        return match self {
            CommentHead::Generated { .. } => "generated",
            CommentHead::Invalid { .. } => "invalid",
            CommentHead::Malformed { .. } => "marker",
            CommentHead::Pseudo { .. } => "pseudo",
        };
    }
}

/// Compiled marker grammar, built once per run and shared by workers.
pub struct MarkerGrammar {
    /// HTML comment markers: `invalid`, `generated`, `pseudo`.
    comment: Regex,
    /// Compilable fence tags, lowercased.
    fences: Vec<String>,
    /// Generated reference payload: `path#Lstart-Lend`.
    generated_ref: Regex,
    /// The id contract shared by all named markers.
    id: Regex,
    /// Snippet directive, bare or comment-wrapped.
    snippet: Regex,
    /// Snippet trailer, bare or comment-wrapped.
    trailer: Regex,
}

impl MarkerGrammar {
    /// Classify a bare fenced block. Only blocks carrying a compilable
    /// tag become `Unmarked` markers; prose fences are not our concern.
    fn consume_bare_fence(
        &self,
        lines: &[&str],
        start: usize,
        ticks: usize,
        lang: &str,
        out: &mut ParseOutput,
    ) -> usize {
        let Some(close) = find_fence_close(lines, start.saturating_add(1), ticks) else {
            out.structural.push((line_number(start), StructuralKind::UnterminatedFence));
            return lines.len();
        };

        if self.fences.iter().any(|f| f == lang) {
            let opening = lines.get(start).copied().unwrap_or("");
            let indent: String = opening.chars().take_while(|c| c.is_whitespace()).collect();
            let body = lines.get(start.saturating_add(1)..close).unwrap_or(&[]).join("\n");
            out.markers.push(ParsedMarker {
                body,
                indent,
                marker: Marker::Unmarked { lang: lang.to_string() },
                span: Span {
                    end_line: line_number(close),
                    start_line: line_number(start),
                },
            });
        }

        return close.saturating_add(1);
    }

    /// Consume a comment marker and the fence it must govern.
    /// The fence must open on the very next line; anything else orphans
    /// the marker.
    fn consume_comment_marker(
        &self,
        lines: &[&str],
        start: usize,
        indent: &str,
        head: CommentHead,
        out: &mut ParseOutput,
    ) -> usize {
        let fence_line = start.saturating_add(1);
        let Some((ticks, _lang)) = lines.get(fence_line).and_then(|l| fence_open(l)) else {
            out.structural.push((
                line_number(start),
                StructuralKind::MarkerWithoutBlock { marker: head.label().to_string() },
            ));
            return fence_line;
        };

        let Some(close) = find_fence_close(lines, fence_line.saturating_add(1), ticks) else {
            out.structural.push((line_number(fence_line), StructuralKind::UnterminatedFence));
            return lines.len();
        };

        let marker = match head {
            CommentHead::Generated { line_end, line_start, path } => Marker::Generated {
                line_end,
                line_start,
                path,
            },
            CommentHead::Invalid { id } => Marker::Invalid { id },
            CommentHead::Malformed { kind } => {
                out.structural.push((line_number(start), kind));
                return close.saturating_add(1);
            },
            CommentHead::Pseudo { id } => Marker::Pseudo { id },
        };

        let body = lines.get(fence_line.saturating_add(1)..close).unwrap_or(&[]).join("\n");
        out.markers.push(ParsedMarker {
            body,
            indent: indent.to_string(),
            marker,
            span: Span {
                end_line: line_number(close),
                start_line: line_number(start),
            },
        });
        return close.saturating_add(1);
    }

    /// Consume a snippet directive through its trailer. A directive
    /// with no trailer before end-of-file (or before the next
    /// directive) is an orphaned marker.
    fn consume_snippet(
        &self,
        lines: &[&str],
        start: usize,
        indent: &str,
        id: &str,
        out: &mut ParseOutput,
    ) -> usize {
        let mut end: Option<usize> = None;
        let mut j = start.saturating_add(1);
        while let Some(line) = lines.get(j) {
            if self.trailer.is_match(line) {
                end = Some(j);
                break;
            }
            if self.match_directive(line).is_some() {
                break;
            }
            j = j.saturating_add(1);
        }

        let Some(end) = end else {
            out.structural.push((
                line_number(start),
                StructuralKind::MissingTrailer { id: id.to_string() },
            ));
            return start.saturating_add(1);
        };

        if !self.id.is_match(id) {
            out.structural.push((
                line_number(start),
                StructuralKind::MalformedId { id: id.to_string() },
            ));
            return end.saturating_add(1);
        }

        let body = lines.get(start.saturating_add(1)..end).unwrap_or(&[]).join("\n");
        out.markers.push(ParsedMarker {
            body,
            indent: indent.to_string(),
            marker: Marker::Snippet { id: id.to_string() },
            span: Span {
                end_line: line_number(end),
                start_line: line_number(start),
            },
        });
        return end.saturating_add(1);
    }

    /// Match one of the three HTML comment marker forms.
    fn match_comment(&self, line: &str) -> Option<(String, CommentHead)> {
        let cap = self.comment.captures(line)?;
        let indent = cap.name("indent").map_or("", |m| m.as_str()).to_string();
        let kind = cap.name("kind").map_or("", |m| m.as_str());
        let payload = cap.name("ref").map_or("", |m| m.as_str());

        let head = match kind {
            "generated" => self.parse_generated_ref(payload),
            "invalid" => self.named_head(payload, |id| CommentHead::Invalid { id }),
            "pseudo" => self.named_head(payload, |id| CommentHead::Pseudo { id }),
            _ => return None,
        };
        return Some((indent, head));
    }

    /// Match a snippet directive line, returning (indent, id).
    fn match_directive(&self, line: &str) -> Option<(String, String)> {
        let cap = self.snippet.captures(line)?;
        let indent = cap.name("indent").map_or("", |m| m.as_str());
        let id = cap.name("id")?.as_str();
        return Some((indent.to_string(), id.to_string()));
    }

    /// Build a named comment head, downgrading a bad id to a
    /// structural error.
    fn named_head(&self, payload: &str, build: impl FnOnce(String) -> CommentHead) -> CommentHead {
        if self.id.is_match(payload) {
            return build(payload.to_string());
        }
        return CommentHead::Malformed {
            kind: StructuralKind::MalformedId { id: payload.to_string() },
        };
    }

    /// Compile the grammar for the given compilable fence tags.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded marker regexes are invalid
    /// (compile-time invariant).
    #[allow(clippy::expect_used, reason = "hardcoded patterns are a compile-time invariant")]
    pub fn new(fences: &[String]) -> Self {
        return Self {
            comment: Regex::new(
                r"^(?P<indent>[ \t]*)<!--\s*(?P<kind>generated|invalid|pseudo):\s*(?P<ref>[^>]+?)\s*-->\s*$",
            )
            .expect("valid regex"),
            fences: fences.iter().map(|f| f.to_ascii_lowercase()).collect(),
            generated_ref: Regex::new(r"^(?P<path>[^#]+)#L(?P<start>[0-9]+)-L(?P<end>[0-9]+)$")
                .expect("valid regex"),
            id: Regex::new(r"^[a-z0-9-]+$").expect("valid regex"),
            snippet: Regex::new(
                r"^(?P<indent>[ \t]*)(?:<!--\s*)?snippet:\s*(?P<id>\S+?)\s*(?:-->)?\s*$",
            )
            .expect("valid regex"),
            trailer: Regex::new(r"^[ \t]*(?:endSnippet|<!--\s*(?:endSnippet|/snippet)\s*-->)\s*$")
                .expect("valid regex"),
        };
    }

    /// Scan a document into markers and structural errors. Pure: no
    /// side effects, output in document order.
    pub fn parse(&self, text: &str) -> ParseOutput {
        let lines: Vec<&str> = text.lines().collect();
        let mut out = ParseOutput {
            markers: Vec::new(),
            structural: Vec::new(),
        };

        let mut i = 0_usize;
        while i < lines.len() {
            let Some(line) = lines.get(i).copied() else { break };
            if let Some((indent, id)) = self.match_directive(line) {
                i = self.consume_snippet(&lines, i, &indent, &id, &mut out);
            } else if let Some((indent, head)) = self.match_comment(line) {
                i = self.consume_comment_marker(&lines, i, &indent, head, &mut out);
            } else if let Some((ticks, lang)) = fence_open(line) {
                i = self.consume_bare_fence(&lines, i, ticks, &lang, &mut out);
            } else {
                i = i.saturating_add(1);
            }
        }

        return out;
    }

    /// Parse a `path#Lstart-Lend` generated reference payload.
    fn parse_generated_ref(&self, payload: &str) -> CommentHead {
        let broken = |detail: String| CommentHead::Malformed {
            kind: StructuralKind::BrokenGeneratedRef { detail },
        };
        let Some(cap) = self.generated_ref.captures(payload) else {
            return broken(format!("malformed reference `{payload}` (expected path#Lstart-Lend)"));
        };
        let path = cap.name("path").map_or("", |m| m.as_str());
        let Some(line_start) = cap.name("start").and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            return broken(format!("line number out of range in `{payload}`"));
        };
        let Some(line_end) = cap.name("end").and_then(|m| m.as_str().parse::<u32>().ok()) else {
            return broken(format!("line number out of range in `{payload}`"));
        };
        return CommentHead::Generated {
            line_end,
            line_start,
            path: PathBuf::from(path),
        };
    }
}

/// Result of parsing one document: markers in document order plus
/// structural errors as (line, kind) pairs.
pub struct ParseOutput {
    /// Markers in document order.
    pub markers: Vec<ParsedMarker>,
    /// Structural errors found while parsing, with their line numbers.
    pub structural: Vec<(u32, StructuralKind)>,
}

/// Match a fence opening, returning (backtick count, lowercased tag).
/// Info strings containing backticks are not fences per CommonMark.
fn fence_open(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start();
    let ticks = trimmed.chars().take_while(|c| *c == '`').count();
    if ticks < 3 {
        return None;
    }
    let info = trimmed.get(ticks..)?.trim();
    if info.contains('`') {
        return None;
    }
    let lang = info.split_whitespace().next().unwrap_or("").to_ascii_lowercase();
    return Some((ticks, lang));
}

/// Find the closing fence for an opening of `open_ticks` backticks.
/// A closer is a line of only backticks, at least as long as the opener.
fn find_fence_close(lines: &[&str], from: usize, open_ticks: usize) -> Option<usize> {
    let mut j = from;
    while let Some(line) = lines.get(j) {
        let trimmed = line.trim();
        if !trimmed.is_empty()
            && trimmed.len() >= open_ticks
            && trimmed.chars().all(|c| c == '`')
        {
            return Some(j);
        }
        j = j.saturating_add(1);
    }
    return None;
}

/// Convert a zero-based line index to a one-based line number.
fn line_number(index: usize) -> u32 {
    return u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1);
}
