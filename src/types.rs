//! Core domain types: markers, spans, regions, and per-marker outcomes.

use std::path::PathBuf;

use serde::Serialize;

/// One outcome anchored to a file and line. The unit of reporting:
/// every marker, structural error, and index failure becomes a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// File the finding refers to: a document for marker outcomes,
    /// a samples file for index errors.
    pub file: PathBuf,
    /// One-based line number within `file`. Zero when the failure
    /// concerns the file as a whole.
    pub line: u32,
    /// What was found.
    pub outcome: Outcome,
}

/// The typed annotation governing one fenced code block.
/// `Unmarked` is the default/error variant: a compilable block that
/// no marker claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Verbatim excerpt of a samples file between two line numbers.
    Generated {
        /// One-based inclusive last line of the excerpt.
        line_end: u32,
        /// One-based inclusive first line of the excerpt.
        line_start: u32,
        /// Samples-root-relative path of the excerpted file.
        path: PathBuf,
    },
    /// Intentionally non-compiling example; body is fixed content.
    Invalid {
        /// Marker id.
        id: String,
    },
    /// Illustrative fragment exempt from substitution.
    Pseudo {
        /// Marker id.
        id: String,
    },
    /// Block owned by the tool and substituted from a named region.
    Snippet {
        /// Region name to resolve.
        id: String,
    },
    /// Compilable fence with no governing marker.
    Unmarked {
        /// Language tag of the fence.
        lang: String,
    },
}

impl Marker {
    /// Short lowercase label used in findings and warnings.
    pub fn label(&self) -> &'static str {
        return match self {
            Marker::Generated { .. } => "generated",
            Marker::Invalid { .. } => "invalid",
            Marker::Pseudo { .. } => "pseudo",
            Marker::Snippet { .. } => "snippet",
            Marker::Unmarked { .. } => "unmarked",
        };
    }
}

/// Per-marker resolution or verification outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The snippet id is defined by more than one region.
    Ambiguous {
        /// `file:start-end` locations of every defining region, sorted.
        candidates: Vec<String>,
        /// The contested region name.
        id: String,
    },
    /// A generated marker's body no longer matches its line range.
    Drift {
        /// Body currently frozen in the document.
        actual: String,
        /// Current content of the referenced lines.
        expected: String,
        /// Human-readable `path#Lstart-Lend` reference.
        reference: String,
    },
    /// An invalid, pseudo, or generated marker that needed no action.
    MarkerOk {
        /// Which marker kind this was.
        marker: String,
    },
    /// A snippet marker matched exactly one region.
    Resolved {
        /// The resolved region name.
        id: String,
        /// Whether resolution changed the document interior.
        rewritten: bool,
    },
    /// The file's shape is broken; the marker or region is unusable.
    Structural {
        /// What is broken.
        error: StructuralKind,
    },
    /// A compilable fence with no governing marker. Never auto-healed.
    Unmarked {
        /// Language tag of the fence.
        lang: String,
    },
    /// No region anywhere in the samples tree has this name.
    Unmatched {
        /// The unresolved snippet id.
        id: String,
        /// A region name that matches after normalization, if any.
        suggestion: Option<String>,
    },
}

/// One marker with its document position and raw interior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMarker {
    /// Raw interior lines (fence content, or the directive-to-trailer
    /// interior for snippets), joined with newlines, indentation kept.
    pub body: String,
    /// Leading whitespace of the marker line. Rendered content is
    /// re-based to this column.
    pub indent: String,
    /// The governing variant.
    pub marker: Marker,
    /// One-based inclusive span of the whole construct.
    pub span: Span,
}

/// A named, delimited span of source inside the samples tree.
/// Content is opaque text, copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Lines between the delimiters, joined with newlines.
    pub content: String,
    /// One-based line of the end delimiter.
    pub end_line: u32,
    /// Samples-root-relative path of the defining file.
    pub file: PathBuf,
    /// Region name from the start delimiter's capture.
    pub name: String,
    /// One-based line of the start delimiter.
    pub start_line: u32,
}

impl Region {
    /// `file:start-end` location string used in candidate lists.
    pub fn location(&self) -> String {
        return format!("{}:{}-{}", self.file.display(), self.start_line, self.end_line);
    }
}

/// One-based inclusive line span of a marker construct in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Last line of the construct (trailer or closing fence).
    pub end_line: u32,
    /// First line of the construct (directive or marker comment).
    pub start_line: u32,
}

/// Structural errors: the file's shape is broken, as opposed to a
/// resolution failure. Isolated per file; never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum StructuralKind {
    /// A generated marker whose reference cannot be read at all.
    BrokenGeneratedRef {
        /// Why the reference is unusable.
        detail: String,
    },
    /// A marker id that fails the `^[a-z0-9-]+$` contract.
    MalformedId {
        /// The offending id.
        id: String,
    },
    /// A marker comment not immediately followed by a fenced block.
    MarkerWithoutBlock {
        /// Which marker kind was orphaned.
        marker: String,
    },
    /// A snippet directive with no `endSnippet` before end-of-file.
    MissingTrailer {
        /// The directive's id.
        id: String,
    },
    /// Two open regions with one name in one file: ambiguous boundary.
    NestedDuplicateRegion {
        /// The duplicated region name.
        name: String,
    },
    /// A region end delimiter with no open region.
    StrayRegionEnd,
    /// The file exists but cannot be read.
    UnreadableFile {
        /// The underlying I/O failure.
        detail: String,
    },
    /// A fence opened but never closed before end-of-file.
    UnterminatedFence,
    /// A region start with no matching end by end-of-file.
    UnterminatedRegion {
        /// The unterminated region name.
        name: String,
    },
}

impl std::fmt::Display for StructuralKind {
    /// One-line description used in report rows.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return match self {
            StructuralKind::BrokenGeneratedRef { detail } => {
                write!(f, "broken generated reference: {detail}")
            },
            StructuralKind::MalformedId { id } => {
                write!(f, "malformed id `{id}` (expected lowercase letters, digits, hyphens)")
            },
            StructuralKind::MarkerWithoutBlock { marker } => {
                write!(f, "{marker} marker not followed by a fenced block")
            },
            StructuralKind::MissingTrailer { id } => {
                write!(f, "snippet `{id}` has no endSnippet trailer")
            },
            StructuralKind::NestedDuplicateRegion { name } => {
                write!(f, "nested regions share the name `{name}`")
            },
            StructuralKind::StrayRegionEnd => {
                write!(f, "region end with no open region")
            },
            StructuralKind::UnreadableFile { detail } => {
                write!(f, "unreadable file: {detail}")
            },
            StructuralKind::UnterminatedFence => {
                write!(f, "fence opened but never closed")
            },
            StructuralKind::UnterminatedRegion { name } => {
                write!(f, "region `{name}` is never closed")
            },
        };
    }
}

/// Advisory findings. Warnings never affect the exit code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An invalid or pseudo block whose body equals an indexed region
    /// with the same id. The marker type was probably chosen in error;
    /// intent cannot be proven, so this is advisory only.
    MarkerShadowsRegion {
        /// Document containing the marker.
        file: PathBuf,
        /// The shadowing marker's id.
        id: String,
        /// One-based line of the marker.
        line: u32,
        /// Which marker kind shadows the region.
        marker: String,
    },
    /// Pseudo blocks exceed the configured share of governed blocks.
    PseudoRatioExceeded {
        /// Configured limit as a fraction.
        limit: f64,
        /// Pseudo marker count.
        pseudo: usize,
        /// All governed markers counted.
        total: usize,
    },
}

impl std::fmt::Display for Warning {
    /// One-line advisory text.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return match self {
            Warning::MarkerShadowsRegion { file, id, line, marker } => write!(
                f,
                "{}:{line}: {marker} block is identical to region `{id}`; should this be a snippet?",
                file.display()
            ),
            Warning::PseudoRatioExceeded { limit, pseudo, total } => write!(
                f,
                "{pseudo} of {total} governed blocks are pseudo (configured limit {limit})"
            ),
        };
    }
}
