//! Report aggregation, rendering, and CI exit codes.
//!
//! Findings are sorted by (file, line) before rendering, so output is
//! deterministic regardless of worker completion order.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

use crate::types::{Finding, Outcome, Warning};

/// Aggregated counts per outcome kind.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Counts {
    /// Snippet ids defined in more than one samples file.
    pub ambiguous: usize,
    /// Generated markers whose bodies no longer match their source.
    pub drift: usize,
    /// Markers that needed no action.
    pub ok: usize,
    /// Snippet markers matched to exactly one region.
    pub resolved: usize,
    /// Resolved markers whose interior actually changed.
    pub rewritten: usize,
    /// Structural errors across documents and samples files.
    pub structural: usize,
    /// Compilable fences with no governing marker.
    pub unmarked: usize,
    /// Snippet ids with no region anywhere in the samples tree.
    pub unmatched: usize,
}

impl Counts {
    /// Verification failures: everything that requires a human fix.
    fn failures(&self) -> usize {
        return self
            .ambiguous
            .saturating_add(self.drift)
            .saturating_add(self.structural)
            .saturating_add(self.unmarked)
            .saturating_add(self.unmatched);
    }

    /// Every classified code block, governed or unmarked.
    fn total_blocks(&self) -> usize {
        return self
            .ok
            .saturating_add(self.resolved)
            .saturating_add(self.ambiguous)
            .saturating_add(self.drift)
            .saturating_add(self.unmarked)
            .saturating_add(self.unmatched);
    }
}

/// Wire shape of the JSON report.
#[derive(Serialize)]
struct ReportJson<'a> {
    /// Whether this run was a read-only check.
    check_mode: bool,
    /// Aggregated counts.
    counts: Counts,
    /// All findings, sorted.
    findings: &'a [Finding],
    /// Documents rewritten, or pending rewrite in check mode.
    pending: &'a [PathBuf],
    /// Advisory warnings.
    warnings: &'a [Warning],
}

/// The run report: every finding across every document, the pending
/// writes, and the warnings. Single-writer: only the aggregation step
/// after parallel scanning touches it.
pub struct RunReport {
    /// Whether this run is a read-only check.
    pub check_mode: bool,
    /// Whether scanning was allowed to stop at the first structural error.
    pub fail_fast: bool,
    /// All findings; sorted by (file, line) by `finish`.
    pub findings: Vec<Finding>,
    /// Documents rewritten, or that would be rewritten in check mode.
    pub pending: Vec<PathBuf>,
    /// Advisory warnings, in document order.
    pub warnings: Vec<Warning>,
}

impl RunReport {
    /// Fold a batch of findings into the report.
    pub fn absorb(&mut self, findings: Vec<Finding>) {
        self.findings.extend(findings);
    }

    /// The process exit code as a number. 2 for verification failures,
    /// 1 for (pending) rewrites, 0 for clean. Priority: 2 > 1 > 0.
    pub fn code(&self) -> u8 {
        let counts = self.counts();
        if counts.failures() > 0 {
            return 2;
        }
        if !self.pending.is_empty() {
            return 1;
        }
        return 0;
    }

    /// Tally findings per outcome kind.
    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for finding in &self.findings {
            match &finding.outcome {
                Outcome::Ambiguous { .. } => counts.ambiguous = counts.ambiguous.saturating_add(1),
                Outcome::Drift { .. } => counts.drift = counts.drift.saturating_add(1),
                Outcome::MarkerOk { .. } => counts.ok = counts.ok.saturating_add(1),
                Outcome::Resolved { rewritten, .. } => {
                    counts.resolved = counts.resolved.saturating_add(1);
                    if *rewritten {
                        counts.rewritten = counts.rewritten.saturating_add(1);
                    }
                },
                Outcome::Structural { .. } => {
                    counts.structural = counts.structural.saturating_add(1);
                },
                Outcome::Unmarked { .. } => counts.unmarked = counts.unmarked.saturating_add(1),
                Outcome::Unmatched { .. } => counts.unmatched = counts.unmatched.saturating_add(1),
            }
        }
        return counts;
    }

    /// The process exit code for this run.
    pub fn exit_code(&self) -> ExitCode {
        return ExitCode::from(self.code());
    }

    /// Sort everything into deterministic order and apply run-level
    /// policies (the pseudo ratio warning).
    pub fn finish(&mut self, pseudo_warn_ratio: Option<f64>) {
        self.findings
            .sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        self.pending.sort();
        self.pending.dedup();

        let Some(limit) = pseudo_warn_ratio else { return };
        let pseudo = self
            .findings
            .iter()
            .filter(|f| {
                matches!(&f.outcome, Outcome::MarkerOk { marker } if marker == "pseudo")
            })
            .count();
        let counts = self.counts();
        let total = counts.total_blocks().saturating_sub(counts.unmarked);
        if total > 0 && ratio(pseudo, total) > limit {
            self.warnings.push(Warning::PseudoRatioExceeded { limit, pseudo, total });
        }
    }

    /// Create an empty report for a run.
    pub fn new(check_mode: bool, fail_fast: bool) -> Self {
        return Self {
            check_mode,
            fail_fast,
            findings: Vec::new(),
            pending: Vec::new(),
            warnings: Vec::new(),
        };
    }

    /// Record a document whose resolved text differs from disk.
    pub fn note_pending(&mut self, path: PathBuf) {
        self.pending.push(path);
    }

    /// Print the report: findings to stdout, recovery hints to stderr.
    pub fn print(&self, format: &str) {
        if format == "json" {
            println!("{}", self.render_json());
            return;
        }
        print!("{}", self.render_human());
        self.print_hints();
    }

    /// Recovery hints mirroring the failure kinds present.
    fn print_hints(&self) {
        let counts = self.counts();
        if self.check_mode && !self.pending.is_empty() {
            eprintln!();
            eprintln!("hint: run `snipsync` without --check to regenerate, then commit the diff");
        }
        if counts.drift > 0 {
            eprintln!();
            eprintln!("hint: review each drift diff, then update the marker's line range");
        }
        return;
    }

    /// Record an advisory warning.
    pub fn push_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Render the human-readable report.
    pub fn render_human(&self) -> String {
        let mut out = String::new();

        for finding in &self.findings {
            render_finding_row(&mut out, finding, self.check_mode);
        }

        for warning in &self.warnings {
            let _ = writeln!(out, "warning: {warning}");
        }

        let counts = self.counts();
        if self.fail_fast && counts.structural > 0 {
            let _ = writeln!(out, "fail-fast: scanning stopped at the first structural error");
        }

        if !out.is_empty() {
            let _ = writeln!(out);
        }
        render_summary(&mut out, &counts, self.check_mode, self.pending.len());
        return out;
    }

    /// Render the machine-readable report.
    pub fn render_json(&self) -> String {
        let json = ReportJson {
            check_mode: self.check_mode,
            counts: self.counts(),
            findings: &self.findings,
            pending: &self.pending,
            warnings: &self.warnings,
        };
        // serde_json::to_string_pretty won't fail on this structure.
        return serde_json::to_string_pretty(&json).unwrap_or_default();
    }

}

/// Share of pseudo blocks, computed in floating point for the limit
/// comparison only.
fn ratio(pseudo: usize, total: usize) -> f64 {
    let p = f64::from(u32::try_from(pseudo).unwrap_or(u32::MAX));
    let t = f64::from(u32::try_from(total).unwrap_or(u32::MAX));
    return p / t;
}

/// Render a unified line diff from the frozen document body to the
/// current source excerpt.
fn render_drift_diff(out: &mut String, actual: &str, expected: &str) {
    let diff = TextDiff::from_lines(actual, expected);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Equal => ' ',
            ChangeTag::Insert => '+',
        };
        let value = change.value().trim_end_matches('\n');
        let _ = writeln!(out, "    {sign} {value}");
    }
}

/// One report row per finding that demands attention. Fresh resolved
/// snippets and ok markers stay silent, as counts only.
fn render_finding_row(out: &mut String, finding: &Finding, check_mode: bool) {
    let at = format!("{}:{}", finding.file.display(), finding.line);
    match &finding.outcome {
        Outcome::Ambiguous { candidates, id } => {
            let defined_in = candidates.join(", ");
            let _ = writeln!(out, "AMBIGUOUS   {at}  snippet `{id}` defined in {defined_in}");
        },
        Outcome::Drift { actual, expected, reference } => {
            let _ = writeln!(out, "DRIFT       {at}  {reference}");
            render_drift_diff(out, actual, expected);
        },
        Outcome::MarkerOk { .. } | Outcome::Resolved { rewritten: false, .. } => {},
        Outcome::Resolved { id, rewritten: true } => {
            let label = if check_mode { "OUTDATED " } else { "REWROTE  " };
            let _ = writeln!(out, "{label}   {at}  snippet `{id}`");
        },
        Outcome::Structural { error } => {
            let _ = writeln!(out, "STRUCTURAL  {at}  {error}");
        },
        Outcome::Unmarked { lang } => {
            let _ = writeln!(out, "UNMARKED    {at}  {lang} block with no marker");
        },
        Outcome::Unmatched { id, suggestion } => {
            let mut row = format!("UNMATCHED   {at}  snippet `{id}` not found in samples");
            if let Some(s) = suggestion {
                let _ = write!(row, " (did you mean `{s}`?)");
            }
            let _ = writeln!(out, "{row}");
        },
    }
    return;
}

/// The closing one-line summary.
fn render_summary(out: &mut String, counts: &Counts, check_mode: bool, pending: usize) {
    if counts.failures() > 0 {
        let _ = writeln!(
            out,
            "{} unmatched, {} ambiguous, {} drifted, {} unmarked, {} structural",
            counts.unmatched, counts.ambiguous, counts.drift, counts.unmarked, counts.structural,
        );
        return;
    }
    if pending > 0 {
        if check_mode {
            let _ = writeln!(out, "{pending} documents need regeneration");
        } else {
            let _ = writeln!(out, "Rewrote {pending} documents ({} snippets)", counts.rewritten);
        }
        return;
    }
    let total = counts.total_blocks();
    let _ = writeln!(out, "All {total} code blocks accounted for");
    return;
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::types::StructuralKind;

    fn finding(file: &str, line: u32, outcome: Outcome) -> Finding {
        Finding { file: PathBuf::from(file), line, outcome }
    }

    #[test]
    fn clean_run_exits_zero() {
        let mut report = RunReport::new(false, false);
        report.absorb(vec![finding(
            "a.md",
            3,
            Outcome::Resolved { id: "x".to_string(), rewritten: false },
        )]);
        report.finish(None);
        assert_eq!(report.code(), 0);
    }

    #[test]
    fn rewrites_exit_one() {
        let mut report = RunReport::new(false, false);
        report.absorb(vec![finding(
            "a.md",
            3,
            Outcome::Resolved { id: "x".to_string(), rewritten: true },
        )]);
        report.note_pending(PathBuf::from("a.md"));
        report.finish(None);
        assert_eq!(report.code(), 1);
    }

    #[test]
    fn verification_failures_take_priority_over_rewrites() {
        let mut report = RunReport::new(false, false);
        report.absorb(vec![
            finding("a.md", 3, Outcome::Resolved { id: "x".to_string(), rewritten: true }),
            finding("b.md", 9, Outcome::Unmarked { lang: "csharp".to_string() }),
        ]);
        report.note_pending(PathBuf::from("a.md"));
        report.finish(None);
        assert_eq!(report.code(), 2);
    }

    #[test]
    fn findings_sort_by_file_then_line() {
        let mut report = RunReport::new(false, false);
        report.absorb(vec![
            finding("b.md", 2, Outcome::Unmarked { lang: "cs".to_string() }),
            finding("a.md", 9, Outcome::Unmarked { lang: "cs".to_string() }),
            finding("a.md", 3, Outcome::Unmarked { lang: "cs".to_string() }),
        ]);
        report.finish(None);
        let order: Vec<(String, u32)> = report
            .findings
            .iter()
            .map(|f| (f.file.display().to_string(), f.line))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.md".to_string(), 3),
                ("a.md".to_string(), 9),
                ("b.md".to_string(), 2)
            ]
        );
    }

    #[test]
    fn pseudo_ratio_limit_warns_but_never_fails() {
        let mut report = RunReport::new(false, false);
        report.absorb(vec![
            finding("a.md", 1, Outcome::MarkerOk { marker: "pseudo".to_string() }),
            finding("a.md", 8, Outcome::MarkerOk { marker: "pseudo".to_string() }),
            finding("a.md", 20, Outcome::Resolved { id: "x".to_string(), rewritten: false }),
        ]);
        report.finish(Some(0.5));
        assert!(matches!(
            report.warnings.first(),
            Some(Warning::PseudoRatioExceeded { pseudo: 2, total: 3, .. })
        ));
        assert_eq!(report.code(), 0);
    }

    #[test]
    fn drift_rows_render_a_line_diff() {
        let mut report = RunReport::new(true, false);
        report.absorb(vec![finding(
            "api.md",
            4,
            Outcome::Drift {
                actual: "old line".to_string(),
                expected: "new line".to_string(),
                reference: "F.cs#L1-L1".to_string(),
            },
        )]);
        report.finish(None);
        let human = report.render_human();
        assert!(human.contains("DRIFT       api.md:4  F.cs#L1-L1"), "got: {human}");
        assert!(human.contains("- old line"), "got: {human}");
        assert!(human.contains("+ new line"), "got: {human}");
    }

    #[test]
    fn structural_errors_render_distinctly() {
        let mut report = RunReport::new(false, false);
        report.absorb(vec![finding(
            "bad.md",
            7,
            Outcome::Structural {
                error: StructuralKind::MissingTrailer { id: "demo".to_string() },
            },
        )]);
        report.finish(None);
        assert!(report.render_human().contains("STRUCTURAL  bad.md:7"));
        assert_eq!(report.code(), 2);
    }

    #[test]
    fn json_report_round_trips_counts() {
        let mut report = RunReport::new(true, false);
        report.absorb(vec![finding(
            "a.md",
            2,
            Outcome::Unmatched { id: "nope".to_string(), suggestion: None },
        )]);
        report.finish(None);

        let value: serde_json::Value = serde_json::from_str(&report.render_json()).unwrap();
        assert_eq!(value["check_mode"], serde_json::json!(true));
        assert_eq!(value["counts"]["unmatched"], serde_json::json!(1));
        assert_eq!(value["findings"][0]["outcome"]["kind"], serde_json::json!("unmatched"));
    }
}
