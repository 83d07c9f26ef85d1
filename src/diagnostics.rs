use crate::error::Error;

/// ANSI bold, applied to markdown headings on stderr.
const BOLD: &str = "\x1b[1m";

/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to
/// stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render a fatal error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and how to fix it.
/// Designed to be readable by both humans and CI logs.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::DocsRootNotFound { path } => format!(
            "\
# Error: Docs Root Not Found

`{}` does not exist or is not a directory.

## Fix

Point at the documentation tree with `--docs <DIR>` or in `.snipsync.toml`:

    docs = \"docs\"
",
            path.display()
        ),

        Error::Io(e) => format!(
            "\
# Error: I/O

{e}
"
        ),

        Error::RegionPattern { pattern, reason } => format!(
            "\
# Error: Invalid Region Pattern

`{pattern}` cannot be used: {reason}

## Fix

The start pattern must be a valid regex with a `name` capture group:

    [region]
    start = '^\\s*#region\\s+(?P<name>\\S+)\\s*$'
    end = '^\\s*#endregion\\b'
"
        ),

        Error::SamplesRootNotFound { path } => format!(
            "\
# Error: Samples Root Not Found

`{}` does not exist or is not a directory.

## Fix

Point at the samples source tree with `--samples <DIR>` or in `.snipsync.toml`:

    samples = \"docs/samples\"
",
            path.display()
        ),

        Error::TomlDe(e) => format!(
            "\
# Error: Invalid TOML

{e}

## Fix

Correct `.snipsync.toml`; it is never silently ignored.
"
        ),

        Error::WatchSetup { reason } => format!(
            "\
# Error: Watcher Setup Failed

{reason}
"
        ),
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn every_diagnostic_opens_with_a_heading() {
        let errors = [
            Error::DocsRootNotFound { path: "docs".into() },
            Error::RegionPattern {
                pattern: "(".to_string(),
                reason: "unclosed group".to_string(),
            },
            Error::SamplesRootNotFound { path: "samples".into() },
            Error::WatchSetup { reason: "no inotify".to_string() },
        ];
        for e in &errors {
            assert!(render_error(e).starts_with("# Error:"), "bad rendering for {e}");
        }
    }
}
