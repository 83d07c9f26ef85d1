//! File watcher: runs a check on startup, then re-checks on changes.
//!
//! Watch mode always runs read-only checks, so a resolution rewrite
//! can never feed back into the watcher.

use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};

use crate::config::Config;
use crate::error::Error;

/// Debounce delay between filesystem events and re-check.
const DEBOUNCE_MS: u64 = 100;

/// Create a filesystem watcher that sends events on the given channel.
///
/// # Errors
///
/// Returns `Error::WatchSetup` if the watcher cannot be created.
fn create_watcher(
    tx: crossbeam_channel::Sender<()>,
) -> Result<notify::RecommendedWatcher, Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_)
                    | notify::EventKind::Modify(_)
                    | notify::EventKind::Remove(_)
            )
        {
            let _ = tx.send(());
        }
    })
    .map_err(|e| {
        return Error::WatchSetup { reason: e.to_string() };
    });
}

/// Entry point for watch mode.
///
/// Runs an initial check, then watches the docs and samples roots and
/// re-checks on changes.
///
/// # Errors
///
/// Returns errors from watcher setup; check failures become exit codes.
pub fn run(config: &Config, format: &str) -> Result<ExitCode, Error> {
    eprintln!("watch: initial check");
    let mut last_code = run_check(config, format);

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;

    for root in [&config.docs_root, &config.samples_root] {
        if root.exists() {
            let _ = watcher.watch(root, RecursiveMode::Recursive);
        }
    }

    eprintln!(
        "watch: monitoring {} and {}, press Ctrl+C to stop",
        config.docs_root.display(),
        config.samples_root.display()
    );

    while rx.recv().is_ok() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while rx.recv_timeout(debounce).is_ok() {}
        eprintln!("watch: change detected, re-checking...");
        last_code = run_check(config, format);
    }

    return Ok(last_code);
}

/// Run one read-only check. Returns the exit code from the check.
fn run_check(config: &Config, format: &str) -> ExitCode {
    return match crate::run_once(config, true, format) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(3_u8)
        },
    };
}
