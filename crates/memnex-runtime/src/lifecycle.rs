//! Cooperative interrupt handling and cleanup.
//!
//! One controller per process. Long operations never get preempted; they
//! poll `should_abort()` between session files and between flush chunks.
//! Interrupt and terminate signals are handled identically. Only one
//! controller may be active; the statics below enforce that.

use crate::Result;
use chrono::Utc;
use is_terminal::IsTerminal;
use memnex_store::Store;
use once_cell::sync::Lazy;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Exit code for a cooperative interrupt.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

type CleanupFn = Box<dyn FnOnce() + Send>;

struct Controller {
    abort: AtomicBool,
    interrupts: AtomicUsize,
    next_handle: AtomicU64,
    cleanups: Mutex<Vec<(u64, CleanupFn)>>,
}

static CONTROLLER: Lazy<Controller> = Lazy::new(|| Controller {
    abort: AtomicBool::new(false),
    interrupts: AtomicUsize::new(0),
    next_handle: AtomicU64::new(1),
    cleanups: Mutex::new(Vec::new()),
});

/// Handle returned by `register_cleanup`; pass back to `deregister_cleanup`
/// once the caller finished cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupHandle(u64);

/// Process-wide abort latch.
pub fn should_abort() -> bool {
    CONTROLLER.abort.load(Ordering::SeqCst)
}

/// Set the latch; the pipeline notices at its next poll.
pub fn request_abort() {
    CONTROLLER.abort.store(true, Ordering::SeqCst);
}

/// Clear the latch (the "cancel, continue" choice).
pub fn clear_abort() {
    CONTROLLER.abort.store(false, Ordering::SeqCst);
    CONTROLLER.interrupts.store(0, Ordering::SeqCst);
}

/// Register a closure to run on immediate abort (close store, flush
/// checkpoint). Registration is explicit; deregister after a clean finish
/// so cleanup never runs twice.
pub fn register_cleanup(cleanup: impl FnOnce() + Send + 'static) -> CleanupHandle {
    let handle = CONTROLLER.next_handle.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut cleanups) = CONTROLLER.cleanups.lock() {
        cleanups.push((handle, Box::new(cleanup)));
    }
    CleanupHandle(handle)
}

pub fn deregister_cleanup(handle: CleanupHandle) {
    if let Ok(mut cleanups) = CONTROLLER.cleanups.lock() {
        cleanups.retain(|(id, _)| *id != handle.0);
    }
}

/// Run and drain every registered cleanup, newest first.
pub fn run_cleanups() {
    let drained: Vec<(u64, CleanupFn)> = match CONTROLLER.cleanups.lock() {
        Ok(mut cleanups) => cleanups.drain(..).collect(),
        Err(_) => return,
    };
    for (_, cleanup) in drained.into_iter().rev() {
        cleanup();
    }
}

/// Install the signal handler. Interrupt and terminate behave identically.
pub fn install_signal_handler() -> Result<()> {
    ctrlc::set_handler(on_interrupt)
        .map_err(|err| crate::Error::Config(format!("could not install signal handler: {}", err)))
}

fn on_interrupt() {
    let prior = CONTROLLER.interrupts.fetch_add(1, Ordering::SeqCst);
    if prior >= 1 {
        // Second interrupt while the first is being handled: force exit,
        // bypassing cleanup.
        std::process::exit(INTERRUPT_EXIT_CODE);
    }

    let interactive = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
    if !interactive {
        request_abort();
        return;
    }

    match prompt_interrupt_choice() {
        InterruptChoice::AbortNow => {
            run_cleanups();
            std::process::exit(INTERRUPT_EXIT_CODE);
        }
        InterruptChoice::AbortAfterCurrent => request_abort(),
        InterruptChoice::Continue => clear_abort(),
    }
}

enum InterruptChoice {
    AbortNow,
    AbortAfterCurrent,
    Continue,
}

fn prompt_interrupt_choice() -> InterruptChoice {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "Interrupted. What now?");
    let _ = writeln!(stderr, "  1) abort immediately");
    let _ = writeln!(stderr, "  2) abort after the current file");
    let _ = writeln!(stderr, "  3) cancel, keep going");
    let _ = write!(stderr, "> ");
    let _ = stderr.flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return InterruptChoice::AbortAfterCurrent;
    }
    match answer.trim() {
        "1" => InterruptChoice::AbortNow,
        "3" => InterruptChoice::Continue,
        _ => InterruptChoice::AbortAfterCurrent,
    }
}

/// Corruption recovery: offer to move the broken store aside and start
/// fresh. Non-interactive callers always get `None` (the corruption error
/// propagates).
pub fn recover_store(db_path: &Path) -> Result<Option<Store>> {
    let interactive = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
    if !interactive {
        return Ok(None);
    }

    let mut stderr = std::io::stderr();
    let _ = write!(
        stderr,
        "The memory database appears corrupted. Recreate and re-sync? [y/N] "
    );
    let _ = stderr.flush();

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
        return Ok(None);
    }

    let renamed = quarantine_path(db_path);
    std::fs::rename(db_path, &renamed)?;
    let store = Store::open(db_path)?;
    eprintln!(
        "Moved the corrupted file to {} and created a fresh store. Run 'memnex sync' to re-index.",
        renamed.display()
    );
    Ok(Some(store))
}

fn quarantine_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(format!(".corrupted.{}", Utc::now().format("%Y%m%d%H%M%S")));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The latch and registry are process-wide; tests share them, so each
    // test leaves the controller cleared.

    #[test]
    fn test_abort_latch_round_trip() {
        clear_abort();
        assert!(!should_abort());
        request_abort();
        assert!(should_abort());
        clear_abort();
        assert!(!should_abort());
    }

    #[test]
    fn test_cleanup_runs_once_and_deregisters() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicUsize;

        clear_abort();
        let counter = Arc::new(AtomicUsize::new(0));

        let ran = counter.clone();
        let _keep = register_cleanup(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        });

        let skipped = counter.clone();
        let handle = register_cleanup(move || {
            skipped.fetch_add(100, Ordering::SeqCst);
        });
        deregister_cleanup(handle);

        run_cleanups();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Registry drained; a second pass is a no-op.
        run_cleanups();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_quarantine_path_shape() {
        let path = quarantine_path(Path::new("/data/memory.db"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("memory.db.corrupted."));
    }
}
