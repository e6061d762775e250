//! Console renderer for the countdown

use std::io::Write;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::services::{DisplayUpdate, FailureFlash};

/// Render one update as a single console line
pub fn render_line(update: &DisplayUpdate) -> String {
    let mut line = format!(
        "T-: {} | Backup Timer: {} | {:?}",
        update.remaining_text, update.backup_text, update.zone
    );
    if update.poll_failing {
        line.push_str(" | API FAILING");
    }
    line
}

fn print_line(line: &str) {
    let mut out = std::io::stdout().lock();
    if let Err(e) = writeln!(out, "{}", line) {
        debug!("Failed to write console line: {}", e);
    }
}

/// Print every display update and failure flash to stdout until the
/// status board goes away
pub async fn console_display_task(
    mut updates: watch::Receiver<DisplayUpdate>,
    mut flashes: broadcast::Receiver<FailureFlash>,
) {
    debug!("Starting console display task");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = render_line(&updates.borrow_and_update());
                print_line(&line);
            }
            flash = flashes.recv() => match flash {
                Ok(flash) => print_line(&format!("!! poll failed: {}", flash.reason)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Console missed {} failure flashes", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
