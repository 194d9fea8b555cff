use crate::models::dry_run_mode::DryRunMode;
use crate::models::error::Result;
use crate::models::scan_state::ScanState;
use crate::repo::state_file::{load_state, save_state};
use crate::service::notify::{chunk_messages, format_header, format_line, send_chunks, Notifier};
use crate::service::scan::ScanOutcome;
use crate::utils::time::format_stamp;
use chrono::{DateTime, FixedOffset, TimeDelta};
use chrono_tz::Tz;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// What a run compares its probes against.
#[derive(Debug)]
pub struct Baseline {
    pub cutoff: DateTime<Tz>,
    pub seen_files: BTreeMap<String, DateTime<FixedOffset>>,
}

/// Reads the previous snapshot. Without a usable `last_run_iso` the cutoff falls back to
/// `run_start - lookback_hours`; a corrupt file also loses its seen files.
pub fn load_baseline(
    state_path: &Path,
    tz: &Tz,
    run_start: DateTime<Tz>,
    lookback_hours: u64,
) -> Baseline {
    let previous = match load_state(state_path) {
        Ok(state) => state,
        Err(e) => {
            warn!("Ignoring unusable state file: {}", e);
            None
        }
    };

    let cutoff = match previous.as_ref().and_then(|state| state.last_run(tz)) {
        Some(last_run) => last_run,
        None => {
            let fallback = run_start - TimeDelta::hours(lookback_hours as i64);
            info!(
                "No previous run recorded, reporting changes since {}",
                format_stamp(&fallback)
            );
            fallback
        }
    };

    Baseline {
        cutoff,
        seen_files: previous.map(|state| state.seen_files).unwrap_or_default(),
    }
}

/// Identity and limits of the run being finished.
pub struct RunContext<'a> {
    pub state_path: &'a Path,
    pub run_start: DateTime<Tz>,
    pub run_id: Uuid,
    pub mode: DryRunMode,
    pub max_message_chars: usize,
}

/// Sends the alert for `outcome`, then writes the next snapshot.
///
/// The snapshot is written only when the mode allows it and every chunk went out (or
/// there was nothing to send); a failed send returns before it. Without a notifier the
/// alert is skipped with a warning. Returns the number of messages sent.
pub fn publish(
    run: &RunContext,
    cutoff: &DateTime<Tz>,
    outcome: ScanOutcome,
    notifier: Option<&dyn Notifier>,
) -> Result<usize> {
    let ScanOutcome { updates, observed } = outcome;
    let mut sent = 0;

    if updates.is_empty() {
        info!("No updates since last run. (No Telegram message will be sent.)");
    } else {
        info!("{} new or changed files", updates.len());
        let lines: Vec<String> = updates.iter().map(format_line).collect();
        let chunks = chunk_messages(
            &format_header(cutoff, lines.len()),
            &lines,
            run.max_message_chars,
        );
        match notifier {
            Some(notifier) => {
                send_chunks(notifier, &chunks)?;
                sent = chunks.len();
            }
            None => warn!(
                "Telegram secrets missing; skipping send of {} message(s)",
                chunks.len()
            ),
        }
    }

    if run.mode.should_save_state() {
        save_state(
            run.state_path,
            &ScanState::new(run.run_start, run.run_id, observed),
        )?;
    } else {
        info!("DRY RUN completed - state file left untouched");
    }

    Ok(sent)
}
