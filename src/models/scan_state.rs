use crate::utils::time::parse_iso_in_zone;
use chrono::{DateTime, FixedOffset, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Snapshot persisted between runs.
///
/// Older state files hold only `last_run_iso`; the other fields default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanState {
    #[serde(default)]
    pub last_run_iso: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// pluginfile URL -> Last-Modified observed by the latest full run
    #[serde(default)]
    pub seen_files: BTreeMap<String, DateTime<FixedOffset>>,
}

impl ScanState {
    pub fn new(
        run_start: DateTime<Tz>,
        run_id: Uuid,
        seen_files: BTreeMap<String, DateTime<FixedOffset>>,
    ) -> Self {
        ScanState {
            last_run_iso: Some(run_start.fixed_offset().to_rfc3339()),
            run_id: Some(run_id),
            seen_files,
        }
    }

    /// Start of the previous run in `tz`. Naive timestamps are read as local to `tz`.
    pub fn last_run(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        let iso = self.last_run_iso.as_deref()?;
        parse_iso_in_zone(iso, tz).map(|dt| tz.from_utc_datetime(&dt.naive_utc()))
    }
}
