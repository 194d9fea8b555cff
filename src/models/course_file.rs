use crate::utils::time::format_stamp;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A course file that is new or changed since the previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFile {
    pub course_name_raw: String,
    pub course_name_display: String,
    pub file_name: String,
    /// Already shifted into the configured time zone.
    pub last_modified: DateTime<FixedOffset>,
    pub link: String,
}

/// One row of the JSON report, keyed by the Hebrew labels used in the alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(rename = "קורס")]
    pub course: String,
    #[serde(rename = "שם הקובץ")]
    pub file_name: String,
    #[serde(rename = "שינוי אחרון")]
    pub last_modified: String,
    #[serde(rename = "קישור")]
    pub link: String,
}

impl CourseFile {
    pub fn is_valid(&self) -> bool {
        !self.file_name.trim().is_empty() && !self.link.trim().is_empty()
    }

    pub fn to_report_entry(&self) -> ReportEntry {
        ReportEntry {
            course: self.course_name_display.clone(),
            file_name: self.file_name.clone(),
            last_modified: format_stamp(&self.last_modified),
            link: self.link.clone(),
        }
    }

    /// Course, then modification time, then case-insensitive file name.
    pub fn report_order(&self, other: &Self) -> Ordering {
        self.course_name_display
            .cmp(&other.course_name_display)
            .then(self.last_modified.cmp(&other.last_modified))
            .then_with(|| {
                self.file_name
                    .to_lowercase()
                    .cmp(&other.file_name.to_lowercase())
            })
    }
}
