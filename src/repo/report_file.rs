use crate::models::course_file::{CourseFile, ReportEntry};
use crate::models::error::{Result, ScanError};
use log::info;
use std::fs;
use std::path::Path;

/// Writes the reported files as a pretty JSON array with Hebrew keys.
pub fn write_report(path: &Path, files: &[CourseFile]) -> Result<()> {
    let entries: Vec<ReportEntry> = files.iter().map(CourseFile::to_report_entry).collect();
    let json = serde_json::to_string_pretty(&entries)?;

    fs::write(path, json.as_bytes()).map_err(|cause| ScanError::ReportWrite {
        path: path.to_path_buf(),
        cause,
    })?;

    info!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use tempfile::TempDir;

    #[test]
    fn test_report_contains_literal_hebrew() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let files = vec![CourseFile {
            course_name_raw: "05092843 - אנליזה הרמונית".to_string(),
            course_name_display: "אנליזה הרמונית".to_string(),
            file_name: "הרצאה.pdf".to_string(),
            last_modified: DateTime::parse_from_rfc3339("2025-03-04T14:20:00+02:00").unwrap(),
            link: "https://moodle.tau.ac.il/mod/resource/view.php?id=1".to_string(),
        }];

        write_report(&path, &files).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""שם הקובץ": "הרצאה.pdf""#));
        assert!(!raw.contains("\\u05"));
        let parsed: Vec<ReportEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec![files[0].to_report_entry()]);
        assert_eq!(parsed[0].last_modified, "04.03.2025 14:20");
    }

    #[test]
    fn test_empty_report_is_an_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_unwritable_path_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("report.json");
        match write_report(&path, &[]) {
            Err(ScanError::ReportWrite { .. }) => {}
            other => panic!("Expected ReportWrite, got {:?}", other),
        }
    }
}
