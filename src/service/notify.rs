use crate::models::course_file::CourseFile;
use crate::models::error::Result;
use crate::utils::time::format_stamp;
use chrono::{DateTime, TimeZone};
use log::info;
use std::fmt::Display;

const CLIP_SUFFIX: &str = "\n...\n(Error details clipped)";

/// Something that can deliver a finished message.
pub trait Notifier {
    fn send(&self, text: &str) -> Result<()>;
}

/// Prints messages instead of sending them; used by the full dry run.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }
}

pub fn format_line(file: &CourseFile) -> String {
    format!(
        "{}\t | שם הקובץ: {}\t | שינוי אחרון: {}\t | קישור: {}",
        file.course_name_display,
        file.file_name,
        format_stamp(&file.last_modified),
        file.link
    )
}

pub fn format_header<T: TimeZone>(since: &DateTime<T>, count: usize) -> String
where
    T::Offset: Display,
{
    format!("📌 עדכונים במודל מאז {} ({}):", format_stamp(since), count)
}

/// Length as Telegram counts it: UTF-16 code units, so emoji such as `📌` count twice.
pub fn message_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Packs lines into messages of at most `max_chars` (see [`message_len`]), each starting
/// with the header. A line that is too long on its own still gets a message of its own.
pub fn chunk_messages(header: &str, lines: &[String], max_chars: usize) -> Vec<String> {
    let header_len = message_len(header) + 1;
    let mut chunks = Vec::new();
    let mut chunk = format!("{}\n", header);
    let mut chunk_len = header_len;
    let mut has_lines = false;

    for line in lines {
        let line_len = message_len(line);
        if has_lines && chunk_len + line_len + 1 > max_chars {
            chunks.push(std::mem::replace(&mut chunk, format!("{}\n", header)));
            chunk_len = header_len;
        }
        chunk.push_str(line);
        chunk.push('\n');
        chunk_len += line_len + 1;
        has_lines = true;
    }

    if has_lines {
        chunks.push(chunk);
    }
    chunks
}

/// Sends every chunk in order, stopping at the first failure.
pub fn send_chunks(notifier: &dyn Notifier, chunks: &[String]) -> Result<()> {
    for (idx, chunk) in chunks.iter().enumerate() {
        notifier.send(chunk)?;
        info!("Sent message {}/{}", idx + 1, chunks.len());
    }
    Ok(())
}

/// Builds the alert sent when a run fails. Longer texts are cut so that, with the
/// clip notice appended, the whole alert stays within `max_chars`.
pub fn failure_message(details: &str, run_link: Option<&str>, max_chars: usize) -> String {
    let mut message = String::from("❌ Moodle scan failed\n");
    if let Some(link) = run_link {
        message.push_str(&format!("🔗 Logs: {}\n\n", link));
    }
    message.push_str(details);

    if message_len(&message) <= max_chars {
        return message;
    }
    let budget = max_chars.saturating_sub(message_len(CLIP_SUFFIX));
    let mut clipped = String::new();
    let mut used = 0;
    for c in message.chars() {
        used += c.len_utf16();
        if used > budget {
            break;
        }
        clipped.push(c);
    }
    clipped.push_str(CLIP_SUFFIX);
    clipped
}

/// Link to the GitHub Actions run, when running inside one.
pub fn ci_run_url() -> Option<String> {
    ci_run_url_from(
        std::env::var("GITHUB_REPOSITORY").ok(),
        std::env::var("GITHUB_RUN_ID").ok(),
    )
}

fn ci_run_url_from(repository: Option<String>, run_id: Option<String>) -> Option<String> {
    match (repository, run_id) {
        (Some(repo), Some(id)) if !repo.is_empty() && !id.is_empty() => {
            Some(format!("https://github.com/{}/actions/runs/{}", repo, id))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::ScanError;
    use chrono_tz::Asia::Jerusalem;
    use serial_test::serial;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<String>>,
        fail_after: Option<usize>,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, text: &str) -> Result<()> {
            if self.fail_after == Some(self.sent.borrow().len()) {
                return Err(ScanError::Telegram("Too Many Requests".to_string()));
            }
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn sample_file() -> CourseFile {
        CourseFile {
            course_name_raw: "05092843 - אנליזה הרמונית".to_string(),
            course_name_display: "אנליזה הרמונית".to_string(),
            file_name: "הרצאה 5.pdf".to_string(),
            last_modified: DateTime::parse_from_rfc3339("2025-03-04T14:20:00+02:00").unwrap(),
            link: "https://moodle.tau.ac.il/mod/resource/view.php?id=42".to_string(),
        }
    }

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line(&sample_file()),
            "אנליזה הרמונית\t | שם הקובץ: הרצאה 5.pdf\t | שינוי אחרון: 04.03.2025 14:20\t | קישור: https://moodle.tau.ac.il/mod/resource/view.php?id=42"
        );
    }

    #[test]
    fn test_format_header() {
        let since = Jerusalem.with_ymd_and_hms(2025, 3, 4, 9, 5, 0).unwrap();
        assert_eq!(format_header(&since, 3), "📌 עדכונים במודל מאז 04.03.2025 09:05 (3):");
    }

    #[test]
    fn test_everything_fits_in_one_chunk() {
        let lines = vec!["a".to_string(), "b".to_string()];
        assert_eq!(chunk_messages("H", &lines, 100), vec!["H\na\nb\n".to_string()]);
    }

    #[test]
    fn test_chunks_repeat_header_and_respect_limit() {
        let header = "📌 header";
        let lines: Vec<String> = (0..10).map(|i| format!("שורה מספר {:02}", i)).collect();
        let max = 40;

        let chunks = chunk_messages(header, &lines, max);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.starts_with("📌 header\n"));
            assert!(message_len(chunk) <= max, "chunk too long: {:?}", chunk);
        }
        let rejoined: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.lines().skip(1))
            .collect();
        let expected: Vec<&str> = lines.iter().map(String::as_str).collect();
        assert_eq!(rejoined, expected);
    }

    #[test]
    fn test_emoji_count_as_two_units() {
        assert_eq!(message_len("📌"), 2);
        assert_eq!(message_len("שלום"), 4);

        // 10 units of header plus 9 per line: two lines fit in 28, three do not
        let lines = vec!["😀😀😀😀".to_string(); 3];
        let chunks = chunk_messages("📌 header", &lines, 28);
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert!(message_len(chunk) <= 28);
        }
    }

    #[test]
    fn test_oversized_line_gets_its_own_chunk() {
        let lines = vec!["short".to_string(), "x".repeat(50), "tail".to_string()];
        let chunks = chunk_messages("H", &lines, 20);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], format!("H\n{}\n", "x".repeat(50)));
    }

    #[test]
    fn test_no_lines_no_chunks() {
        assert!(chunk_messages("H", &[], 100).is_empty());
    }

    #[test]
    fn test_send_chunks_stops_on_first_error() {
        let notifier = RecordingNotifier {
            fail_after: Some(1),
            ..RecordingNotifier::default()
        };
        let chunks = vec!["one".to_string(), "two".to_string(), "three".to_string()];

        assert!(send_chunks(&notifier, &chunks).is_err());
        assert_eq!(*notifier.sent.borrow(), vec!["one".to_string()]);
    }

    #[test]
    fn test_failure_message_with_link() {
        let message = failure_message(
            "Moodle login failed: bad password",
            Some("https://github.com/o/r/actions/runs/1"),
            3800,
        );
        assert_eq!(
            message,
            "❌ Moodle scan failed\n🔗 Logs: https://github.com/o/r/actions/runs/1\n\nMoodle login failed: bad password"
        );
    }

    #[test]
    fn test_failure_message_is_clipped() {
        let message = failure_message(&"ש".repeat(5000), None, 3800);
        assert_eq!(message.chars().count(), 3800);
        assert!(message.ends_with("(Error details clipped)"));
    }

    #[test]
    fn test_failure_message_clipping_counts_utf16() {
        let message = failure_message(&"🔥".repeat(3000), None, 3800);
        assert!(message_len(&message) <= 3800);
        assert!(message_len(&message) >= 3799);
        assert!(message.ends_with(CLIP_SUFFIX));
    }

    #[test]
    fn test_ci_run_url_from_parts() {
        assert_eq!(
            ci_run_url_from(Some("owner/repo".to_string()), Some("99".to_string())),
            Some("https://github.com/owner/repo/actions/runs/99".to_string())
        );
        assert_eq!(ci_run_url_from(Some("owner/repo".to_string()), None), None);
        assert_eq!(ci_run_url_from(Some(String::new()), Some("1".to_string())), None);
    }

    #[test]
    #[serial]
    fn test_ci_run_url_reads_environment() {
        std::env::set_var("GITHUB_REPOSITORY", "tau/moodle-alerts");
        std::env::set_var("GITHUB_RUN_ID", "12345");
        let url = ci_run_url();
        std::env::remove_var("GITHUB_REPOSITORY");
        std::env::remove_var("GITHUB_RUN_ID");

        assert_eq!(
            url.as_deref(),
            Some("https://github.com/tau/moodle-alerts/actions/runs/12345")
        );
    }
}
