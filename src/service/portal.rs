use chrono::{DateTime, Utc};

/// Outcome of checking a single URL without downloading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// URL after redirects
    pub final_url: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Read access to an authenticated Moodle site, as used by the scanner.
///
/// Failures are swallowed (and logged) by implementations: a missing page or
/// probe only means that item is skipped for this run.
pub trait CoursePortal: Sync {
    /// Host the site serves courses and files from, e.g. `moodle.tau.ac.il`.
    fn host(&self) -> &str;

    fn page_html(&self, url: &str) -> Option<String>;

    fn probe(&self, url: &str) -> Option<Probe>;
}
