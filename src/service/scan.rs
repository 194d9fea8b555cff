use crate::models::course::Course;
use crate::models::course_file::CourseFile;
use crate::service::portal::CoursePortal;
use crate::utils::html::{classify_course_links, file_name_from_url, pluginfile_links};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use reqwest::Url;
use std::collections::{BTreeMap, HashSet};

const PLUGINFILE: &str = "pluginfile.php";
const RESOURCE_VIEW: &str = "mod/resource/view.php";

/// A file found on a course page, not yet probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub course_name_raw: String,
    pub course_name_display: String,
    pub file_url: String,
    pub file_name: String,
    /// What the alert links to: the activity page when there is one.
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedFile {
    pub candidate: Candidate,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Sorted for the report
    pub updates: Vec<CourseFile>,
    /// The previous snapshot updated with this run's probes; becomes the next snapshot
    pub observed: BTreeMap<String, DateTime<FixedOffset>>,
}

/// Collects candidate files from every course page. Courses whose page cannot be
/// fetched are skipped.
pub fn discover_candidates(
    portal: &dyn CoursePortal,
    courses: &[Course],
    progress: Option<&ProgressBar>,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for course in courses {
        let display = course.display_name();
        if let Some(pb) = progress {
            pb.set_message(display.clone());
        }

        let Some(html) = portal.page_html(&course.url) else {
            warn!("Could not load course page for {}, skipping", display);
            if let Some(pb) = progress {
                pb.inc(1);
            }
            continue;
        };

        let base = Url::parse(&course.url).ok();
        let (pluginfiles, activity_pages) =
            classify_course_links(&html, base.as_ref(), portal.host());
        let before = candidates.len();

        let mut push = |file_url: String, file_name: String, link: String| {
            if seen.insert((course.url.clone(), file_url.clone())) {
                candidates.push(Candidate {
                    course_name_raw: course.name_raw.clone(),
                    course_name_display: display.clone(),
                    file_name,
                    link,
                    file_url,
                });
            }
        };

        for file_url in pluginfiles {
            let name = file_name_from_url(&file_url);
            push(file_url.clone(), name, file_url);
        }

        for activity in activity_pages {
            if activity.contains(RESOURCE_VIEW) {
                for file_url in resolve_resource(portal, &activity) {
                    let name = file_name_from_url(&file_url);
                    push(file_url, name, activity.clone());
                }
            } else {
                let Some(activity_html) = portal.page_html(&activity) else {
                    continue;
                };
                let activity_base = Url::parse(&activity).ok();
                for (file_url, text) in pluginfile_links(&activity_html, activity_base.as_ref()) {
                    let name = if text.trim().is_empty() {
                        file_name_from_url(&file_url)
                    } else {
                        text.trim().to_string()
                    };
                    push(file_url, name, activity.clone());
                }
            }
        }

        debug!("{}: {} candidate files", display, candidates.len() - before);
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    info!(
        "Discovered {} candidate files across {} courses",
        candidates.len(),
        courses.len()
    );
    candidates
}

/// Resolves a resource view page to its file(s): first by following the view's
/// redirect, then by reading pluginfile links off the page.
pub fn resolve_resource(portal: &dyn CoursePortal, view_url: &str) -> Vec<String> {
    let redirect_url = with_redirect_param(view_url);
    if let Some(probe) = portal.probe(&redirect_url) {
        if probe.final_url.contains(PLUGINFILE) {
            return vec![probe.final_url];
        }
    }

    let Some(html) = portal.page_html(view_url) else {
        return Vec::new();
    };
    let base = Url::parse(view_url).ok();
    let mut seen = HashSet::new();
    pluginfile_links(&html, base.as_ref())
        .into_iter()
        .map(|(href, _)| href)
        .filter(|href| seen.insert(href.clone()))
        .collect()
}

fn with_redirect_param(view_url: &str) -> String {
    if view_url.contains("redirect=") {
        view_url.to_string()
    } else if view_url.contains('?') {
        format!("{}&redirect=1", view_url)
    } else {
        format!("{}?redirect=1", view_url)
    }
}

/// Fetches Last-Modified for every candidate on the current rayon pool. Candidates
/// without a usable header are dropped. Input order is preserved.
pub fn probe_candidates(
    portal: &dyn CoursePortal,
    candidates: Vec<Candidate>,
    progress: Option<&ProgressBar>,
) -> Vec<ProbedFile> {
    let total = candidates.len();
    let probed: Vec<ProbedFile> = candidates
        .into_par_iter()
        .filter_map(|candidate| {
            let last_modified = portal
                .probe(&candidate.file_url)
                .and_then(|p| p.last_modified);
            if let Some(pb) = progress {
                pb.inc(1);
            }
            match last_modified {
                Some(last_modified) => Some(ProbedFile {
                    candidate,
                    last_modified,
                }),
                None => {
                    debug!("No Last-Modified for {}", candidate.file_url);
                    None
                }
            }
        })
        .collect();

    info!(
        "{} of {} files reported a Last-Modified time",
        probed.len(),
        total
    );
    probed
}

/// Decides which probed files are new or changed.
///
/// A file already in `previous` is reported when it is newer than the recorded time;
/// an unknown file is reported when it is newer than `cutoff`. Files not probed this
/// run keep their recorded time, so a skipped page or probe does not lose history.
pub fn select_updates(
    probed: Vec<ProbedFile>,
    previous: &BTreeMap<String, DateTime<FixedOffset>>,
    cutoff: DateTime<FixedOffset>,
    tz: &Tz,
) -> ScanOutcome {
    let mut outcome = ScanOutcome {
        updates: Vec::new(),
        observed: previous.clone(),
    };

    for ProbedFile {
        candidate,
        last_modified,
    } in probed
    {
        let local = last_modified.with_timezone(tz).fixed_offset();
        let changed = match previous.get(&candidate.file_url) {
            Some(recorded) => local > *recorded,
            None => local > cutoff,
        };
        outcome.observed.insert(candidate.file_url.clone(), local);

        if changed {
            let file = CourseFile {
                course_name_raw: candidate.course_name_raw,
                course_name_display: candidate.course_name_display,
                file_name: candidate.file_name,
                last_modified: local,
                link: candidate.link,
            };
            if file.is_valid() {
                outcome.updates.push(file);
            } else {
                warn!("Ignoring file without name or link: {:?}", file);
            }
        }
    }

    outcome.updates.sort_by(CourseFile::report_order);
    outcome
}
