//! Regex-based extraction of the few Moodle page structures the scanner needs:
//! anchors, course links and forms. Tag and attribute names are matched
//! case-insensitively; anything more structural than that is out of reach.

use crate::models::course::Course;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use reqwest::Url;
use std::collections::{BTreeSet, HashSet};

/// Text Moodle shows on pages viewed without a login.
pub const GUEST_MARKER: &str = "גישת אורחים";

const COURSE_LINK_CLASS: &str = "mycourses_coursename";
const COURSE_VIEW_PATH: &str = "course/view.php?id=";
const PLUGINFILE: &str = "pluginfile.php";
const ACTIVITY_PATHS: [&str; 3] = [
    "/mod/resource/view.php",
    "/mod/folder/view.php",
    "/mod/assign/view.php",
];

static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("valid anchor regex"));
static FORM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form\s*>").expect("valid form regex"));
static INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("valid input regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid attribute regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z]+);").expect("valid entity regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub name: Option<String>,
    pub id: Option<String>,
    /// Lower-cased `type`, `text` when absent.
    pub kind: String,
    pub value: String,
    pub disabled: bool,
}

impl FormInput {
    fn is_fillable(&self) -> bool {
        self.name.is_some() && !self.disabled && !matches!(self.kind.as_str(), "hidden" | "submit" | "button" | "image")
    }

    fn matches(&self, candidate: &str) -> bool {
        self.id.as_deref() == Some(candidate) || self.name.as_deref() == Some(candidate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlForm {
    pub action: String,
    /// Upper-cased, `GET` when absent.
    pub method: String,
    pub inputs: Vec<FormInput>,
}

impl HtmlForm {
    /// First fillable input matching any candidate, in candidate order.
    pub fn find_input(&self, candidates: &[String]) -> Option<&FormInput> {
        candidates.iter().find_map(|candidate| {
            self.inputs
                .iter()
                .find(|input| input.is_fillable() && input.matches(candidate))
        })
    }

    /// A form that only carries hidden values, like a SAML hand-off page that
    /// a browser would submit on load.
    pub fn is_auto_post(&self) -> bool {
        let mut hidden = 0;
        for input in self.inputs.iter().filter(|i| i.name.is_some()) {
            match input.kind.as_str() {
                "hidden" => hidden += 1,
                "submit" | "button" | "image" => {}
                _ => return false,
            }
        }
        hidden > 0
    }

    /// Name/value pairs a browser would submit before any user input.
    pub fn default_fields(&self) -> Vec<(String, String)> {
        self.inputs
            .iter()
            .filter(|i| !i.disabled && !matches!(i.kind.as_str(), "submit" | "button" | "image"))
            .filter(|i| !matches!(i.kind.as_str(), "checkbox" | "radio"))
            .filter_map(|i| i.name.clone().map(|name| (name, i.value.clone())))
            .collect()
    }
}

/// All anchors with a non-empty `href`, resolved against `base` when given.
pub fn anchors(html: &str, base: Option<&Url>) -> Vec<Anchor> {
    ANCHOR_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = parse_attrs(caps.get(1).map_or("", |m| m.as_str()));
            let href = attr_value(&attrs, "href")?;
            let href = href.trim();
            if href.is_empty() {
                return None;
            }
            let classes = attr_value(&attrs, "class")
                .map(|c| c.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            Some(Anchor {
                href: resolve(base, href),
                text: text_content(caps.get(2).map_or("", |m| m.as_str())),
                classes,
            })
        })
        .collect()
}

/// `(href, text)` for every anchor pointing at a pluginfile.
pub fn pluginfile_links(html: &str, base: Option<&Url>) -> Vec<(String, String)> {
    anchors(html, base)
        .into_iter()
        .filter(|a| a.href.contains(PLUGINFILE))
        .map(|a| (a.href, a.text))
        .collect()
}

/// Splits a course page's links into direct pluginfiles and activity pages on `host`.
pub fn classify_course_links(
    html: &str,
    base: Option<&Url>,
    host: &str,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let pluginfile_marker = format!("{}/{}/", host, PLUGINFILE);
    let activity_markers: Vec<String> = ACTIVITY_PATHS
        .iter()
        .map(|path| format!("{}{}", host, path))
        .collect();

    let mut pluginfiles = BTreeSet::new();
    let mut activity_pages = BTreeSet::new();
    for anchor in anchors(html, base) {
        if anchor.href.contains(&pluginfile_marker) {
            pluginfiles.insert(anchor.href);
        } else if activity_markers.iter().any(|m| anchor.href.contains(m.as_str())) {
            activity_pages.insert(anchor.href);
        }
    }
    (pluginfiles, activity_pages)
}

/// Course links on the My Courses page, first occurrence of each URL kept.
pub fn course_links(html: &str, base: Option<&Url>) -> Vec<Course> {
    let mut seen = HashSet::new();
    anchors(html, base)
        .into_iter()
        .filter(|a| a.classes.iter().any(|c| c == COURSE_LINK_CLASS))
        .filter(|a| !a.text.is_empty() && a.href.contains(COURSE_VIEW_PATH))
        .filter(|a| seen.insert(a.href.clone()))
        .map(|a| Course::new(a.text, a.href))
        .collect()
}

pub fn is_guest_page(html: &str) -> bool {
    html.contains(GUEST_MARKER)
}

pub fn forms(html: &str, base: Option<&Url>) -> Vec<HtmlForm> {
    FORM_RE
        .captures_iter(html)
        .map(|caps| {
            let attrs = parse_attrs(caps.get(1).map_or("", |m| m.as_str()));
            let action = attr_value(&attrs, "action")
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .map(|a| resolve(base, &a))
                .or_else(|| base.map(|b| b.to_string()))
                .unwrap_or_default();
            let method = attr_value(&attrs, "method")
                .map(|m| m.trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "GET".to_string());
            let inputs = INPUT_RE
                .captures_iter(caps.get(2).map_or("", |m| m.as_str()))
                .map(|input| {
                    let attrs = parse_attrs(input.get(1).map_or("", |m| m.as_str()));
                    FormInput {
                        name: attr_value(&attrs, "name").filter(|n| !n.is_empty()),
                        id: attr_value(&attrs, "id").filter(|i| !i.is_empty()),
                        kind: attr_value(&attrs, "type")
                            .map(|t| t.trim().to_ascii_lowercase())
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| "text".to_string()),
                        value: attr_value(&attrs, "value").unwrap_or_default(),
                        disabled: attrs.iter().any(|(name, _)| name == "disabled"),
                    }
                })
                .collect();
            HtmlForm {
                action,
                method,
                inputs,
            }
        })
        .collect()
}

/// Last path segment, percent-decoded; the whole URL when there is none.
pub fn file_name_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let last = path.rsplit('/').next().unwrap_or("");
    let name = percent_decode_str(last).decode_utf8_lossy().trim().to_string();
    if name.is_empty() {
        url.to_string()
    } else {
        name
    }
}

/// Strips tags, decodes entities and collapses whitespace.
pub fn text_content(fragment: &str) -> String {
    let without_tags = TAG_RE.replace_all(fragment, " ");
    decode_entities(&without_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn attr_value(attrs: &[(String, String)], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(attr, _)| attr == name)
        .map(|(_, value)| value.clone())
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    match base.map(|b| b.join(href)) {
        Some(Ok(url)) => url.to_string(),
        _ => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSE_PAGE: &str = r#"
        <div class="activity">
          <a href="https://moodle.tau.ac.il/pluginfile.php/123/mod_label/intro/%D7%A1%D7%99%D7%9B%D7%95%D7%9D.pdf">סיכום</a>
          <a href="https://moodle.tau.ac.il/mod/resource/view.php?id=55"><span class="instancename">הרצאה 1</span></a>
          <a href="https://moodle.tau.ac.il/mod/folder/view.php?id=56">תיקייה</a>
          <a HREF='https://moodle.tau.ac.il/mod/assign/view.php?id=57'>מטלה</a>
          <a href="https://moodle.tau.ac.il/mod/forum/view.php?id=58">פורום</a>
          <a href="https://other.example.com/pluginfile.php/9/x.pdf">elsewhere</a>
          <a href="/mod/resource/view.php?id=59&amp;forceview=1">relative</a>
        </div>"#;

    #[test]
    fn test_classify_course_links() {
        let base = Url::parse("https://moodle.tau.ac.il/course/view.php?id=1").unwrap();
        let (files, activities) = classify_course_links(COURSE_PAGE, Some(&base), "moodle.tau.ac.il");

        assert_eq!(files.len(), 1);
        assert!(files.iter().next().unwrap().contains("/pluginfile.php/123/"));
        let activities: Vec<&str> = activities.iter().map(String::as_str).collect();
        assert_eq!(
            activities,
            vec![
                "https://moodle.tau.ac.il/mod/assign/view.php?id=57",
                "https://moodle.tau.ac.il/mod/folder/view.php?id=56",
                "https://moodle.tau.ac.il/mod/resource/view.php?id=55",
                "https://moodle.tau.ac.il/mod/resource/view.php?id=59&forceview=1",
            ]
        );
    }

    #[test]
    fn test_anchor_text_is_flattened() {
        let found = anchors(COURSE_PAGE, None);
        let lecture = found.iter().find(|a| a.href.ends_with("id=55")).unwrap();
        assert_eq!(lecture.text, "הרצאה 1");
    }

    #[test]
    fn test_pluginfile_links_keep_text() {
        let html = r#"<ul><li><a href="https://m/pluginfile.php/1/a.pdf"> <b>Slides</b>&nbsp;week 1 </a></li>
                      <li><a href="https://m/mod/page/view.php?id=2">page</a></li>
                      <li><a href="https://m/pluginfile.php/1/b.pdf"></a></li></ul>"#;
        let links = pluginfile_links(html, None);
        assert_eq!(
            links,
            vec![
                ("https://m/pluginfile.php/1/a.pdf".to_string(), "Slides week 1".to_string()),
                ("https://m/pluginfile.php/1/b.pdf".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_course_links_are_filtered_and_deduplicated() {
        let html = r#"
            <a class="mycourses_coursename" href="https://moodle.tau.ac.il/course/view.php?id=10">05092843 - אנליזה הרמונית</a>
            <a class="mycourses_coursename" href="https://moodle.tau.ac.il/course/view.php?id=10">duplicate</a>
            <a class="mycourses_coursename" href="https://moodle.tau.ac.il/course/view.php?id=11">  </a>
            <a class="other" href="https://moodle.tau.ac.il/course/view.php?id=12">not a course tile</a>
            <a class="mycourses_coursename extra" href="https://moodle.tau.ac.il/course/view.php?id=13">Logic</a>
            <a class="mycourses_coursename" href="https://moodle.tau.ac.il/user/profile.php">profile</a>"#;
        let courses = course_links(html, None);
        assert_eq!(
            courses,
            vec![
                Course::new("05092843 - אנליזה הרמונית", "https://moodle.tau.ac.il/course/view.php?id=10"),
                Course::new("Logic", "https://moodle.tau.ac.il/course/view.php?id=13"),
            ]
        );
    }

    #[test]
    fn test_guest_page() {
        assert!(is_guest_page("<div>אתם משתמשים בגישת אורחים</div>"));
        assert!(!is_guest_page("<div>My courses</div>"));
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://moodle.tau.ac.il/pluginfile.php/1/mod_resource/content/2/%D7%94%D7%A8%D7%A6%D7%90%D7%94.pdf?forcedownload=1"),
            "הרצאה.pdf"
        );
        assert_eq!(file_name_from_url("https://moodle.tau.ac.il/"), "https://moodle.tau.ac.il/");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &#1488; &#x5D1; &bogus;"), "a & b א ב &bogus;");
    }

    #[test]
    fn test_login_form_parsing() {
        let html = r#"
            <form name="IDPLogin" method="post" action="/nidp/saml2/sso?sid=0">
              <input type="hidden" name="option" value="credential">
              <input type="text" id="Ecom_User_ID" name="Ecom_User_ID" value="">
              <input type="hidden" id="Ecom_Password" name="Ecom_Password_hidden">
              <input type="password" id="Ecom_Password" name="Ecom_Password">
              <input type="text" name="pid" disabled>
              <input type="submit" name="go" value="Login">
            </form>"#;
        let base = Url::parse("https://nidp.tau.ac.il/nidp/saml2/sso?id=10").unwrap();
        let forms = forms(html, Some(&base));
        assert_eq!(forms.len(), 1);
        let form = &forms[0];
        assert_eq!(form.method, "POST");
        assert_eq!(form.action, "https://nidp.tau.ac.il/nidp/saml2/sso?sid=0");
        assert!(!form.is_auto_post());

        let password = form.find_input(&["Ecom_Password".to_string()]).unwrap();
        assert_eq!(password.kind, "password");
        assert!(form.find_input(&["pid".to_string()]).is_none());
        let user = form
            .find_input(&["missing".to_string(), "Ecom_User_ID".to_string()])
            .unwrap();
        assert_eq!(user.name.as_deref(), Some("Ecom_User_ID"));

        let defaults = form.default_fields();
        assert!(defaults.contains(&("option".to_string(), "credential".to_string())));
        assert!(!defaults.iter().any(|(name, _)| name == "go" || name == "pid"));
    }

    #[test]
    fn test_saml_hand_off_is_auto_post() {
        let html = r#"<body onload="document.forms[0].submit()">
            <form method="POST" action="https://moodle.tau.ac.il/auth/saml2/sp/saml2-acs.php/moodle.tau.ac.il">
              <input type="hidden" name="SAMLResponse" value="PHNhbWw+">
              <input type="hidden" name="RelayState" value="https://moodle.tau.ac.il/">
              <noscript><input type="submit" value="Continue"></noscript>
            </form></body>"#;
        let forms = forms(html, None);
        assert!(forms[0].is_auto_post());
        assert_eq!(forms[0].default_fields().len(), 2);
    }
}
