use crate::models::config::LoginFields;
use crate::models::course::Course;
use crate::models::error::{Result, ScanError};
use crate::models::secrets::MoodleCredentials;
use crate::utils::html::{course_links, forms, is_guest_page, HtmlForm};
use log::{debug, info, warn};
use reqwest::Url;

/// A fetched page: URL after redirects plus body.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
}

impl Page {
    pub fn base(&self) -> Option<Url> {
        Url::parse(&self.url).ok()
    }
}

/// Page loads used while logging in. Unlike [`CoursePortal`](crate::service::portal::CoursePortal)
/// failures here are errors: a login cannot skip a page.
pub trait PageSource {
    fn fetch(&self, url: &str) -> Result<Page>;

    fn submit(&self, form: &HtmlForm, fields: &[(String, String)]) -> Result<Page>;
}

/// The login walk from My Courses through the identity provider and back.
pub struct SsoLogin<'a> {
    pub my_courses_url: &'a str,
    pub login_url: &'a str,
    /// Moodle's own login page, used when the provider hands back a guest session
    pub moodle_login_url: String,
    pub login_fields: &'a LoginFields,
    /// `None` when only a session cookie was configured
    pub credentials: Option<&'a MoodleCredentials>,
    pub max_login_hops: usize,
}

impl SsoLogin<'_> {
    /// Lists the user's courses, logging in first when the session is not authenticated.
    pub fn courses(&self, source: &dyn PageSource) -> Result<Vec<Course>> {
        let page = source.fetch(self.my_courses_url)?;
        if !is_guest_page(&page.html) {
            let courses = course_links(&page.html, page.base().as_ref());
            if !courses.is_empty() {
                info!("Session already authenticated");
                return Ok(courses);
            }
        }

        self.follow(source, self.login_url)?;
        let mut page = source.fetch(self.my_courses_url)?;

        if is_guest_page(&page.html) {
            info!(
                "Guest access on My Courses, retrying through {}",
                self.moodle_login_url
            );
            self.follow(source, &self.moodle_login_url)?;
            page = source.fetch(self.my_courses_url)?;
        }

        if is_guest_page(&page.html) {
            return Err(ScanError::LoginFailed(
                "still guest access on My Courses; SSO did not complete".to_string(),
            ));
        }
        let courses = course_links(&page.html, page.base().as_ref());
        if courses.is_empty() {
            return Err(ScanError::LoginFailed(format!(
                "no courses listed at {} after login",
                self.my_courses_url
            )));
        }
        Ok(courses)
    }

    /// Walks the SSO pages from `start_url`: fills the login form once and submits up to
    /// `max_login_hops` hidden-only hand-off forms, until a page has neither.
    pub fn follow(&self, source: &dyn PageSource, start_url: &str) -> Result<()> {
        info!("Following SSO from {}", start_url);
        let mut page = source.fetch(start_url)?;
        let mut credentials_sent = false;
        let mut hops = 0;

        loop {
            let page_forms = forms(&page.html, page.base().as_ref());

            if let Some(form) = page_forms
                .iter()
                .find(|f| f.find_input(&self.login_fields.password).is_some())
            {
                if credentials_sent {
                    return Err(ScanError::LoginFailed(
                        "the identity provider showed the login form again; check the credentials"
                            .to_string(),
                    ));
                }
                let Some(credentials) = self.credentials else {
                    return Err(ScanError::LoginFailed(
                        "a login form was shown but no credentials were configured".to_string(),
                    ));
                };
                debug!("Submitting login form to {}", form.action);
                page = source.submit(form, &fill_login_form(form, self.login_fields, credentials))?;
                credentials_sent = true;
            } else if let Some(form) = page_forms.iter().find(|f| f.is_auto_post()) {
                if hops == self.max_login_hops {
                    warn!(
                        "Stopped following SSO hand-off forms after {} hops at {}",
                        hops, page.url
                    );
                    return Ok(());
                }
                hops += 1;
                debug!("Hop {}: submitting hand-off form to {}", hops, form.action);
                page = source.submit(form, &form.default_fields())?;
            } else {
                debug!("SSO ended at {}", page.url);
                return Ok(());
            }
        }
    }
}

/// The form's own fields with the user, pid and password inputs filled in.
pub fn fill_login_form(
    form: &HtmlForm,
    login_fields: &LoginFields,
    credentials: &MoodleCredentials,
) -> Vec<(String, String)> {
    let mut fields = form.default_fields();
    let values = [
        (&login_fields.user, &credentials.username),
        (&login_fields.pid, &credentials.user_id),
        (&login_fields.password, &credentials.password),
    ];
    for (candidates, value) in values {
        let Some(name) = form.find_input(candidates).and_then(|i| i.name.clone()) else {
            continue;
        };
        match fields.iter_mut().find(|(field, _)| *field == name) {
            Some(existing) => existing.1 = value.clone(),
            None => fields.push((name, value.clone())),
        }
    }
    fields
}
