use crate::models::config::{Config, LoginFields};
use crate::models::course::Course;
use crate::models::error::{Result, ScanError};
use crate::models::secrets::{MoodleCredentials, Secrets};
use crate::service::portal::{CoursePortal, Probe};
use crate::service::sso::{Page, PageSource, SsoLogin};
use crate::utils::html::HtmlForm;
use crate::utils::time::parse_http_date;
use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use reqwest::cookie::Jar;
use reqwest::header::LAST_MODIFIED;
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

const MAX_REDIRECTS: usize = 20;

/// Blocking HTTP session against a Moodle site and its SSO provider.
pub struct MoodleClient {
    client: Client,
    base_url: Url,
    host: String,
    my_courses_url: String,
    login_url: String,
    login_fields: LoginFields,
    credentials: MoodleCredentials,
    has_credentials: bool,
    page_timeout: Duration,
    request_timeout: Duration,
    max_login_hops: usize,
}

impl MoodleClient {
    pub fn new(config: &Config, secrets: &Secrets) -> Result<Self> {
        let base_url = Url::parse(&config.moodle_base_url)
            .map_err(|e| ScanError::ConfigInvalid(format!("moodle_base_url: {}", e)))?;
        let host = base_url
            .host_str()
            .ok_or_else(|| ScanError::ConfigInvalid("moodle_base_url has no host".to_string()))?
            .to_string();

        let jar = Arc::new(Jar::default());
        if let Some(session) = &secrets.session_cookie {
            debug!("Seeding MoodleSession cookie for {}", host);
            jar.add_cookie_str(&format!("MoodleSession={}; Path=/", session), &base_url);
        }

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .cookie_provider(jar)
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(request_timeout)
            .build()
            .map_err(ScanError::HttpClient)?;

        Ok(MoodleClient {
            client,
            my_courses_url: config.my_courses_url(),
            login_url: config.login_url.clone(),
            login_fields: config.login_fields.clone(),
            credentials: secrets.credentials.clone(),
            has_credentials: secrets.has_login(),
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            request_timeout,
            max_login_hops: config.max_login_hops,
            base_url,
            host,
        })
    }

    /// Lists the user's courses, logging in first when the session is not authenticated.
    pub fn courses(&self) -> Result<Vec<Course>> {
        let moodle_login_url = self
            .base_url
            .join("/login/index.php")
            .map_err(|e| ScanError::LoginFailed(e.to_string()))?;
        let login = SsoLogin {
            my_courses_url: &self.my_courses_url,
            login_url: &self.login_url,
            moodle_login_url: moodle_login_url.to_string(),
            login_fields: &self.login_fields,
            credentials: self.has_credentials.then_some(&self.credentials),
            max_login_hops: self.max_login_hops,
        };
        login.courses(self)
    }

    fn send_probe(&self, url: &str, head: bool) -> Option<Response> {
        let request = if head {
            self.client.head(url)
        } else {
            self.client.get(url)
        };
        match request.timeout(self.request_timeout).send() {
            Ok(response) => Some(response),
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                None
            }
        }
    }
}

impl PageSource for MoodleClient {
    fn fetch(&self, url: &str) -> Result<Page> {
        let response = self
            .client
            .get(url)
            .timeout(self.page_timeout)
            .send()
            .map_err(|cause| ScanError::Request {
                url: url.to_string(),
                cause,
            })?;
        read_page(response, url)
    }

    fn submit(&self, form: &HtmlForm, fields: &[(String, String)]) -> Result<Page> {
        let request = if form.method == "POST" {
            self.client.post(&form.action).form(fields)
        } else {
            self.client.get(&form.action).query(fields)
        };
        let response = request
            .timeout(self.page_timeout)
            .send()
            .map_err(|cause| ScanError::Request {
                url: form.action.clone(),
                cause,
            })?;
        read_page(response, &form.action)
    }
}

impl CoursePortal for MoodleClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn page_html(&self, url: &str) -> Option<String> {
        match self.fetch(url) {
            Ok(page) => Some(page.html),
            Err(e) => {
                warn!("Skipping page: {}", e);
                None
            }
        }
    }

    /// HEAD first; some servers refuse HEAD or drop headers on errors, so fall back to a
    /// GET whose body is never read.
    fn probe(&self, url: &str) -> Option<Probe> {
        let mut response = self.send_probe(url, true)?;
        if needs_get_fallback(response.status(), response.headers().contains_key(LAST_MODIFIED)) {
            debug!("HEAD {} returned {}, retrying with GET", url, response.status());
            response = self.send_probe(url, false)?;
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date);
        Some(Probe {
            final_url: response.url().to_string(),
            last_modified,
        })
    }
}

fn needs_get_fallback(status: StatusCode, has_last_modified: bool) -> bool {
    status == StatusCode::FORBIDDEN
        || status == StatusCode::METHOD_NOT_ALLOWED
        || (status.as_u16() >= 400 && !has_last_modified)
}

fn read_page(response: Response, requested: &str) -> Result<Page> {
    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(ScanError::HttpStatus {
            url: requested.to_string(),
            status: status.as_u16(),
        });
    }
    let url = response.url().to_string();
    let html = response.text().map_err(|cause| ScanError::Request {
        url: requested.to_string(),
        cause,
    })?;
    Ok(Page { url, html })
}
