/// A course as listed on the My Courses page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub name_raw: String,
    pub url: String,
}

impl Course {
    pub fn new(name_raw: impl Into<String>, url: impl Into<String>) -> Self {
        Course {
            name_raw: name_raw.into(),
            url: url.into(),
        }
    }

    pub fn display_name(&self) -> String {
        course_display_name(&self.name_raw)
    }
}

/// Drops a leading course number: `05092843 - אנליזה הרמונית` -> `אנליזה הרמונית`.
/// Titles without a number of at least six digits before ` - ` are only trimmed.
pub fn course_display_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((left, right)) = trimmed.split_once(" - ") {
        let left = left.trim();
        if left.chars().count() >= 6 && left.chars().all(|c| c.is_ascii_digit()) {
            return right.trim().to_string();
        }
    }
    trimmed.to_string()
}
