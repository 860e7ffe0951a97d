use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone, Utc};

use crate::{Education, EducationId, Error, Experience, ExperienceId, Time};

pub const TEXT_MIN_LEN: usize = 10;
pub const TEXT_MAX_LEN: usize = 300;
pub const HANDLE_MIN_LEN: usize = 2;
pub const HANDLE_MAX_LEN: usize = 40;

/// Body of post and comment creation requests
///
/// Every field is lenient: a value of the wrong JSON type is treated as absent,
/// so that validation can report it instead of the request being rejected as
/// malformed.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostInput {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<String>,
}

impl PostInput {
    pub fn new(text: impl Into<String>) -> PostInput {
        PostInput {
            text: Some(text.into()),
            name: None,
            avatar: None,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        match validate_post_input(self) {
            (_, true) => Ok(()),
            (errors, false) => Err(Error::Validation(errors)),
        }
    }
}

fn lenient_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: serde_json::Value = serde::Deserialize::deserialize(de)?;
    Ok(match v {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// Field name to human-readable message
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(|m| m as &str)
    }

    pub(crate) fn insert(&mut self, field: &str, msg: &str) {
        self.0.insert(String::from(field), String::from(msg));
    }
}

pub fn validate_post_input(input: &PostInput) -> (ValidationErrors, bool) {
    let mut errors = ValidationErrors::default();
    let text = input.text.as_deref().unwrap_or("");
    let len = text.chars().count();
    if text.trim().is_empty() {
        errors.insert("text", "Text field is required");
    } else if !(TEXT_MIN_LEN..=TEXT_MAX_LEN).contains(&len) {
        errors.insert("text", "Post must be between 10 and 300 characters");
    }
    let is_valid = errors.is_empty();
    (errors, is_valid)
}

fn lenient_skills<'de, D>(de: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: serde_json::Value = serde::Deserialize::deserialize(de)?;
    let skills: Vec<String> = match v {
        serde_json::Value::String(s) => s.split(',').map(String::from).collect(),
        serde_json::Value::Array(a) => a
            .into_iter()
            .filter_map(|s| s.as_str().map(String::from))
            .collect(),
        _ => return Ok(None),
    };
    Ok(Some(
        skills
            .into_iter()
            .map(|s| String::from(s.trim()))
            .filter(|s| !s.is_empty())
            .collect(),
    ))
}

fn lenient_bool<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: serde_json::Value = serde::Deserialize::deserialize(de)?;
    Ok(match v {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => s == "true" || s == "on",
        _ => false,
    })
}

/// Body of the profile creation and edition request
///
/// `skills` is accepted either as a comma-separated string or as an array.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ProfileInput {
    #[serde(default, deserialize_with = "lenient_string")]
    pub handle: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_skills")]
    pub skills: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bio: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub githubusername: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub youtube: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub twitter: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub facebook: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub linkedin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub instagram: Option<String>,
}

impl ProfileInput {
    pub fn validate(&self) -> Result<(), Error> {
        match validate_profile_input(self) {
            (_, true) => Ok(()),
            (errors, false) => Err(Error::Validation(errors)),
        }
    }
}

fn is_blank(s: &Option<String>) -> bool {
    s.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Absolute http(s) or ftp URL with a dotted host; a bare domain counts as http
pub fn is_url(s: &str) -> bool {
    let s = s.trim();
    let parsed = match url::Url::parse(s) {
        Ok(u) => Some(u),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            url::Url::parse(&format!("http://{s}")).ok()
        }
        Err(_) => None,
    };
    parsed.map_or(false, |u| {
        matches!(u.scheme(), "http" | "https" | "ftp")
            && u.host_str().map_or(false, |h| h.contains('.'))
    })
}

pub fn validate_profile_input(input: &ProfileInput) -> (ValidationErrors, bool) {
    let mut errors = ValidationErrors::default();
    let handle_len = input.handle.as_deref().map_or(0, |h| h.chars().count());
    if is_blank(&input.handle) {
        errors.insert("handle", "Profile handle is required");
    } else if !(HANDLE_MIN_LEN..=HANDLE_MAX_LEN).contains(&handle_len) {
        errors.insert("handle", "Handle needs to between 2 and 40 characters");
    }
    if is_blank(&input.status) {
        errors.insert("status", "Status field is required");
    }
    if input.skills.as_ref().map_or(true, |s| s.is_empty()) {
        errors.insert("skills", "Skills field is required");
    }
    for (field, value) in [
        ("website", &input.website),
        ("youtube", &input.youtube),
        ("twitter", &input.twitter),
        ("facebook", &input.facebook),
        ("linkedin", &input.linkedin),
        ("instagram", &input.instagram),
    ] {
        if let Some(v) = value {
            if !v.trim().is_empty() && !is_url(v) {
                errors.insert(field, "Not a valid URL");
            }
        }
    }
    let is_valid = errors.is_empty();
    (errors, is_valid)
}

/// RFC 3339 timestamp, or a plain `YYYY-MM-DD` date at midnight UTC
pub fn parse_date(s: &str) -> Option<Time> {
    let s = s.trim();
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
}

/// Shared date checks of experience and education entries
fn check_dates(
    errors: &mut ValidationErrors,
    from: &Option<String>,
    to: &Option<String>,
) -> (Option<Time>, Option<Time>) {
    let from = match from.as_deref().map(str::trim) {
        None | Some("") => {
            errors.insert("from", "From date field is required");
            None
        }
        Some(s) => {
            let d = parse_date(s);
            if d.is_none() {
                errors.insert("from", "From date is invalid");
            }
            d
        }
    };
    let to = match to.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => {
            let d = parse_date(s);
            if d.is_none() {
                errors.insert("to", "To date is invalid");
            }
            d
        }
    };
    (from, to)
}

fn required(errors: &mut ValidationErrors, field: &str, value: &Option<String>, msg: &str) {
    if is_blank(value) {
        errors.insert(field, msg);
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ExperienceInput {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub current: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
}

impl ExperienceInput {
    /// Validates the input, and builds the entry it describes
    pub fn validate(self, id: ExperienceId) -> Result<Experience, Error> {
        let mut errors = ValidationErrors::default();
        required(&mut errors, "title", &self.title, "Job title field is required");
        required(&mut errors, "company", &self.company, "Company field is required");
        let (from, to) = check_dates(&mut errors, &self.from, &self.to);
        match from {
            Some(from) if errors.is_empty() => Ok(Experience {
                id,
                title: self.title.unwrap_or_default(),
                company: self.company.unwrap_or_default(),
                location: self.location,
                from,
                to,
                current: self.current,
                description: self.description,
            }),
            _ => Err(Error::Validation(errors)),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EducationInput {
    #[serde(default, deserialize_with = "lenient_string")]
    pub school: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub degree: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fieldofstudy: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub current: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
}

impl EducationInput {
    pub fn validate(self, id: EducationId) -> Result<Education, Error> {
        let mut errors = ValidationErrors::default();
        required(&mut errors, "school", &self.school, "School field is required");
        required(&mut errors, "degree", &self.degree, "Degree field is required");
        required(
            &mut errors,
            "fieldofstudy",
            &self.fieldofstudy,
            "Field of study field is required",
        );
        let (from, to) = check_dates(&mut errors, &self.from, &self.to);
        match from {
            Some(from) if errors.is_empty() => Ok(Education {
                id,
                school: self.school.unwrap_or_default(),
                degree: self.degree.unwrap_or_default(),
                fieldofstudy: self.fieldofstudy.unwrap_or_default(),
                from,
                to,
                current: self.current,
                description: self.description,
            }),
            _ => Err(Error::Validation(errors)),
        }
    }
}
