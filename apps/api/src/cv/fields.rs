//! Structured candidate fields extracted from a CV, and the sanitization
//! that turns loosely-typed LLM output into them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::{is_email, is_http_url, normalize_tags};

const MAX_SHORT_TEXT: usize = 200;
const MAX_SUMMARY: usize = 2000;
const MAX_DESCRIPTION: usize = 1000;
const MAX_TAG_LEN: usize = 60;
const MAX_TAGS: usize = 50;
const MAX_HISTORY_ENTRIES: usize = 30;
const MAX_YEARS_EXPERIENCE: i32 = 60;

const PLACEHOLDERS: &[&str] = &[
    "", "-", "--", "n/a", "na", "none", "null", "nil", "unknown", "not provided",
    "not specified", "not available", "undefined",
];

static LEADING_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:[.,]\d+)?)").expect("valid regex")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub company: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedCv {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub years_experience: Option<i32>,
    pub skills: Vec<String>,
    pub languages: Vec<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
}

impl ParsedCv {
    /// Fills absent fields of `self` from `other`; list fields are merged.
    pub fn fill_gaps_from(&mut self, other: ParsedCv) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.full_name, other.full_name);
        fill(&mut self.email, other.email);
        fill(&mut self.phone, other.phone);
        fill(&mut self.location, other.location);
        fill(&mut self.headline, other.headline);
        fill(&mut self.summary, other.summary);
        fill(&mut self.years_experience, other.years_experience);
        fill(&mut self.linkedin_url, other.linkedin_url);
        fill(&mut self.portfolio_url, other.portfolio_url);

        let mut skills = std::mem::take(&mut self.skills);
        skills.extend(other.skills);
        self.skills = normalize_tags(&skills, MAX_TAG_LEN, MAX_TAGS);

        let mut languages = std::mem::take(&mut self.languages);
        languages.extend(other.languages);
        self.languages = normalize_tags(&languages, MAX_TAG_LEN, MAX_TAGS);

        if self.experience.is_empty() {
            self.experience = other.experience;
        }
        if self.education.is_empty() {
            self.education = other.education;
        }
    }

    /// Builds sanitized fields from a JSON object, tolerating aliases,
    /// stringly-typed numbers and placeholder values.
    pub fn from_value(value: &Value) -> ParsedCv {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);

        ParsedCv {
            full_name: text(obj, &["full_name", "name"], MAX_SHORT_TEXT),
            email: text(obj, &["email", "email_address"], MAX_SHORT_TEXT).and_then(|e| clean_email(&e)),
            phone: text(obj, &["phone", "phone_number", "mobile"], MAX_SHORT_TEXT)
                .and_then(|p| clean_phone(&p)),
            location: text(obj, &["location", "address", "city"], MAX_SHORT_TEXT),
            headline: text(obj, &["headline", "title", "current_title"], MAX_SHORT_TEXT),
            summary: text(obj, &["summary", "profile", "objective"], MAX_SUMMARY),
            years_experience: first(obj, &["years_experience", "years_of_experience", "experience_years"])
                .and_then(parse_years),
            skills: tags(obj, &["skills", "technical_skills"]),
            languages: tags(obj, &["languages", "spoken_languages"]),
            linkedin_url: text(obj, &["linkedin_url", "linkedin"], MAX_SHORT_TEXT)
                .and_then(|u| clean_url(&u)),
            portfolio_url: text(obj, &["portfolio_url", "website", "github"], MAX_SHORT_TEXT)
                .and_then(|u| clean_url(&u)),
            experience: entries(obj, &["experience", "work_experience"], experience_entry),
            education: entries(obj, &["education"], education_entry),
        }
    }
}

fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Trimmed text with placeholders removed, truncated to `max` chars.
pub fn clean_text_field(raw: &str, max: usize) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    Some(crate::cv::text::truncate_chars(trimmed, max).trim_end().to_string())
}

fn text(obj: &Map<String, Value>, keys: &[&str], max: usize) -> Option<String> {
    first(obj, keys)
        .and_then(scalar_to_string)
        .and_then(|s| clean_text_field(&s, max))
}

pub fn clean_email(raw: &str) -> Option<String> {
    let email = raw
        .trim()
        .trim_start_matches("mailto:")
        .trim_matches(|c: char| matches!(c, '<' | '>' | '.' | ',' | ';'))
        .to_lowercase();
    is_email(&email).then_some(email)
}

/// Keeps a leading `+` and digits; valid when 7..=15 digits remain.
pub fn clean_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if !(7..=15).contains(&digits.len()) {
        return None;
    }
    if trimmed.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

/// http(s) URLs pass; bare `www.`/`linkedin.com`/`github.com` hosts get `https://`.
pub fn clean_url(raw: &str) -> Option<String> {
    let url = raw.trim().trim_end_matches(['.', ',', ';']);
    if is_http_url(url) {
        return Some(url.to_string());
    }
    let lower = url.to_ascii_lowercase();
    let bare_host = ["www.", "linkedin.com/", "github.com/", "gitlab.com/"]
        .iter()
        .any(|p| lower.starts_with(p));
    let prefixed = format!("https://{url}");
    (bare_host && is_http_url(&prefixed)).then_some(prefixed)
}

/// Accepts 5, 5.5, "5", "5+", "5 years", "7,5 ans"; clamps to 0..=60.
fn parse_years(value: &Value) -> Option<i32> {
    let years = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let caps = LEADING_NUMBER_RE.captures(s)?;
            caps[1].replace(',', ".").parse::<f64>().ok()?
        }
        _ => return None,
    };
    if !years.is_finite() || years < 0.0 {
        return None;
    }
    Some((years.round() as i32).clamp(0, MAX_YEARS_EXPERIENCE))
}

/// Arrays of strings, or a single comma/semicolon/pipe/bullet separated string.
fn tags(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let raw: Vec<String> = match first(obj, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(o) => o.get("name").and_then(scalar_to_string),
                other => scalar_to_string(other),
            })
            .collect(),
        Some(Value::String(s)) => s
            .split([',', ';', '|', '•', '\n'])
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };
    let cleaned: Vec<String> = raw
        .iter()
        .filter_map(|s| clean_text_field(s, MAX_TAG_LEN + 1))
        .collect();
    normalize_tags(&cleaned, MAX_TAG_LEN, MAX_TAGS)
}

fn entries<T>(
    obj: &Map<String, Value>,
    keys: &[&str],
    build: fn(&Map<String, Value>) -> Option<T>,
) -> Vec<T> {
    match first(obj, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(build)
            .take(MAX_HISTORY_ENTRIES)
            .collect(),
        _ => Vec::new(),
    }
}

fn experience_entry(obj: &Map<String, Value>) -> Option<ExperienceEntry> {
    let entry = ExperienceEntry {
        company: text(obj, &["company", "employer", "organization"], MAX_SHORT_TEXT),
        title: text(obj, &["title", "position", "role"], MAX_SHORT_TEXT),
        location: text(obj, &["location"], MAX_SHORT_TEXT),
        start_date: text(obj, &["start_date", "from"], 40),
        end_date: text(obj, &["end_date", "to"], 40),
        description: text(obj, &["description", "summary"], MAX_DESCRIPTION),
    };
    (entry.company.is_some() || entry.title.is_some()).then_some(entry)
}

fn education_entry(obj: &Map<String, Value>) -> Option<EducationEntry> {
    let entry = EducationEntry {
        institution: text(obj, &["institution", "school", "university"], MAX_SHORT_TEXT),
        degree: text(obj, &["degree", "diploma"], MAX_SHORT_TEXT),
        field_of_study: text(obj, &["field_of_study", "field", "major"], MAX_SHORT_TEXT),
        start_date: text(obj, &["start_date", "from"], 40),
        end_date: text(obj, &["end_date", "to"], 40),
    };
    (entry.institution.is_some() || entry.degree.is_some()).then_some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_sanitization() {
        let raw = json!({
            "name": "  Jane Doe ",
            "email": "mailto:Jane.Doe@Example.com",
            "phone": "+33 (0)6 12-34-56-78",
            "location": "N/A",
            "headline": "Senior Rust Engineer",
            "years_of_experience": "7+ years",
            "skills": "Rust, rust, Go; PostgreSQL | ",
            "languages": [{"name": "English"}, "French", null],
            "linkedin": "linkedin.com/in/janedoe",
            "website": "not a url",
            "experience": [
                {"company": "Acme", "position": "Engineer", "from": "2019", "to": "present"},
                {"description": "orphan entry"}
            ],
            "education": [{"school": "MIT", "degree": "BSc", "major": "CS"}]
        });
        let cv = ParsedCv::from_value(&raw);
        assert_eq!(cv.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(cv.email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(cv.phone.as_deref(), Some("+330612345678"));
        assert_eq!(cv.location, None);
        assert_eq!(cv.years_experience, Some(7));
        assert_eq!(cv.skills, vec!["Rust", "Go", "PostgreSQL"]);
        assert_eq!(cv.languages, vec!["English", "French"]);
        assert_eq!(cv.linkedin_url.as_deref(), Some("https://linkedin.com/in/janedoe"));
        assert_eq!(cv.portfolio_url, None);
        assert_eq!(cv.experience.len(), 1);
        assert_eq!(cv.experience[0].title.as_deref(), Some("Engineer"));
        assert_eq!(cv.education[0].field_of_study.as_deref(), Some("CS"));
    }

    #[test]
    fn test_years_parsing_and_clamping() {
        assert_eq!(parse_years(&json!(5)), Some(5));
        assert_eq!(parse_years(&json!(4.6)), Some(5));
        assert_eq!(parse_years(&json!("7,5 ans")), Some(8));
        assert_eq!(parse_years(&json!("99")), Some(60));
        assert_eq!(parse_years(&json!(-2)), None);
        assert_eq!(parse_years(&json!("several")), None);
    }

    #[test]
    fn test_phone_rules() {
        assert_eq!(clean_phone("06 12 34 56 78").as_deref(), Some("0612345678"));
        assert_eq!(clean_phone("123"), None);
        assert_eq!(clean_phone("1234567890123456"), None);
    }

    #[test]
    fn test_placeholders_and_non_objects() {
        assert_eq!(clean_text_field("  Unknown ", 10), None);
        assert_eq!(clean_text_field("\"Paris\"", 10).as_deref(), Some("Paris"));
        assert_eq!(ParsedCv::from_value(&json!([1, 2])), ParsedCv::default());
    }

    #[test]
    fn test_fill_gaps_prefers_existing_values() {
        let mut primary = ParsedCv {
            full_name: Some("Jane".into()),
            skills: vec!["Rust".into()],
            ..ParsedCv::default()
        };
        primary.fill_gaps_from(ParsedCv {
            full_name: Some("Other".into()),
            email: Some("jane@example.com".into()),
            skills: vec!["rust".into(), "Go".into()],
            ..ParsedCv::default()
        });
        assert_eq!(primary.full_name.as_deref(), Some("Jane"));
        assert_eq!(primary.email.as_deref(), Some("jane@example.com"));
        assert_eq!(primary.skills, vec!["Rust", "Go"]);
    }
}
