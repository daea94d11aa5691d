//! Regex-based field extraction used when the LLM is unavailable or returns
//! something unusable. Deliberately conservative: only fields with a
//! recognisable shape are filled.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cv::fields::{clean_email, clean_phone, clean_text_field, clean_url, ParsedCv};
use crate::validation::normalize_tags;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| compile(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| compile(r"\+?\d[\d\s().\-]{5,}\d"));
static DIGIT_GROUP_RE: Lazy<Regex> = Lazy::new(|| compile(r"\d+"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| compile(r"^(?:19|20)\d{2}$"));
static LINKEDIN_RE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)(?:https?://)?(?:[a-z]{2,3}\.)?linkedin\.com/[^\s,;)]+"));
static URL_RE: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(?:https?://|www\.)[^\s,;)]+"));
static SKILLS_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)^\s*(?:technical\s+)?(?:skills|competences|compétences)\s*:?\s*(.*)$"));

const MAX_NAME_WORDS: usize = 5;

pub fn extract(text: &str) -> ParsedCv {
    let linkedin_url = LINKEDIN_RE
        .find(text)
        .and_then(|m| clean_url(m.as_str()));
    let portfolio_url = URL_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|u| !u.to_ascii_lowercase().contains("linkedin.com"))
        .find_map(clean_url);

    ParsedCv {
        full_name: guess_name(text),
        email: EMAIL_RE.find(text).and_then(|m| clean_email(m.as_str())),
        phone: PHONE_RE
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|candidate| !looks_like_dates(candidate))
            .find_map(clean_phone),
        linkedin_url,
        portfolio_url,
        skills: skills_section(text),
        ..ParsedCv::default()
    }
}

/// `2015 - 2020`, `03.2015 - 06.2020` and the like: every digit group is a
/// year or a one- or two-digit day/month, with at least one year.
fn looks_like_dates(candidate: &str) -> bool {
    if candidate.starts_with('+') {
        return false;
    }
    let mut years = 0;
    for group in DIGIT_GROUP_RE.find_iter(candidate).map(|m| m.as_str()) {
        if YEAR_RE.is_match(group) {
            years += 1;
        } else if group.len() > 2 {
            return false;
        }
    }
    years > 0
}

/// First short line made of capitalised words, within the first few lines.
fn guess_name(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(5)
        .find(|line| looks_like_name(line))
        .and_then(|line| clean_text_field(line, 100))
}

fn looks_like_name(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < 2 || words.len() > MAX_NAME_WORDS {
        return false;
    }
    if EMAIL_RE.is_match(line) || URL_RE.is_match(line) || line.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    words.iter().all(|w| {
        w.chars().next().is_some_and(char::is_uppercase)
            && w.chars().all(|c| c.is_alphabetic() || matches!(c, '-' | '\'' | '.'))
    })
}

/// Items of a `Skills:` line, or of the lines that follow a bare `Skills` header
/// up to the next blank line.
fn skills_section(text: &str) -> Vec<String> {
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(caps) = SKILLS_HEADER_RE.captures(line) else {
            continue;
        };
        let inline = caps.get(1).map_or("", |m| m.as_str()).trim();
        let body: Vec<&str> = if inline.is_empty() {
            lines.by_ref().take_while(|l| !l.trim().is_empty()).collect()
        } else {
            vec![inline]
        };
        let items: Vec<String> = body
            .iter()
            .flat_map(|l| l.split([',', ';', '|', '•', '·']))
            .map(|s| s.trim().trim_start_matches(['-', '*']).trim())
            .filter(|s| !s.is_empty() && s.chars().count() <= 60)
            .map(String::from)
            .collect();
        return normalize_tags(&items, 60, 50);
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Jane Marie Doe\nSenior Backend Engineer\n\
        jane.doe@example.com | +44 20 7946 0958\n\
        https://www.linkedin.com/in/jane-doe, github.com/janedoe https://janedoe.dev\n\n\
        Skills: Rust, PostgreSQL; Kubernetes | rust\n\n\
        Experience\nAcme Corp 2019 - 2024";

    #[test]
    fn test_extracts_contact_fields() {
        let cv = extract(SAMPLE);
        assert_eq!(cv.full_name.as_deref(), Some("Jane Marie Doe"));
        assert_eq!(cv.email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(cv.phone.as_deref(), Some("+442079460958"));
        assert_eq!(
            cv.linkedin_url.as_deref(),
            Some("https://www.linkedin.com/in/jane-doe")
        );
        assert_eq!(cv.portfolio_url.as_deref(), Some("https://janedoe.dev"));
        assert_eq!(cv.skills, vec!["Rust", "PostgreSQL", "Kubernetes"]);
    }

    #[test]
    fn test_skills_block_under_header() {
        let text = "Someone\n\nSKILLS\n- Go\n- Docker, Terraform\n\nEducation";
        assert_eq!(skills_section(text), vec!["Go", "Docker", "Terraform"]);
    }

    #[test]
    fn test_date_ranges_are_not_phones() {
        let p = extract(
            "Jane Doe\njane@example.com\nSoftware Engineer, Acme 2015 - 2020\n\
             Consultant, Initech 03.2012 - 12.2014\nSkills: Rust",
        );
        assert_eq!(p.phone, None);
        assert_eq!(p.full_name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_phone_found_after_date_range() {
        let p = extract("Jane Doe\nAcme 2015 - 2020\nPhone: +44 20 7946 0958");
        assert_eq!(p.phone.as_deref(), Some("+442079460958"));
    }

    #[test]
    fn test_looks_like_dates() {
        assert!(looks_like_dates("2015 - 2020"));
        assert!(looks_like_dates("03.2015 - 06.2020"));
        assert!(!looks_like_dates("+1 2015 2020"));
        assert!(!looks_like_dates("(415) 555-0100"));
        assert!(!looks_like_dates("06 12 34 56 78"));
    }

    #[test]
    fn test_name_guess_rejects_contact_lines() {
        assert!(!looks_like_name("jane@example.com"));
        assert!(!looks_like_name("Curriculum"));
        assert!(!looks_like_name("Call 555 0100 Now"));
        assert!(looks_like_name("Jean-Luc O'Neil"));
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert_eq!(extract(""), ParsedCv::default());
    }
}
