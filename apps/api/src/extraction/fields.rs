//! Field extraction: regex rules over line-structured text, with the semantic
//! profile as a fallback for the name and skills.
//!
//! Rule order is part of the contract: Email, Phone, FullName, Skills,
//! Education, Experience. Within a rule the first match by position wins.
//! Rules are independent; a rule that finds nothing leaves its field absent.
//! Extraction never fails, whatever the input.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::models::{ExtractedFields, FieldName, SemanticProfile};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

/// `+<country code>` or a leading `0`, then 9–10 digits.
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+\d{1,3}|0)\d{9,10}").expect("valid regex"));

/// A label at the start of a line (after optional bullets), a colon, and the rest.
fn label_regex(labels: &str) -> Regex {
    Regex::new(&format!(r"(?i)^[\s\-–•*·]*(?:{labels})\s*:\s*(.*)$")).expect("valid regex")
}

static NAME_LABEL: Lazy<Regex> =
    Lazy::new(|| label_regex(r"full\s*name|name|họ\s+và\s+tên|họ\s+tên|tên"));
static SKILLS_LABEL: Lazy<Regex> = Lazy::new(|| label_regex(r"skills?|kỹ\s+năng"));
static EDUCATION_LABEL: Lazy<Regex> = Lazy::new(|| label_regex(r"education|học\s+vấn"));
static EXPERIENCE_LABEL: Lazy<Regex> =
    Lazy::new(|| label_regex(r"(?:work\s+)?experience|kinh\s+nghiệm"));

/// Any field label; a line matching this is never taken as another label's value.
static ANY_LABEL: Lazy<Regex> = Lazy::new(|| {
    label_regex(
        r"full\s*name|name|họ\s+và\s+tên|họ\s+tên|tên|skills?|kỹ\s+năng|education|học\s+vấn|(?:work\s+)?experience|kinh\s+nghiệm|e-?mail|phone|điện\s+thoại",
    )
});

/// Key-phrase terms that mark a phrase as a skill.
const SKILL_TERMS: &[&str] = &[
    "programming",
    "framework",
    "database",
    "tool",
    "design",
    "development",
    "management",
    "analysis",
    "lập trình",
    "cơ sở dữ liệu",
    "công cụ",
    "thiết kế",
    "phát triển",
    "quản lý",
    "phân tích",
];

/// Extracts structured fields from `text` (lines separated by `\n`), consulting
/// `profile` where the label rules for FullName and Skills find nothing.
pub fn extract_fields(text: &str, profile: Option<&SemanticProfile>) -> ExtractedFields {
    let mut fields = ExtractedFields::new();
    let lines: Vec<&str> = text.lines().collect();

    if let Some(m) = EMAIL.find(text) {
        fields.insert(FieldName::Email, m.as_str().to_string());
    }

    if let Some(m) = PHONE.find(text) {
        fields.insert(FieldName::Phone, m.as_str().to_string());
    }

    let full_name = label_value(&lines, &NAME_LABEL)
        .or_else(|| profile.and_then(|p| p.first_person()).map(str::to_string));
    if let Some(name) = full_name {
        fields.insert(FieldName::FullName, name);
    }

    let skills = label_value(&lines, &SKILLS_LABEL)
        .or_else(|| profile.and_then(skills_from_key_phrases));
    if let Some(skills) = skills {
        fields.insert(FieldName::Skills, skills);
    }

    if let Some(education) = label_value(&lines, &EDUCATION_LABEL) {
        fields.insert(FieldName::Education, education);
    }

    if let Some(experience) = label_value(&lines, &EXPERIENCE_LABEL) {
        fields.insert(FieldName::Experience, experience);
    }

    let missing: Vec<&str> = FieldName::ALL
        .iter()
        .filter(|name| !fields.contains_key(name))
        .map(FieldName::as_str)
        .collect();
    debug!("Extracted {} fields; missing: {:?}", fields.len(), missing);
    fields
}

/// Value of the first label line that has one. A bare label (`Skills:`) takes
/// the next non-empty line, unless that line is itself a label.
fn label_value(lines: &[&str], label: &Regex) -> Option<String> {
    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = label.captures(line) else {
            continue;
        };
        let rest = caps.get(1).map_or("", |m| m.as_str()).trim();
        if !rest.is_empty() {
            return Some(rest.to_string());
        }
        let next = lines[i + 1..]
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty());
        if let Some(next) = next {
            if !ANY_LABEL.is_match(next) {
                return Some(next.to_string());
            }
        }
    }
    None
}

fn skills_from_key_phrases(profile: &SemanticProfile) -> Option<String> {
    let matches: Vec<&str> = profile
        .key_phrases()
        .iter()
        .filter(|phrase| {
            let lower = phrase.to_lowercase();
            SKILL_TERMS.iter().any(|term| lower.contains(term))
        })
        .map(String::as_str)
        .collect();

    if matches.is_empty() {
        None
    } else {
        Some(matches.join(", "))
    }
}
