/// Input validation at the HTTP boundary
///
/// Scoring treats every field as plain optional text, so anything malformed
/// has to be rejected or normalized here before it is stored:
/// - emails are lowercased and checked against a simplified RFC 5322 pattern
/// - phones are parsed with libphonenumber and stored as E.164
/// - the professional profile link must be an http(s) URL
/// - free text is trimmed and length-limited
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

use crate::errors::AppError;
use crate::models::{ContactFields, TagInput};

/// Longest accepted free-text value (notes, narratives).
pub const MAX_TEXT_LEN: usize = 10_000;

/// Longest accepted tag value.
pub const MAX_TAG_LEN: usize = 64;

/// Region assumed for phone numbers written without a country code.
const DEFAULT_PHONE_REGION: CountryId = CountryId::US;

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    })
}

fn source_regex() -> &'static Regex {
    static SOURCE_REGEX: OnceLock<Regex> = OnceLock::new();
    SOURCE_REGEX.get_or_init(|| Regex::new(r"^[a-z0-9_-]{1,32}$").expect("source regex is valid"))
}

/// Validate email address
///
/// Requires a local part, an `@` and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || email.len() > 254 {
        return false;
    }

    if !email_regex().is_match(email) {
        tracing::debug!("Invalid email format: {}", email);
        return false;
    }

    true
}

/// Parse and normalize a phone number to E.164 (+16502530000).
pub fn normalize_phone(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.len() < 7 {
        return Err("Phone too short".to_string());
    }

    match phonenumber::parse(Some(DEFAULT_PHONE_REGION), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            let formatted = number.format().mode(Mode::E164).to_string();
            tracing::debug!("Valid phone: {} → {}", raw, formatted);
            Ok(formatted)
        }
        Ok(_) => Err(format!("Invalid phone number: {}", raw)),
        Err(e) => Err(format!("Could not parse phone '{}': {:?}", raw, e)),
    }
}

/// Normalize a profile link. A missing scheme defaults to https.
pub fn normalize_profile_url(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let parsed = Url::parse(&candidate).map_err(|e| format!("Invalid URL '{}': {}", raw, e))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed.to_string()),
        _ => Err(format!("URL must be http(s) with a host: {}", raw)),
    }
}

fn normalize_text(name: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::BadRequest(format!(
            "{} exceeds {} characters",
            name, MAX_TEXT_LEN
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Apply `check` to a non-blank value; blank values pass through as "".
fn normalize_with(
    name: &str,
    value: Option<String>,
    check: impl Fn(&str) -> Result<String, String>,
) -> Result<Option<String>, AppError> {
    match normalize_text(name, value)? {
        Some(v) if !v.is_empty() => check(&v)
            .map(Some)
            .map_err(|e| AppError::BadRequest(format!("{}: {}", name, e))),
        other => Ok(other),
    }
}

fn check_email(value: &str) -> Result<String, String> {
    let lowered = value.to_lowercase();
    if is_valid_email(&lowered) {
        Ok(lowered)
    } else {
        Err(format!("Invalid email address: {}", value))
    }
}

/// Trim and validate every supplied field.
///
/// `None` stays `None` and a blank string stays blank, so partial updates
/// can still tell "leave alone" from "clear".
pub fn normalize_fields(fields: ContactFields) -> Result<ContactFields, AppError> {
    Ok(ContactFields {
        first_name: normalize_text("first_name", fields.first_name)?,
        last_name: normalize_text("last_name", fields.last_name)?,
        primary_email: normalize_with("primary_email", fields.primary_email, check_email)?,
        secondary_email: normalize_with("secondary_email", fields.secondary_email, check_email)?,
        primary_phone: normalize_with("primary_phone", fields.primary_phone, normalize_phone)?,
        secondary_phone: normalize_with(
            "secondary_phone",
            fields.secondary_phone,
            normalize_phone,
        )?,
        title: normalize_text("title", fields.title)?,
        company: normalize_text("company", fields.company)?,
        location: normalize_text("location", fields.location)?,
        linkedin_url: normalize_with("linkedin_url", fields.linkedin_url, normalize_profile_url)?,
        how_we_met: normalize_text("how_we_met", fields.how_we_met)?,
        why_now: normalize_text("why_now", fields.why_now)?,
        notes: normalize_text("notes", fields.notes)?,
        expertise: normalize_text("expertise", fields.expertise)?,
        interests: normalize_text("interests", fields.interests)?,
    })
}

/// Lowercase a source label, falling back to `default` when absent.
pub fn normalize_source(source: Option<&str>, default: &str) -> Result<String, AppError> {
    let source = match source.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_ascii_lowercase(),
        None => return Ok(default.to_string()),
    };

    if source_regex().is_match(&source) {
        Ok(source)
    } else {
        Err(AppError::BadRequest(format!(
            "Invalid source '{}': use 1-32 lowercase letters, digits, '_' or '-'",
            source
        )))
    }
}

/// Trim tag values, reject blanks, and drop case-insensitive duplicates.
pub fn normalize_tags(tags: Vec<TagInput>) -> Result<Vec<TagInput>, AppError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(tags.len());

    for tag in tags {
        let value = tag.value.trim().to_string();
        if value.is_empty() {
            return Err(AppError::BadRequest("Tag value cannot be empty".to_string()));
        }
        if value.chars().count() > MAX_TAG_LEN {
            return Err(AppError::BadRequest(format!(
                "Tag '{}' exceeds {} characters",
                value, MAX_TAG_LEN
            )));
        }
        if seen.insert((tag.category, value.to_lowercase())) {
            normalized.push(TagInput {
                category: tag.category,
                value,
            });
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TagCategory;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("test.user@example.com"));
        assert!(is_valid_email("user+tag@example.co.uk"));
        assert!(is_valid_email("a@b.co"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("user@examplecom"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user @example.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("(650) 253-0000"), Ok("+16502530000".to_string()));
        assert_eq!(normalize_phone("+1 650 253 0000"), Ok("+16502530000".to_string()));
        assert!(normalize_phone("123").is_err());
        assert!(normalize_phone("not a phone").is_err());
    }

    #[test]
    fn test_profile_url() {
        assert_eq!(
            normalize_profile_url("linkedin.com/in/ana"),
            Ok("https://linkedin.com/in/ana".to_string())
        );
        assert_eq!(
            normalize_profile_url("https://www.linkedin.com/in/ana"),
            Ok("https://www.linkedin.com/in/ana".to_string())
        );
        assert!(normalize_profile_url("ftp://example.com/x").is_err());
    }

    #[test]
    fn test_normalize_fields() {
        let fields = ContactFields {
            first_name: Some("  Ana ".to_string()),
            primary_email: Some(" Ana@Example.COM ".to_string()),
            notes: Some("   ".to_string()),
            ..Default::default()
        };

        let normalized = normalize_fields(fields).unwrap();
        assert_eq!(normalized.first_name.as_deref(), Some("Ana"));
        assert_eq!(normalized.primary_email.as_deref(), Some("ana@example.com"));
        assert_eq!(normalized.notes.as_deref(), Some(""));
        assert_eq!(normalized.title, None);
    }

    #[test]
    fn test_normalize_fields_rejects_bad_email() {
        let fields = ContactFields {
            primary_email: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            normalize_fields(fields),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source(None, "manual").unwrap(), "manual");
        assert_eq!(normalize_source(Some("  "), "import").unwrap(), "import");
        assert_eq!(normalize_source(Some("LinkedIn"), "manual").unwrap(), "linkedin");
        assert!(normalize_source(Some("bad source!"), "manual").is_err());
    }

    #[test]
    fn test_normalize_tags_dedupes() {
        let tags = vec![
            TagInput {
                category: TagCategory::Interest,
                value: " Sailing ".to_string(),
            },
            TagInput {
                category: TagCategory::Interest,
                value: "sailing".to_string(),
            },
            TagInput {
                category: TagCategory::Expertise,
                value: "sailing".to_string(),
            },
        ];

        let normalized = normalize_tags(tags).unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].value, "Sailing");
    }

    #[test]
    fn test_normalize_tags_rejects_blank() {
        let tags = vec![TagInput {
            category: TagCategory::Relationship,
            value: " ".to_string(),
        }];
        assert!(normalize_tags(tags).is_err());
    }
}
