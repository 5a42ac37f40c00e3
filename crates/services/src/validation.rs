//! Input rules shared by the REST handlers and the `/ws` hub.

use chrono::{Datelike, NaiveDate};
use kindred_db::models::GeoPoint;

pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 120;
pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_INTERESTS: usize = 10;
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;
pub const MAX_MESSAGE_CHARS: usize = 2000;

pub fn validate_age(age: u32) -> bool {
    (MIN_AGE..=MAX_AGE).contains(&age)
}

/// Whole years between `birth_date` and `today`. `None` for birth dates in the future.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth_date > today {
        return None;
    }
    let mut years = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

pub fn validate_birth_date(birth_date: NaiveDate, today: NaiveDate) -> Result<u32, String> {
    let age = age_on(birth_date, today).ok_or_else(|| "Birth date is in the future".to_string())?;
    if !validate_age(age) {
        return Err(format!("Age must be between {MIN_AGE} and {MAX_AGE}"));
    }
    Ok(age)
}

pub fn validate_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

pub fn validate_display_name(name: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_DISPLAY_NAME_CHARS {
        return Err(format!(
            "Display name must be 1-{MAX_DISPLAY_NAME_CHARS} characters"
        ));
    }
    Ok(())
}

pub fn validate_bio(bio: &str) -> Result<(), String> {
    if bio.chars().count() > MAX_BIO_CHARS {
        return Err(format!("Bio must be at most {MAX_BIO_CHARS} characters"));
    }
    Ok(())
}

/// Trims, lowercases and dedups interests, rejecting more than [`MAX_INTERESTS`].
pub fn normalize_interests(interests: &[String]) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::with_capacity(interests.len());
    for raw in interests {
        let interest = raw.trim().to_lowercase();
        if interest.is_empty() || out.contains(&interest) {
            continue;
        }
        out.push(interest);
    }
    if out.len() > MAX_INTERESTS {
        return Err(format!("At most {MAX_INTERESTS} interests are allowed"));
    }
    Ok(out)
}

pub fn validate_location(lng: f64, lat: f64) -> Result<GeoPoint, String> {
    let point = GeoPoint::new(lng, lat);
    if !lng.is_finite() || !lat.is_finite() || !point.is_valid() {
        return Err("Coordinates out of range".to_string());
    }
    Ok(point)
}

/// Returns the trimmed content if it is non-empty and within [`MAX_MESSAGE_CHARS`].
pub fn validate_message_content(content: &str) -> Result<&str, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("Message cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(format!("Message must be at most {MAX_MESSAGE_CHARS} characters"));
    }
    Ok(trimmed)
}
