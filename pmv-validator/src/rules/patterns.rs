//! Named format patterns
//!
//! A string field is checked against a pattern when its leaf name matches
//! the pattern's key (case-insensitive substring, e.g. `hostEmail` → email).

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap());
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ().\-]{6,18}[0-9]$").unwrap());
static POSTAL_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 \-]{1,8}[A-Za-z0-9]$").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap());
static CURRENCY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());
static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap());

/// Format pattern names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPattern {
    Email,
    Phone,
    PostalCode,
    Url,
    Currency,
}

impl FormatPattern {
    pub fn name(&self) -> &'static str {
        match self {
            FormatPattern::Email => "email",
            FormatPattern::Phone => "phone",
            FormatPattern::PostalCode => "postalCode",
            FormatPattern::Url => "url",
            FormatPattern::Currency => "currency",
        }
    }

    /// Pattern implied by a field's leaf name, if any
    pub fn for_field(leaf: &str) -> Option<Self> {
        let key = leaf.to_ascii_lowercase();
        if key.contains("email") {
            Some(FormatPattern::Email)
        } else if key.contains("phone") {
            Some(FormatPattern::Phone)
        } else if key.contains("postalcode") || key.contains("zipcode") || key == "zip" {
            Some(FormatPattern::PostalCode)
        } else if key.contains("url") || key == "website" {
            Some(FormatPattern::Url)
        } else if key == "currency" {
            Some(FormatPattern::Currency)
        } else {
            None
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        let value = value.trim();
        match self {
            FormatPattern::Email => EMAIL.is_match(value),
            FormatPattern::Phone => PHONE.is_match(value),
            FormatPattern::PostalCode => POSTAL_CODE.is_match(value),
            FormatPattern::Url => URL.is_match(value),
            FormatPattern::Currency => CURRENCY.is_match(value),
        }
    }
}

pub fn is_clock_time(value: &str) -> bool {
    CLOCK_TIME.is_match(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_for_field() {
        assert_eq!(FormatPattern::for_field("hostEmail"), Some(FormatPattern::Email));
        assert_eq!(FormatPattern::for_field("phoneNumber"), Some(FormatPattern::Phone));
        assert_eq!(FormatPattern::for_field("postalCode"), Some(FormatPattern::PostalCode));
        assert_eq!(FormatPattern::for_field("photoUrl"), Some(FormatPattern::Url));
        assert_eq!(FormatPattern::for_field("currency"), Some(FormatPattern::Currency));
        assert_eq!(FormatPattern::for_field("name"), None);
    }

    #[test]
    fn test_email_pattern() {
        assert!(FormatPattern::Email.matches("host@example.com"));
        assert!(!FormatPattern::Email.matches("host@example"));
        assert!(!FormatPattern::Email.matches("not an email"));
    }

    #[test]
    fn test_phone_pattern() {
        assert!(FormatPattern::Phone.matches("+1 (555) 123-4567"));
        assert!(FormatPattern::Phone.matches("0612345678"));
        assert!(!FormatPattern::Phone.matches("call me"));
    }

    #[test]
    fn test_other_patterns() {
        assert!(FormatPattern::PostalCode.matches("75001"));
        assert!(FormatPattern::PostalCode.matches("SW1A 1AA"));
        assert!(FormatPattern::Url.matches("https://example.com/p/1.jpg"));
        assert!(!FormatPattern::Url.matches("example.com"));
        assert!(FormatPattern::Currency.matches("EUR"));
        assert!(!FormatPattern::Currency.matches("euro"));
        assert!(is_clock_time("15:30"));
        assert!(!is_clock_time("3pm"));
    }
}
