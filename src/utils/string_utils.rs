use regex::Regex;
use std::sync::OnceLock;

static RATING_PATTERN: OnceLock<Regex> = OnceLock::new();
static BACKGROUND_IMAGE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn rating_pattern() -> &'static Regex {
    RATING_PATTERN.get_or_init(|| Regex::new(r"^(\d+\.?\d*)").expect("valid rating pattern"))
}

fn background_image_pattern() -> &'static Regex {
    BACKGROUND_IMAGE_PATTERN.get_or_init(|| {
        Regex::new(r#"background-image:\s*url\(\s*["']?([^"')]+)["']?\s*\)"#).expect("valid background-image pattern")
    })
}

/// String utility functions
pub struct StringUtils;

impl StringUtils {
    /// Clean and normalize string
    pub fn normalize(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Truncate string to max characters
    pub fn truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }

    /// Check if string is empty or whitespace only
    pub fn is_blank(s: &str) -> bool {
        s.trim().is_empty()
    }

    /// Leading numeric token of a rating label such as `4.5 stars`
    pub fn parse_rating(label: &str) -> Option<String> {
        rating_pattern()
            .captures(label.trim())
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Remove a field label such as `Address:` and surrounding whitespace
    pub fn strip_label(value: &str, label: &str) -> String {
        value.replace(label, "").trim().to_string()
    }

    /// URL inside a `background-image: url(...)` declaration of an inline style
    pub fn parse_background_image_url(style: &str) -> Option<String> {
        background_image_pattern()
            .captures(style)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rating() {
        assert_eq!(StringUtils::parse_rating("4.5 stars "), Some("4.5".to_string()));
        assert_eq!(StringUtils::parse_rating("5 stars"), Some("5".to_string()));
        assert_eq!(StringUtils::parse_rating("Rated 4.1"), None);
        assert_eq!(StringUtils::parse_rating(""), None);
    }

    #[test]
    fn test_strip_label() {
        assert_eq!(StringUtils::strip_label("Address: 12 Baker St ", "Address:"), "12 Baker St");
        assert_eq!(StringUtils::strip_label("Phone: (555) 010", "Phone:"), "(555) 010");
    }

    #[test]
    fn test_parse_background_image_url() {
        let style = r#"width: 100px; background-image: url("https://lh5.example.com/p/AF1Q=w300-h450"); height: 20px"#;
        assert_eq!(
            StringUtils::parse_background_image_url(style),
            Some("https://lh5.example.com/p/AF1Q=w300-h450".to_string())
        );

        assert_eq!(
            StringUtils::parse_background_image_url("background-image:url('https://img.example/a.jpg')"),
            Some("https://img.example/a.jpg".to_string())
        );
        assert_eq!(StringUtils::parse_background_image_url("color: red"), None);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(StringUtils::truncate("hello", 10), "hello");
        assert_eq!(StringUtils::truncate("héllo wörld", 8), "héllo...");
        assert!(StringUtils::is_blank("  \n"));
        assert_eq!(StringUtils::normalize("  Great\n  bread "), "Great bread");
    }
}
