//! # Account credentials: parsing and masking.
//!
//! [`Credential`] wraps one secret account token. Its `Debug` and `Display`
//! implementations print the **masked** form, so a credential can be put into a
//! log line or a format string without leaking. The raw value is only reachable
//! through [`Credential::expose`], which the gateway adapter uses to identify.
//!
//! ## Accepted list formats
//! [`parse_credentials`] tries, in order:
//! ```text
//! 1. JSON array          ["tok1", "tok2"]
//! 2. bracketed list      [tok1, tok2]        ('…' or "…" around items allowed)
//! 3. comma-separated     tok1, tok2
//! 4. legacy single value TOKEN=tok1          (only if the list yields nothing)
//! ```
//! Malformed JSON falls through to the next format instead of failing.
//!
//! ## Masking
//! ```text
//! len >= 16  →  first 8 + "..." + last 4      abcd1234efgh5678 → abcd1234...5678
//! len <  16  →  generic placeholder           (never contains any credential char)
//! ```
//! [`Credential::redact`] replaces every occurrence of the raw value inside a
//! text. The result never contains the raw value and redacting it again is a
//! no-op.

use std::fmt;

use crate::error::ConfigError;

/// Minimum length for which the masked form reveals a prefix and suffix.
const REVEAL_MIN_LEN: usize = 16;
const REVEAL_HEAD: usize = 8;
const REVEAL_TAIL: usize = 4;

/// Placeholders for short credentials, tried in order; the first one sharing no
/// character with the credential wins.
const GENERIC_PLACEHOLDERS: [&str; 4] = ["[redacted]", "********", "########", "~~~~~~~~"];

/// One account secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    raw: String,
    masked: String,
}

impl Credential {
    /// Wraps a raw token after validating it.
    ///
    /// `index` is only used to point at the offending entry in the error.
    pub fn new(raw: impl Into<String>, index: usize) -> Result<Self, ConfigError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ConfigError::MalformedCredential {
                index,
                reason: "empty value",
            });
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(ConfigError::MalformedCredential {
                index,
                reason: "contains whitespace",
            });
        }
        if raw.contains(['[', ']', '"', '\'']) {
            return Err(ConfigError::MalformedCredential {
                index,
                reason: "contains list delimiters",
            });
        }
        let masked = mask(&raw);
        Ok(Self { raw, masked })
    }

    /// Returns the raw secret. Only the gateway adapter should call this.
    pub fn expose(&self) -> &str {
        &self.raw
    }

    /// Returns the masked form (safe to log).
    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// Replaces every occurrence of this credential inside `text` with its masked form.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        // Each pass shrinks the text (long form) or uses disjoint characters
        // (short form), so the loop terminates.
        while out.contains(self.raw.as_str()) {
            out = out.replace(self.raw.as_str(), &self.masked);
        }
        out
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked)
    }
}

/// Computes the masked form of a raw credential.
fn mask(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() >= REVEAL_MIN_LEN {
        let head: String = chars[..REVEAL_HEAD].iter().collect();
        let tail: String = chars[chars.len() - REVEAL_TAIL..].iter().collect();
        return format!("{head}...{tail}");
    }

    GENERIC_PLACEHOLDERS
        .iter()
        .find(|p| !p.chars().any(|c| raw.contains(c)))
        .copied()
        .unwrap_or("\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}")
        .to_string()
}

/// Parses the configured credential inputs into an ordered list.
///
/// `list` is the multi-account value (JSON array, bracketed list or comma
/// separated string); `legacy` is the single-credential fallback used when
/// `list` is absent or yields nothing.
///
/// # Errors
/// - [`ConfigError::NoCredentials`] when nothing usable is configured;
/// - [`ConfigError::MalformedCredential`] when an entry fails validation.
pub fn parse_credentials(
    list: Option<&str>,
    legacy: Option<&str>,
) -> Result<Vec<Credential>, ConfigError> {
    let items = list.map(split_list).unwrap_or_default();

    let items = if items.is_empty() {
        match legacy.map(str::trim).filter(|s| !s.is_empty()) {
            Some(single) => vec![single.to_string()],
            None => return Err(ConfigError::NoCredentials),
        }
    } else {
        items
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, raw)| Credential::new(raw, index))
        .collect()
}

/// Splits a list value, falling back through the accepted formats.
fn split_list(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
        return clean(items.iter().map(String::as_str));
    }

    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return clean(inner.split(','));
    }

    clean(trimmed.split(','))
}

fn clean<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(|item| strip_quotes(item.trim()))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_quotes(item: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = item
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(list: &[Credential]) -> Vec<&str> {
        list.iter().map(Credential::expose).collect()
    }

    #[test]
    fn test_all_formats_yield_same_sequence() {
        let inputs = [
            r#"["tokA1", "tokB2", "tokC3"]"#,
            "[tokA1, tokB2, tokC3]",
            "['tokA1','tokB2','tokC3']",
            "tokA1,tokB2,tokC3",
            " tokA1 , tokB2 ,tokC3 ",
        ];
        for input in inputs {
            let parsed = parse_credentials(Some(input), None).unwrap();
            assert_eq!(raw(&parsed), vec!["tokA1", "tokB2", "tokC3"], "input {input:?}");
        }
    }

    #[test]
    fn test_legacy_single_value() {
        let parsed = parse_credentials(None, Some("  legacyTok ")).unwrap();
        assert_eq!(raw(&parsed), vec!["legacyTok"]);
    }

    #[test]
    fn test_list_wins_over_legacy() {
        let parsed = parse_credentials(Some("a1,b2"), Some("legacy")).unwrap();
        assert_eq!(raw(&parsed), vec!["a1", "b2"]);
    }

    #[test]
    fn test_empty_list_falls_back_to_legacy() {
        let parsed = parse_credentials(Some("[]"), Some("legacy")).unwrap();
        assert_eq!(raw(&parsed), vec!["legacy"]);
    }

    #[test]
    fn test_nothing_configured_is_error() {
        assert_eq!(
            parse_credentials(None, None).unwrap_err(),
            ConfigError::NoCredentials
        );
        assert_eq!(
            parse_credentials(Some("  "), Some("")).unwrap_err(),
            ConfigError::NoCredentials
        );
        assert_eq!(
            parse_credentials(Some(" , ,"), None).unwrap_err(),
            ConfigError::NoCredentials
        );
    }

    #[test]
    fn test_malformed_json_falls_back() {
        // Unterminated JSON string: not valid JSON, still a bracketed list.
        let parsed = parse_credentials(Some(r#"["tokA1, tokB2]"#), None);
        assert!(matches!(
            parsed,
            Err(ConfigError::MalformedCredential { index: 0, .. })
        ));

        let parsed = parse_credentials(Some("[tokA1, tokB2"), None);
        assert!(matches!(
            parsed,
            Err(ConfigError::MalformedCredential { index: 0, .. })
        ));
    }

    #[test]
    fn test_whitespace_inside_credential_rejected() {
        let err = parse_credentials(Some("good1,bad token"), None).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MalformedCredential {
                index: 1,
                reason: "contains whitespace"
            }
        );
    }

    #[test]
    fn test_mask_long_credential() {
        let cred = Credential::new("abcd1234efgh5678", 0).unwrap();
        assert_eq!(cred.masked(), "abcd1234...5678");
        assert_eq!(format!("{cred}"), "abcd1234...5678");
        assert_eq!(format!("{cred:?}"), "Credential(\"abcd1234...5678\")");
    }

    #[test]
    fn test_mask_short_credential_is_generic() {
        let cred = Credential::new("short", 0).unwrap();
        assert_eq!(cred.masked(), "********");

        // Shares characters with "[redacted]" and "********".
        let cred = Credential::new("d*x", 0).unwrap();
        assert_eq!(cred.masked(), "########");
    }

    #[test]
    fn test_redact_removes_raw_and_is_idempotent() {
        let cases = [
            ("abcd1234efgh5678", "Error: Invalid token abcd1234efgh5678 at gateway"),
            ("aaaaaaaaaaaaaaaa", "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            ("x*", "bad x* token x*x*"),
            ("tok", "tok tok tok"),
        ];
        for (secret, text) in cases {
            let cred = Credential::new(secret, 0).unwrap();
            let once = cred.redact(text);
            assert!(!once.contains(secret), "{secret:?} leaked in {once:?}");
            assert_eq!(cred.redact(&once), once);
        }
    }

    #[test]
    fn test_redact_leaves_unrelated_text() {
        let cred = Credential::new("abcd1234efgh5678", 0).unwrap();
        assert_eq!(cred.redact("connection reset"), "connection reset");
    }
}
