//! # Error classification for connection failures.
//!
//! [`classify`] maps the raw error text reported by a gateway connection to an
//! [`ErrorKind`] and a masked, human-readable description. The kind decides
//! where the failure is reported:
//!
//! | Kind                 | Signatures                                           | Channel    |
//! |----------------------|------------------------------------------------------|------------|
//! | `AuthFailure`        | invalid token, 401, unauthorized, close code 4004    | Critical   |
//! | `RateLimited`        | 429, rate limit, too many requests, close code 4008  | Low        |
//! | `BenignInternal`     | known harmless client exceptions, peer reset         | (log only) |
//! | `NetworkUnreachable` | connection refused, DNS lookup failures, unreachable | Low        |
//! | `ConnectionTimeout`  | synthetic, produced by the handle's connect timer    | Low        |
//! | `Unknown`            | anything else                                        | Low        |
//!
//! Rules are checked top to bottom; the first match wins. Matching is
//! case-insensitive. The credential is masked **before** matching, so the raw
//! secret never reaches a log or a notification.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::credentials::Credential;
use crate::notify::Channel;

/// Message used for the synthetic timeout error.
pub const CONNECTION_TIMEOUT_MESSAGE: &str = "connection timeout";

static AUTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)invalid token|\b401\b|unauthori[sz]ed|authentication failed|\b4004\b|token (has )?expired",
    )
    .expect("static regex")
});

static RATE_LIMITED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b429\b|rate[ -]?limit|too many requests|\b4008\b")
        .expect("static regex")
});

static NETWORK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)econnrefused|connection refused|enotfound|getaddrinfo|failed to lookup address|dns error|network is unreachable|ehostunreach|no route to host",
    )
    .expect("static regex")
});

/// Known-harmless exceptions thrown by gateway client internals.
const BENIGN_SIGNATURES: [&str; 4] = [
    "cannot read properties of undefined (reading 'add')",
    "cannot read properties of undefined (reading 'get')",
    "connection reset by peer",
    "econnreset",
];

/// Category of a connection failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential rejected by the platform; needs a human.
    AuthFailure,
    /// Platform throttled the account; backoff fixes it.
    RateLimited,
    /// Could not reach the platform at all.
    NetworkUnreachable,
    /// Known noise from the client library.
    BenignInternal,
    /// No Ready/Error arrived before the connect timer fired.
    ConnectionTimeout,
    /// Anything not matched above.
    Unknown,
}

impl ErrorKind {
    /// Notification channel for this kind, `None` when it is only logged.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            ErrorKind::AuthFailure => Some(Channel::Critical),
            ErrorKind::RateLimited
            | ErrorKind::NetworkUnreachable
            | ErrorKind::ConnectionTimeout
            | ErrorKind::Unknown => Some(Channel::Low),
            ErrorKind::BenignInternal => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NetworkUnreachable => "network_unreachable",
            ErrorKind::BenignInternal => "benign_internal",
            ErrorKind::ConnectionTimeout => "connection_timeout",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Result of classifying one error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Category.
    pub kind: ErrorKind,
    /// Masked description, safe to log and send.
    pub message: String,
}

impl Classification {
    /// Builds the synthetic classification for an expired connect timer.
    pub fn timeout() -> Self {
        Self {
            kind: ErrorKind::ConnectionTimeout,
            message: CONNECTION_TIMEOUT_MESSAGE.to_string(),
        }
    }

    /// One-line summary used in notifications.
    pub fn describe(&self) -> String {
        match self.kind {
            ErrorKind::AuthFailure => {
                format!("An error occurred in the gateway client. Invalid token. ({})", self.message)
            }
            _ => format!("An error occurred in the gateway client. {}", self.message),
        }
    }
}

/// Classifies raw error text reported for the handle owning `credential`.
pub fn classify(raw: &str, credential: &Credential) -> Classification {
    let message = credential.redact(raw.trim());
    let lowered = message.to_lowercase();

    let kind = if AUTH.is_match(&message) {
        ErrorKind::AuthFailure
    } else if RATE_LIMITED.is_match(&message) {
        ErrorKind::RateLimited
    } else if BENIGN_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
        ErrorKind::BenignInternal
    } else if NETWORK.is_match(&message) {
        ErrorKind::NetworkUnreachable
    } else {
        ErrorKind::Unknown
    };

    Classification { kind, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred() -> Credential {
        Credential::new("abcd1234efgh5678", 0).unwrap()
    }

    fn kind_of(text: &str) -> ErrorKind {
        classify(text, &cred()).kind
    }

    #[test]
    fn test_auth_signatures() {
        assert_eq!(kind_of("Error: Invalid token"), ErrorKind::AuthFailure);
        assert_eq!(kind_of("HTTP 401 Unauthorized"), ErrorKind::AuthFailure);
        assert_eq!(
            kind_of("gateway closed with code 4004: Authentication failed."),
            ErrorKind::AuthFailure
        );
        assert_eq!(
            classify("Error: Invalid token", &cred()).kind.channel(),
            Some(Channel::Critical)
        );
    }

    #[test]
    fn test_rate_limit_signatures() {
        assert_eq!(kind_of("HTTP 429 Too Many Requests"), ErrorKind::RateLimited);
        assert_eq!(kind_of("You are being rate limited."), ErrorKind::RateLimited);
        assert_eq!(kind_of("gateway closed with code 4008"), ErrorKind::RateLimited);
    }

    #[test]
    fn test_network_signatures() {
        assert_eq!(
            kind_of("connect ECONNREFUSED 127.0.0.1:443"),
            ErrorKind::NetworkUnreachable
        );
        assert_eq!(
            kind_of("getaddrinfo ENOTFOUND gateway.discord.gg"),
            ErrorKind::NetworkUnreachable
        );
        assert_eq!(
            kind_of("IO error: Connection refused (os error 111)"),
            ErrorKind::NetworkUnreachable
        );
    }

    #[test]
    fn test_benign_allow_list() {
        assert_eq!(
            kind_of("TypeError: Cannot read properties of undefined (reading 'add')"),
            ErrorKind::BenignInternal
        );
        assert_eq!(
            kind_of("TypeError: Cannot read properties of undefined (reading 'get')"),
            ErrorKind::BenignInternal
        );
        assert_eq!(kind_of("Error: Connection reset by peer"), ErrorKind::BenignInternal);
        assert_eq!(ErrorKind::BenignInternal.channel(), None);
    }

    #[test]
    fn test_unknown_goes_low() {
        let c = classify("something odd happened", &cred());
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert_eq!(c.kind.channel(), Some(Channel::Low));
        assert_eq!(c.message, "something odd happened");
    }

    #[test]
    fn test_numbers_inside_words_do_not_match() {
        assert_eq!(kind_of("session 14010 closed"), ErrorKind::Unknown);
        assert_eq!(kind_of("id 84299 lost"), ErrorKind::Unknown);
    }

    #[test]
    fn test_credential_is_masked_before_reporting() {
        let c = classify("Error: Invalid token abcd1234efgh5678", &cred());
        assert_eq!(c.kind, ErrorKind::AuthFailure);
        assert_eq!(c.message, "Error: Invalid token abcd1234...5678");
        assert!(!c.describe().contains("abcd1234efgh5678"));
    }

    #[test]
    fn test_timeout_classification() {
        let c = Classification::timeout();
        assert_eq!(c.kind, ErrorKind::ConnectionTimeout);
        assert_eq!(c.kind.channel(), Some(Channel::Low));
    }
}
