//! The escalation ladder for deliverability checks.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A point in the verification escalation ordering.
///
/// Levels are totally ordered; [`ValidationLevel::Ok`] is a sentinel meaning
/// "the requested depth was reached", never a depth a caller may request.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValidationLevel {
    /// Lexical validation of the address string.
    SyntaxCheck = 1,
    /// The domain resolves to at least one MX exchange.
    DnsQuery = 2,
    /// An MX host accepts a TCP connection on the SMTP port.
    SmtpConnection = 3,
    /// The server accepts the address as a `RCPT TO` recipient.
    SendAttempt = 4,
    /// Sentinel: the requested depth succeeded.
    Ok = 5,
}

/// Returned when a caller requests a depth outside
/// `[SyntaxCheck, SendAttempt]`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("validation level {level} is out of bounds")]
pub struct LevelOutOfBounds {
    pub level: ValidationLevel,
}

impl ValidationLevel {
    /// The next deeper level, saturating at [`ValidationLevel::Ok`].
    pub fn next(self) -> Self {
        match self {
            Self::SyntaxCheck => Self::DnsQuery,
            Self::DnsQuery => Self::SmtpConnection,
            Self::SmtpConnection => Self::SendAttempt,
            Self::SendAttempt | Self::Ok => Self::Ok,
        }
    }

    /// Rejects levels that cannot be requested as a probing depth.
    pub fn bounds_check(self) -> Result<(), LevelOutOfBounds> {
        if self >= Self::Ok {
            Err(LevelOutOfBounds { level: self })
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SyntaxCheck => "syntax-check",
            Self::DnsQuery => "dns-query",
            Self::SmtpConnection => "smtp-connection",
            Self::SendAttempt => "send-attempt",
            Self::Ok => "ok",
        })
    }
}

impl TryFrom<u8> for ValidationLevel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(Self::SyntaxCheck),
            2 => Ok(Self::DnsQuery),
            3 => Ok(Self::SmtpConnection),
            4 => Ok(Self::SendAttempt),
            5 => Ok(Self::Ok),
            other => Err(other),
        }
    }
}

impl FromStr for ValidationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "syntax" | "syntax-check" => Ok(Self::SyntaxCheck),
            "dns" | "dns-query" => Ok(Self::DnsQuery),
            "connect" | "smtp-connection" => Ok(Self::SmtpConnection),
            "send" | "send-attempt" => Ok(Self::SendAttempt),
            other => Err(format!("unknown validation level '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_totally_ordered() {
        use ValidationLevel::*;
        assert!(SyntaxCheck < DnsQuery);
        assert!(DnsQuery < SmtpConnection);
        assert!(SmtpConnection < SendAttempt);
        assert!(SendAttempt < Ok);
    }

    #[test]
    fn next_saturates_at_ok() {
        assert_eq!(ValidationLevel::SyntaxCheck.next(), ValidationLevel::DnsQuery);
        assert_eq!(ValidationLevel::SendAttempt.next(), ValidationLevel::Ok);
        assert_eq!(ValidationLevel::Ok.next(), ValidationLevel::Ok);
    }

    #[test]
    fn bounds_check_rejects_sentinel() {
        assert!(ValidationLevel::SyntaxCheck.bounds_check().is_ok());
        assert!(ValidationLevel::SendAttempt.bounds_check().is_ok());
        let err = ValidationLevel::Ok.bounds_check().expect_err("sentinel");
        assert_eq!(err.level, ValidationLevel::Ok);
    }

    #[test]
    fn roundtrips_through_u8() {
        for raw in 1u8..=5 {
            let level = ValidationLevel::try_from(raw).expect("in range");
            assert_eq!(level as u8, raw);
        }
        assert!(ValidationLevel::try_from(0).is_err());
        assert!(ValidationLevel::try_from(6).is_err());
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!(
            "connect".parse::<ValidationLevel>().unwrap(),
            ValidationLevel::SmtpConnection
        );
        assert!("deliver".parse::<ValidationLevel>().is_err());
    }
}
