//! EHLO/HELO capability discovery.

use std::collections::HashMap;

use super::reply::SmtpReply;

/// Which greeting command established the session.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloKind {
    Ehlo,
    Helo,
}

impl HelloKind {
    pub fn command(self) -> &'static str {
        match self {
            Self::Ehlo => "EHLO",
            Self::Helo => "HELO",
        }
    }
}

/// A capability advertised in the EHLO response.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// The server identifier from the greeting line, stored under the
    /// `EHLO`/`HELO` key.
    Ident(String),
    /// `SIZE` extension: maximum message size, 0 when unspecified.
    Size(u64),
    /// `AUTH` extension: advertised mechanisms, possibly empty.
    Auth(Vec<String>),
    /// Any other extension, present without options.
    Enabled,
}

/// Parses a successful EHLO/HELO reply into the capability map.
///
/// Line 0 is the server greeting; its first token is the server's
/// identifier. Every following line names one extension, keyed by its
/// uppercased first token.
pub(crate) fn parse_capabilities(
    kind: HelloKind,
    reply: &SmtpReply,
) -> HashMap<String, Capability> {
    let mut capabilities = HashMap::new();
    let mut lines = reply.detail.lines();

    let ident = lines
        .next()
        .and_then(|line| line.split_whitespace().next())
        .unwrap_or("")
        .to_string();
    capabilities.insert(kind.command().to_string(), Capability::Ident(ident));

    for line in lines {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };
        let name = name.to_ascii_uppercase();
        let value = match name.as_str() {
            "SIZE" => Capability::Size(
                tokens
                    .next()
                    .and_then(|token| token.parse().ok())
                    .unwrap_or(0),
            ),
            "AUTH" => Capability::Auth(tokens.map(str::to_string).collect()),
            _ => Capability::Enabled,
        };
        capabilities.insert(name, value);
    }
    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ehlo_reply(raw: &str) -> HashMap<String, Capability> {
        parse_capabilities(HelloKind::Ehlo, &SmtpReply::parse(raw))
    }

    #[test]
    fn greeting_line_becomes_server_ident() {
        let caps = ehlo_reply("250-mx.example.com greets client\n250 PIPELINING");
        assert_eq!(
            caps.get("EHLO"),
            Some(&Capability::Ident("mx.example.com".into()))
        );
        assert_eq!(caps.get("PIPELINING"), Some(&Capability::Enabled));
    }

    #[test]
    fn size_parses_integer_or_zero() {
        let caps = ehlo_reply("250-mx.example.com\n250-SIZE 35882577\n250 HELP");
        assert_eq!(caps.get("SIZE"), Some(&Capability::Size(35_882_577)));

        let caps = ehlo_reply("250-mx.example.com\n250 SIZE");
        assert_eq!(caps.get("SIZE"), Some(&Capability::Size(0)));
    }

    #[test]
    fn auth_collects_mechanisms() {
        let caps = ehlo_reply("250-mx.example.com\n250 AUTH PLAIN LOGIN CRAM-MD5");
        assert_eq!(
            caps.get("AUTH"),
            Some(&Capability::Auth(vec![
                "PLAIN".into(),
                "LOGIN".into(),
                "CRAM-MD5".into()
            ]))
        );

        let caps = ehlo_reply("250-mx.example.com\n250 AUTH");
        assert_eq!(caps.get("AUTH"), Some(&Capability::Auth(Vec::new())));
    }

    #[test]
    fn capability_names_are_uppercased() {
        let caps = ehlo_reply("250-mx.example.com\n250 starttls");
        assert_eq!(caps.get("STARTTLS"), Some(&Capability::Enabled));
    }

    #[test]
    fn helo_records_only_the_ident() {
        let caps = parse_capabilities(HelloKind::Helo, &SmtpReply::parse("250 mx.example.com"));
        assert_eq!(
            caps.get("HELO"),
            Some(&Capability::Ident("mx.example.com".into()))
        );
        assert_eq!(caps.len(), 1);
    }
}
