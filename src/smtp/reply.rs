//! SMTP reply parsing, RFC 5321 §4.2.
//!
//! Parsing is total: any byte salad yields *some* reply, and an
//! out-of-contract reply simply fails the expected-code check downstream.
//! Multi-line replies use `NNN-` on every line but the last, which uses
//! `NNN `; lines of three characters or less are terminal as well.

/// A parsed server reply.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    /// Three-digit status code; 0 when the reply was unparseable or empty.
    pub code: u16,
    /// Enhanced status (`X.Y.Z`) from the first line, when present.
    pub enhanced_code: Option<String>,
    /// Reply text with the status prefixes stripped from every line.
    pub detail: String,
}

impl SmtpReply {
    /// Parses a raw (possibly multi-line) reply.
    ///
    /// Falls back to `code = first three chars, detail = from index 4` when
    /// the first line does not carry a well-formed status prefix.
    pub fn parse(raw: &str) -> Self {
        let mut code = 0u16;
        let mut enhanced_code = None;
        let mut details = Vec::new();

        for (index, line) in raw.lines().enumerate() {
            let (line_code, rest) = split_status_prefix(line);
            if index == 0 {
                match line_code {
                    Some(parsed) => code = parsed,
                    // fallback: salvage whatever sits in the code position
                    None => {
                        code = line.get(..3).and_then(|s| s.parse().ok()).unwrap_or(0);
                        details.push(line.get(4..).unwrap_or("").to_string());
                        continue;
                    }
                }
            }
            let (line_enhanced, text) = split_enhanced_code(rest);
            if index == 0 {
                enhanced_code = line_enhanced.map(str::to_string);
            }
            details.push(text.to_string());
        }

        Self {
            code,
            enhanced_code,
            detail: details.join("\n"),
        }
    }

    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }
}

/// `250-rest` / `250 rest` → `(Some(250), "rest")`; `250` alone parses too.
fn split_status_prefix(line: &str) -> (Option<u16>, &str) {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return (None, line);
    }
    let code = line[..3].parse().ok();
    match bytes.get(3) {
        None => (code, ""),
        Some(b' ') | Some(b'-') => (code, &line[4..]),
        Some(_) => (None, line),
    }
}

/// `2.1.5 Ok` → `(Some("2.1.5"), "Ok")`; anything else passes through.
fn split_enhanced_code(text: &str) -> (Option<&str>, &str) {
    let Some((candidate, rest)) = text.split_once(' ') else {
        return (None, text);
    };
    let mut groups = 0;
    for group in candidate.split('.') {
        if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
            return (None, text);
        }
        groups += 1;
    }
    if groups == 3 {
        (Some(candidate), rest)
    } else {
        (None, text)
    }
}
