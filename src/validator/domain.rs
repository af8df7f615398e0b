use std::net::{Ipv4Addr, Ipv6Addr};

/// Hostname or address-literal rules for the domain side of an address.
///
/// Hostnames are checked after IDNA conversion, so Unicode domains are
/// accepted whenever their Punycode form is a valid LDH hostname.
pub(crate) fn is_domain_valid(domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    if let Some(literal) = domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        return is_address_literal(literal);
    }

    let ascii = match idna::domain_to_ascii(domain) {
        Ok(ascii) if !ascii.is_empty() => ascii,
        _ => return false,
    };

    let labels: Vec<&str> = ascii.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    if !labels.iter().all(|label| is_ldh_label(label)) {
        return false;
    }

    // the TLD must not look like a number; Punycode TLDs are exempt
    let last = labels[labels.len() - 1];
    last.starts_with("xn--") || last.chars().all(|c| c.is_ascii_alphabetic())
}

/// `[1.2.3.4]` or `[IPv6:...]` literal content.
fn is_address_literal(literal: &str) -> bool {
    if let Some(v6) = literal.strip_prefix("IPv6:") {
        v6.parse::<Ipv6Addr>().is_ok()
    } else {
        literal.parse::<Ipv4Addr>().is_ok()
    }
}

/// Letter-digit-hyphen label, with an optional `xn-` / `xn--` prefix.
fn is_ldh_label(label: &str) -> bool {
    let body = label
        .strip_prefix("xn--")
        .or_else(|| label.strip_prefix("xn-"))
        .unwrap_or(label);
    if body.is_empty() || body.len() > 63 {
        return false;
    }
    let bytes = body.as_bytes();
    if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}
