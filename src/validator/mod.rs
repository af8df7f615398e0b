//! Lexical email validation.
//!
//! [`check_email`] is a pure predicate: RFC 5321/5322 style rules with
//! hostname, address-literal and quoted-string extensions, and no I/O.
//! Deliverability questions (does the domain route mail?) belong to the
//! verification engine, not to this module.

mod domain;
mod local;

use domain::is_domain_valid;
use local::is_local_valid;

/// Maximum length of a full address, per RFC 5321 path limits.
const MAX_ADDRESS_LEN: usize = 254;
/// Maximum length of the local part.
const MAX_LOCAL_LEN: usize = 64;

/// Returns `true` when `email` is lexically a deliverable-looking address.
///
/// The input is trimmed first. The rightmost `@` splits local part and
/// domain, so quoted local parts may themselves contain `@`.
pub fn check_email(email: &str) -> bool {
    let input = email.trim();
    if input.is_empty() || input.len() > MAX_ADDRESS_LEN {
        return false;
    }
    if input.chars().any(char::is_control) {
        return false;
    }
    let Some((local, domain)) = input.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        return false;
    }
    is_local_valid(local) && is_domain_valid(domain)
}
