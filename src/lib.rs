#![forbid(unsafe_code)]
//! mailprobe — staged email deliverability probing.
//!
//! An address is checked at up to four escalating depths: lexical syntax,
//! DNS MX availability, TCP reachability of a mail exchanger, and
//! server-side acceptance of the recipient in an SMTP transaction. No
//! message data is ever transmitted. The verifier reports either
//! [`ValidationLevel::Ok`] or the deepest level that failed.
//!
//! ```no_run
//! use mailprobe::{ValidationLevel, Verifier};
//!
//! let mut verifier = Verifier::system();
//! match verifier.verify("alice@example.com") {
//!     Ok(ValidationLevel::Ok) => println!("deliverable up to the requested depth"),
//!     Ok(level) => println!("failed at {level}"),
//!     Err(err) => eprintln!("bad input: {err}"),
//! }
//! ```

pub mod address;
pub mod canonical;
pub mod dns;
pub mod level;
pub mod smtp;
pub mod validator;
pub mod verify;

pub use address::{AddressCollection, AddressError, Blacklist, EmailAddress};
pub use canonical::{canonical_domain, canonical_email, canonical_fqdn, CanonicalError};
pub use dns::{
    CacheValue, DnsError, DnsFacade, DnsSource, KvCache, MemoryCache, MxRecord, RblServer,
    RblStatus, SystemDnsSource,
};
pub use level::{LevelOutOfBounds, ValidationLevel};
pub use smtp::{
    Capability, HelloKind, LastError, SmtpError, SmtpReply, SmtpSession, TransferLogEntry,
};
pub use validator::check_email;
pub use verify::{Verifier, VerifyError, VerifyOptions};
