//! Address literal validation
//!
//! Pure checks over arbitrary strings. None of these functions allocate or
//! fail; anything that is not a well-formed literal is simply `false`.
//!
//! The IPv6 check is intentionally loose: it accepts 2 to 8 colon-separated
//! groups of 0-4 hex digits and does not count `::` compression against
//! RFC 4291. Literals such as `1::2::3` therefore pass.

use crate::traits::IpVersion;

/// Four dot-separated decimal groups, each in `0..=255`
pub fn is_valid_v4(s: &str) -> bool {
    let mut groups = 0;
    for group in s.split('.') {
        groups += 1;
        if groups > 4 || group.is_empty() || group.len() > 3 {
            return false;
        }
        if !group.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match group.parse::<u16>() {
            Ok(value) if value <= 255 => {}
            _ => return false,
        }
    }
    groups == 4
}

/// Colon-separated hextets, 2 to 8 groups of 0-4 hex digits
pub fn is_valid_v6(s: &str) -> bool {
    if !s.contains(':') {
        return false;
    }
    let mut groups = 0;
    for group in s.split(':') {
        groups += 1;
        if groups > 8 || group.len() > 4 {
            return false;
        }
        if !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }
    }
    groups >= 2
}

/// Either family
pub fn is_valid(s: &str) -> bool {
    is_valid_v4(s) || is_valid_v6(s)
}

/// Check a literal against one specific family
pub fn is_valid_for(version: IpVersion, s: &str) -> bool {
    match version {
        IpVersion::V4 => is_valid_v4(s),
        IpVersion::V6 => is_valid_v6(s),
    }
}

/// Canonical form used when comparing a published value with a discovered one
pub fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}
