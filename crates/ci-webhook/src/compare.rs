//! Secure token comparison
//!
//! Compares the caller-supplied token against the configured secret without
//! leaking how many leading bytes matched.

use subtle::ConstantTimeEq;

/// Compare a received token with the expected secret in constant time.
///
/// Returns `false` straight away when either side is missing or empty; that
/// only reveals that no token was supplied (or none is configured). For
/// non-empty inputs the work depends on the input lengths alone, never on the
/// position of the first differing byte.
pub fn secure_compare(received: Option<&str>, expected: &str) -> bool {
    let received = match received {
        Some(token) if !token.is_empty() => token,
        _ => return false,
    };
    if expected.is_empty() {
        return false;
    }

    // `ct_eq` on slices of different lengths returns false without looking
    // at the content; lengths are not secret.
    received.as_bytes().ct_eq(expected.as_bytes()).into()
}
