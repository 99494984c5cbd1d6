#![forbid(unsafe_code)]

//! Constant-time comparison.

use subtle::ConstantTimeEq;

/// Compare two byte strings without short-circuiting on the first
/// mismatching byte. Different lengths compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"digest", b"digest"));
        assert!(!constant_time_eq(b"digest", b"digesT"));
        assert!(!constant_time_eq(b"digest", b"diges"));
        assert!(constant_time_eq(b"", b""));
    }
}
