//! Security levels, keyed by their symmetric security parameter.
//!
//! Each level pins the bit sizes of every primitive family a run may touch, so that asking for
//! "128-bit security" picks matching statistical, integer-factorization and elliptic-curve sizes.
use crate::errors::{Error, Result};

/// A concrete security-level descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SecurityLevel {
    /// Statistical security parameter.
    pub statbits: u32,
    /// Symmetric security parameter.
    pub symbits: u32,
    /// Integer factorization / finite field modulus size.
    pub ifcbits: u32,
    /// Elliptic curve size over a prime field.
    pub eccpfbits: u32,
    /// Elliptic curve size over a binary (Koblitz) field.
    pub ecckcbits: u32,
}

/// Short-term security (80 bits).
pub const ST: SecurityLevel = SecurityLevel {
    statbits: 40,
    symbits: 80,
    ifcbits: 1024,
    eccpfbits: 160,
    ecckcbits: 163,
};
/// Medium-term security (112 bits).
pub const MT: SecurityLevel = SecurityLevel {
    statbits: 40,
    symbits: 112,
    ifcbits: 2048,
    eccpfbits: 192,
    ecckcbits: 233,
};
/// Long-term security (128 bits). This is the default.
pub const LT: SecurityLevel = SecurityLevel {
    statbits: 40,
    symbits: 128,
    ifcbits: 3072,
    eccpfbits: 256,
    ecckcbits: 283,
};
/// Extra long-term security (192 bits).
pub const XLT: SecurityLevel = SecurityLevel {
    statbits: 40,
    symbits: 192,
    ifcbits: 7680,
    eccpfbits: 384,
    ecckcbits: 409,
};
/// Extra extra long-term security (256 bits).
pub const XXLT: SecurityLevel = SecurityLevel {
    statbits: 40,
    symbits: 256,
    ifcbits: 15360,
    eccpfbits: 512,
    ecckcbits: 571,
};

/// Every level that can be selected, in increasing order of strength.
pub const LEVELS: [SecurityLevel; 5] = [ST, MT, LT, XLT, XXLT];

impl SecurityLevel {
    /// Look up the level whose symmetric security parameter is exactly `symbits`.
    pub fn from_symbits(symbits: u32) -> Result<SecurityLevel> {
        LEVELS
            .iter()
            .find(|lvl| lvl.symbits == symbits)
            .copied()
            .ok_or(Error::UnsupportedSecurityLevel(symbits))
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        LT
    }
}

/// Maps a symmetric security parameter to a [`SecurityLevel`].
pub trait SecurityLevelResolver {
    /// Resolve `symbits`, failing with [`Error::UnsupportedSecurityLevel`] if unknown.
    fn resolve(&self, symbits: u32) -> Result<SecurityLevel>;
}

/// Resolver over the fixed [`LEVELS`] table.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardLevels;

impl SecurityLevelResolver for StandardLevels {
    fn resolve(&self, symbits: u32) -> Result<SecurityLevel> {
        SecurityLevel::from_symbits(symbits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels_resolve() {
        for bits in [80, 112, 128, 192, 256] {
            let lvl = StandardLevels.resolve(bits).unwrap();
            assert_eq!(lvl.symbits, bits);
            assert_eq!(lvl.statbits, 40);
        }
        assert_eq!(StandardLevels.resolve(128).unwrap(), SecurityLevel::default());
    }

    #[test]
    fn test_unknown_levels_fail() {
        for bits in [0, 64, 127, 129, 512] {
            match StandardLevels.resolve(bits) {
                Err(Error::UnsupportedSecurityLevel(b)) => assert_eq!(b, bits),
                other => panic!("expected unsupported level for {bits}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_levels_strictly_increase() {
        for pair in LEVELS.windows(2) {
            assert!(pair[0].symbits < pair[1].symbits);
            assert!(pair[0].ifcbits < pair[1].ifcbits);
        }
    }
}
