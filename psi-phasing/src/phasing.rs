//! Hash table geometry for phasing (permutation-based hashing).
//!
//! With `nbins` bins, `floor(log2(nbins))` bits of every element are implied by the bin it lands
//! in, so the circuit only compares the remaining `reduced_bitlen` bits.

/// The table both parties build before the comparison circuit runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhasingTable {
    /// Number of cuckoo bins, `ceil(epsilon * n)`, at least one.
    pub nbins: u64,
    /// Bits needed to address a bin.
    pub index_bits: u32,
    /// Element bits left after the bin index absorbs its share.
    pub reduced_bitlen: u32,
}

impl PhasingTable {
    /// Compute the table for `nelements` elements of `bitlen` bits at load factor `epsilon`.
    pub fn new(nelements: u32, bitlen: u32, epsilon: f64) -> PhasingTable {
        let nbins = compute_nbins(nelements, epsilon);
        let absorbed = 63 - nbins.leading_zeros();
        PhasingTable {
            nbins,
            index_bits: ceil_log2(nbins),
            reduced_bitlen: bitlen.saturating_sub(absorbed),
        }
    }
}

fn compute_nbins(nelements: u32, epsilon: f64) -> u64 {
    // `as` saturates, so absurd epsilons clamp to u64::MAX rather than wrap.
    ((epsilon * f64::from(nelements)).ceil() as u64).max(1)
}

fn ceil_log2(x: u64) -> u32 {
    if x <= 1 {
        0
    } else {
        64 - (x - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_run() {
        // 31 elements at the default load factor.
        let table = PhasingTable::new(31, 32, 1.2);
        assert_eq!(table.nbins, 38);
        assert_eq!(table.index_bits, 6);
        assert_eq!(table.reduced_bitlen, 27);
    }

    #[test]
    fn test_powers_of_two() {
        let table = PhasingTable::new(1024, 64, 1.0);
        assert_eq!(table.nbins, 1024);
        assert_eq!(table.index_bits, 10);
        assert_eq!(table.reduced_bitlen, 54);
    }

    #[test]
    fn test_empty_set() {
        let table = PhasingTable::new(0, 32, 1.2);
        assert_eq!(table.nbins, 1);
        assert_eq!(table.index_bits, 0);
        assert_eq!(table.reduced_bitlen, 32);
    }

    #[test]
    fn test_reduced_bitlen_saturates() {
        let table = PhasingTable::new(1 << 20, 8, 1.0);
        assert_eq!(table.reduced_bitlen, 0);
    }

    proptest! {
        #[test]
        fn test_geometry(n in 1u32..1 << 28, bitlen in 1u32..=128, eps in 1.0f64..4.0) {
            let table = PhasingTable::new(n, bitlen, eps);
            prop_assert!(table.nbins >= u64::from(n));
            prop_assert!(table.nbins as f64 >= eps * f64::from(n));
            // `index_bits` is the smallest width that addresses every bin.
            prop_assert!(1u128 << table.index_bits >= u128::from(table.nbins));
            if table.index_bits > 0 {
                prop_assert!(1u128 << (table.index_bits - 1) < u128::from(table.nbins));
            }
            prop_assert!(table.reduced_bitlen <= bitlen);
            prop_assert!(bitlen - table.reduced_bitlen <= table.index_bits);
        }
    }
}
