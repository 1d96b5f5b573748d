//! Shared tooling for testing and benchmarking the learned sort: a `Sort`
//! trait the test battery is generic over, distribution pattern generators,
//! and a multiset checksum helper.

use learned_sort::{Key, Params};

pub trait Sort {
    fn name() -> String;

    fn sort<K>(arr: &mut [K])
    where
        K: Key;

    /// Sort with caller-supplied hyperparameters. Implementations without a
    /// parameter surface ignore `params`.
    fn sort_with<K>(arr: &mut [K], params: &Params)
    where
        K: Key;
}

pub mod patterns;

/// Order-independent multiset checksum over the keys' bit patterns:
/// wrapping sum plus XOR. Two slices with the same multiset of keys always
/// produce the same checksum.
pub fn multiset_checksum<K: Key>(v: &[K]) -> (u64, u64) {
    let mut sum = 0u64;
    let mut xor = 0u64;
    for key in v {
        let bits = key.to_f64().to_bits();
        sum = sum.wrapping_add(bits);
        xor ^= bits;
    }
    (sum, xor)
}
