//! Learned Sort: an in-place, comparison-free sorting procedure for numeric
//! keys, guided by a learned model of the input's cumulative distribution
//! function.
//!
//! A call to [`sort`] trains a small two-layer linear model (an RMI) on a
//! sample of the input, uses it to place every key close to its final
//! position, and finishes the placement with a deterministic insertion-sort
//! touch-up. Keys that would overflow their predicted bucket and keys that
//! repeat heavily are handled by dedicated overflow and exception paths, so
//! the result is sorted for adversarial inputs too.
//!
//! Inputs that are too small to benefit from learned placement, and inputs
//! whose sample cannot train a model (for example a constant input), are
//! sorted with the standard library's unstable sort instead.
//!
//! # Examples
//!
//! ```
//! let mut v = [5.0_f64, 4.0, 1.0, 3.0, 2.0];
//!
//! learned_sort::sort(&mut v);
//! assert_eq!(v, [1.0, 2.0, 3.0, 4.0, 5.0]);
//! ```
//!
//! This sort is unstable (i.e., may reorder equal elements), and sorts only
//! slices of [`Key`] scalars in their natural ascending order. The multiset
//! of keys is always preserved.

use core::cmp::Ordering;

mod engine;
mod rmi;

pub use rmi::{train, CdfModel, LinearModel, Params, Rmi};

/// A sortable scalar key.
///
/// The model arithmetic runs on `f64`, so a key must project onto the reals.
/// The projection has to be monotone with respect to `<`: if `a < b` then
/// `a.to_f64() <= b.to_f64()`. A lossy projection (`u64` beyond 2^53) only
/// degrades placement quality, never correctness, because every final
/// ordering decision is made by comparisons.
///
/// `PartialOrd` must be a total order over the values actually sorted; float
/// slices must not contain NaN.
pub trait Key: Copy + PartialOrd {
    /// Projection of the key onto `f64` used for CDF prediction.
    fn to_f64(self) -> f64;
}

macro_rules! impl_key {
    ($($t:ty)*) => {
        $(
            impl Key for $t {
                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_key!(i8 i16 i32 i64 isize u8 u16 u32 u64 usize f32 f64);

/// Sorts the slice in place with the default [`Params`].
///
/// Equivalent to `sort_with(v, &Params::default())`.
#[inline]
pub fn sort<K: Key>(v: &mut [K]) {
    sort_with(v, &Params::default());
}

/// Sorts the slice in place with caller-supplied [`Params`].
///
/// Out-of-range parameter fields are repaired to their defaults (reported via
/// [`log::warn!`], never fatal). Inputs no larger than
/// `max(fanout * threshold, 5 * arch[1])` skip training entirely and go to
/// the fallback sort, as do inputs whose sample has too few distinct values
/// to train on.
pub fn sort_with<K: Key>(v: &mut [K], params: &Params) {
    let small_limit = (params.fanout as usize)
        .saturating_mul(params.threshold as usize)
        .max(5 * params.arch[1] as usize);

    if v.len() <= small_limit {
        fallback_sort(v);
        return;
    }

    match rmi::train(v, params) {
        Rmi::Trained(model) => engine::sort_trained(v, &model),
        Rmi::Untrained => fallback_sort(v),
    }
}

/// Comparison sort used for small inputs and untrainable distributions:
/// in-place, O(n log n) worst-case.
fn fallback_sort<K: Key>(v: &mut [K]) {
    v.sort_unstable_by(cmp_keys);
}

// Keys obeying the `Key` contract always compare; `Equal` for the
// unreachable incomparable case keeps the hot comparators panic-free.
#[inline]
pub(crate) fn cmp_keys<K: Key>(a: &K, b: &K) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

#[test]
fn key_projection_is_monotone() {
    assert!(3_i32.to_f64() < 4_i32.to_f64());
    assert!((-1.5_f32).to_f64() < 0.25_f32.to_f64());
    assert!(u64::MAX.to_f64() >= (u64::MAX - 1).to_f64());
}
