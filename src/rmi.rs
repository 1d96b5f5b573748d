//! Two-layer recursive model index (RMI) approximating the empirical CDF of
//! the input keys.
//!
//! The root layer is a single linear segment that routes a key to one of the
//! leaf segments; each leaf is a linear segment predicting the CDF value in
//! `[0, 1]`. Both layers are trained with linear spline interpolation over a
//! sorted stride-sample of the input.

use log::warn;

use crate::Key;

/// A single linear segment, `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    #[inline]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Hyperparameters of the CDF model and the placement engine.
///
/// Invalid field values never cause an error. They are repaired to the
/// documented defaults when training starts, and each repair is reported
/// through the [`log`] facade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Fraction of the input used as the training sample, `0 < r <= 1`.
    pub sampling_rate: f32,
    /// Minor bucket over-allocation factor, must exceed 1.
    pub overallocation_ratio: f32,
    /// Number of major buckets.
    pub fanout: u32,
    /// Block size used while scattering keys into minor buckets.
    pub batch_size: u32,
    /// Minor bucket capacity.
    pub threshold: u32,
    /// Model architecture, `[1, L]` with `L >= 2` leaf segments.
    pub arch: [u32; 2],
}

impl Params {
    pub const DEFAULT_SAMPLING_RATE: f32 = 0.01;
    pub const DEFAULT_OVERALLOCATION_RATIO: f32 = 1.1;
    pub const DEFAULT_FANOUT: u32 = 1_000;
    pub const DEFAULT_BATCH_SIZE: u32 = 10;
    pub const DEFAULT_THRESHOLD: u32 = 100;
    pub const DEFAULT_ARCH: [u32; 2] = [1, 1_000];

    /// Lower bound on the training sample size.
    pub const MIN_SORTING_SIZE: usize = 10_000;

    /// Returns a copy with every out-of-range field replaced by its default.
    ///
    /// The checks are relative to the input size, matching the constraints the
    /// placement engine relies on (`fanout < n`, `threshold < n / fanout`).
    pub(crate) fn validated(mut self, input_sz: usize) -> Params {
        if self.batch_size == 0 || self.batch_size as usize >= input_sz {
            self.batch_size = Self::DEFAULT_BATCH_SIZE;
            warn!(
                "invalid batch size, using default ({})",
                Self::DEFAULT_BATCH_SIZE
            );
        }

        if self.fanout == 0 || self.fanout as usize >= input_sz {
            self.fanout = Self::DEFAULT_FANOUT;
            warn!("invalid fanout, using default ({})", Self::DEFAULT_FANOUT);
        }

        if self.overallocation_ratio <= 1.0 {
            self.overallocation_ratio = Self::DEFAULT_OVERALLOCATION_RATIO;
            warn!(
                "invalid overallocation ratio, using default ({})",
                Self::DEFAULT_OVERALLOCATION_RATIO
            );
        }

        if self.sampling_rate <= 0.0 || self.sampling_rate > 1.0 {
            self.sampling_rate = Self::DEFAULT_SAMPLING_RATE;
            warn!(
                "invalid sampling rate, using default ({})",
                Self::DEFAULT_SAMPLING_RATE
            );
        }

        if self.threshold == 0
            || self.threshold as usize >= input_sz
            || self.threshold as usize >= input_sz / self.fanout as usize
        {
            self.threshold = Self::DEFAULT_THRESHOLD;
            warn!(
                "invalid threshold, using default ({})",
                Self::DEFAULT_THRESHOLD
            );
        }

        if self.arch[0] != 1 || self.arch[1] < 2 {
            self.arch = Self::DEFAULT_ARCH;
            warn!(
                "invalid architecture, using default ({:?})",
                Self::DEFAULT_ARCH
            );
        }

        self
    }
}

impl Default for Params {
    fn default() -> Self {
        Params {
            sampling_rate: Self::DEFAULT_SAMPLING_RATE,
            overallocation_ratio: Self::DEFAULT_OVERALLOCATION_RATIO,
            fanout: Self::DEFAULT_FANOUT,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            threshold: Self::DEFAULT_THRESHOLD,
            arch: Self::DEFAULT_ARCH,
        }
    }
}

/// Result of [`train`]. The placement engine only ever consumes the
/// [`Rmi::Trained`] payload, so an untrained model cannot be used by mistake;
/// the entry points dispatch to the fallback sort instead.
pub enum Rmi<K> {
    /// The sample had fewer than `2 * L` distinct values; no CDF can be
    /// learned from it.
    Untrained,
    Trained(CdfModel<K>),
}

/// A trained two-layer CDF model plus the sorted sample it was trained on.
pub struct CdfModel<K> {
    root: LinearModel,
    leaves: Vec<LinearModel>,
    training_sample: Vec<K>,
    params: Params,
}

impl<K: Key> CdfModel<K> {
    /// Index of the leaf segment responsible for `x`.
    #[inline]
    pub(crate) fn leaf_index(&self, x: f64) -> usize {
        self.root
            .predict(x)
            .clamp(0.0, (self.leaves.len() - 1) as f64) as usize
    }

    /// Predicted CDF of `key`, clamped to `[0, 1]`.
    #[inline]
    pub fn predict(&self, key: K) -> f64 {
        let x = key.to_f64();
        self.leaves[self.leaf_index(x)].predict(x).clamp(0.0, 1.0)
    }

    pub fn root(&self) -> LinearModel {
        self.root
    }

    pub fn leaves(&self) -> &[LinearModel] {
        &self.leaves
    }

    pub fn training_sample(&self) -> &[K] {
        &self.training_sample
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// A training point: key projected to `f64` and its scaled rank in the
/// sorted sample.
#[derive(Debug, Clone, Copy, Default)]
struct TrainingPoint {
    x: f64,
    y: f64,
}

/// Per-leaf training bucket summary. The sorted sample is routed through the
/// root in ascending order, so each leaf sees a contiguous run of points and
/// spline interpolation only ever consumes a bucket's endpoints.
#[derive(Clone, Copy, Default)]
struct LeafBucket {
    count: usize,
    first: TrainingPoint,
    last: TrainingPoint,
}

/// Trains a CDF model over `v` using linear spline interpolation.
///
/// Draws a stride-sample of at least [`Params::MIN_SORTING_SIZE`] keys, sorts
/// it, and fits the root plus `arch[1]` leaf segments. Returns
/// [`Rmi::Untrained`] when the sample contains fewer than `2 * arch[1]`
/// distinct values, which the callers answer with a fallback comparison sort.
pub fn train<K: Key>(v: &[K], params: &Params) -> Rmi<K> {
    let input_sz = v.len();
    if input_sz == 0 {
        return Rmi::Untrained;
    }

    let p = params.validated(input_sz);
    let num_leaves = p.arch[1] as usize;

    // Sample at a regular stride and sort. The stride is rounded down, so the
    // sample may end up slightly larger than the requested size.
    let sample_sz = input_sz.min(
        ((p.sampling_rate as f64 * input_sz as f64) as usize).max(Params::MIN_SORTING_SIZE),
    );
    let step = (input_sz / sample_sz).max(1);
    let mut training_sample: Vec<K> = v.iter().copied().step_by(step).collect();
    training_sample.sort_by(crate::cmp_keys);

    let sample_len = training_sample.len();
    let num_distinct = 1 + training_sample
        .windows(2)
        .filter(|w| w[0] != w[1])
        .count();

    // At least two training points per leaf segment are needed.
    if num_distinct < 2 * num_leaves {
        return Rmi::Untrained;
    }

    // Root: interpolate min -> 0, max -> 1, then rescale the output to a leaf
    // index in [0, L - 1].
    let min_x = training_sample[0].to_f64();
    let max_x = training_sample[sample_len - 1].to_f64();
    let scale = (num_leaves - 1) as f64;
    let slope = 1.0 / (max_x - min_x) * scale;
    let root = LinearModel {
        slope,
        intercept: -slope * min_x,
    };

    // Route every sample point through the root. Routing is monotone in the
    // key, so tracking each bucket's endpoints is enough for interpolation.
    let mut buckets = vec![LeafBucket::default(); num_leaves];
    for (i, key) in training_sample.iter().enumerate() {
        let point = TrainingPoint {
            x: key.to_f64(),
            y: i as f64 / sample_len as f64,
        };
        let rank = root.predict(point.x).clamp(0.0, scale) as usize;

        let bucket = &mut buckets[rank];
        if bucket.count == 0 {
            bucket.first = point;
        }
        bucket.last = point;
        bucket.count += 1;
    }

    // Fit the leaf segments. Empty buckets are repaired so that predictions
    // stay monotone and constant across runs of empty leaves: `prev_last`
    // carries the trailing training point of the previous leaf, including the
    // synthetic points inserted by the repair cases.
    let mut leaves = vec![LinearModel::default(); num_leaves];
    let mut prev_last = TrainingPoint::default();

    for (j, bucket) in buckets.iter().enumerate() {
        let model = &mut leaves[j];

        if j == 0 {
            if bucket.count < 2 {
                // Too few points to interpolate; anchor the spline at (0, 0).
                *model = LinearModel {
                    slope: 0.0,
                    intercept: 0.0,
                };
                prev_last = TrainingPoint { x: 0.0, y: 0.0 };
            } else {
                let (min, max) = (bucket.first, bucket.last);
                model.slope = max.y / (max.x - min.x);
                model.intercept = min.y - model.slope * min.x;
                prev_last = max;
            }
        } else if j == num_leaves - 1 {
            if bucket.count == 0 {
                *model = LinearModel {
                    slope: 0.0,
                    intercept: 1.0,
                };
            } else {
                // Anchor at the previous leaf's trailing point and pin the
                // bucket maximum to CDF 1.
                let (min, max) = (prev_last, bucket.last);
                model.slope = (1.0 - min.y) / (max.x - min.x);
                model.intercept = min.y - model.slope * min.x;
            }
        } else if bucket.count == 0 {
            // Keep predicting the previous leaf's trailing CDF value.
            model.slope = 0.0;
            model.intercept = prev_last.y;
        } else {
            let (min, max) = (prev_last, bucket.last);
            model.slope = (max.y - min.y) / (max.x - min.x);
            model.intercept = min.y - model.slope * min.x;
            prev_last = max;
        }
    }

    Rmi::Trained(CdfModel {
        root,
        leaves,
        training_sample,
        params: p,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_input(len: usize) -> Vec<f64> {
        // Deterministic low-discrepancy sequence, plenty of distinct values.
        (0..len).map(|i| (i as f64 * 0.61803398875).fract()).collect()
    }

    #[test]
    fn params_default_are_valid() {
        let p = Params::default().validated(1_000_000);
        assert_eq!(p, Params::default());
    }

    #[test]
    fn params_repair_to_defaults() {
        let broken = Params {
            sampling_rate: -0.5,
            overallocation_ratio: 0.9,
            fanout: 0,
            batch_size: 0,
            threshold: 0,
            arch: [2, 0],
        };
        let p = broken.validated(1_000_000);
        assert_eq!(p, Params::default());
    }

    #[test]
    fn params_threshold_checked_against_repaired_fanout() {
        let p = Params {
            fanout: 0,
            threshold: 5_000,
            ..Params::default()
        }
        .validated(1_000_000);
        assert_eq!(p.fanout, Params::DEFAULT_FANOUT);
        // 5_000 >= 1_000_000 / 1_000, so the threshold is repaired too.
        assert_eq!(p.threshold, Params::DEFAULT_THRESHOLD);
    }

    #[test]
    fn train_empty_is_untrained() {
        let rmi = train::<f64>(&[], &Params::default());
        assert!(matches!(rmi, Rmi::Untrained));
    }

    #[test]
    fn train_all_equal_is_untrained() {
        let v = vec![42.0f64; 50_000];
        let rmi = train(&v, &Params::default());
        assert!(matches!(rmi, Rmi::Untrained));
    }

    #[test]
    fn train_few_distinct_is_untrained() {
        // 16 distinct values < 2 * L for any L >= 8.
        let v: Vec<f64> = (0..50_000).map(|i| (i % 16) as f64).collect();
        let params = Params {
            arch: [1, 100],
            ..Params::default()
        };
        let rmi = train(&v, &params);
        assert!(matches!(rmi, Rmi::Untrained));
    }

    #[test]
    fn predictions_in_unit_interval() {
        let v = uniform_input(50_000);
        let rmi = train(&v, &Params::default());
        let model = match rmi {
            Rmi::Trained(model) => model,
            Rmi::Untrained => panic!("expected a trained model"),
        };

        for &key in &v {
            let cdf = model.predict(key);
            assert!((0.0..=1.0).contains(&cdf), "cdf {cdf} for key {key}");
        }
    }

    #[test]
    fn root_is_finite_and_leaves_monotone() {
        let v = uniform_input(50_000);
        let params = Params {
            arch: [1, 64],
            ..Params::default()
        };
        let model = match train(&v, &params) {
            Rmi::Trained(model) => model,
            Rmi::Untrained => panic!("expected a trained model"),
        };

        assert!(model.root().slope.is_finite());
        assert!(model.root().intercept.is_finite());

        // Trailing prediction per leaf, evaluated at the leaf boundary keys of
        // the sample, must not decrease.
        let sample = model.training_sample();
        let mut prev_cdf = 0.0;
        for &key in sample {
            let cdf = model.predict(key);
            assert!(
                cdf >= prev_cdf - 1e-9,
                "cdf regressed: {prev_cdf} -> {cdf} at key {key}"
            );
            prev_cdf = cdf;
        }
    }

    #[test]
    fn sample_is_sorted_and_retained() {
        let v = uniform_input(30_000);
        let model = match train(&v, &Params::default()) {
            Rmi::Trained(model) => model,
            Rmi::Untrained => panic!("expected a trained model"),
        };
        let sample = model.training_sample();
        assert!(sample.len() >= Params::MIN_SORTING_SIZE.min(v.len()));
        assert!(sample.windows(2).all(|w| w[0] <= w[1]));
    }
}
