//! Model-guided placement engine.
//!
//! Consumes a trained CDF model and sorts the input in place: keys are
//! scattered into major buckets by predicted CDF, each major bucket is
//! subdivided into minor buckets, and each minor bucket is finished with a
//! model-based counting sort plus an insertion-sort touch-up. Keys that would
//! overflow a bucket go to a spill area, keys that repeat heavily in the
//! training sample bypass bucketization entirely; both are merged back at the
//! end.

use crate::cmp_keys;
use crate::rmi::CdfModel;
use crate::Key;

/// Sorts `v` in place using the trained model.
///
/// Requires `v.len() > fanout * threshold` (the entry facade dispatches
/// smaller inputs to the fallback sort before training).
pub(crate) fn sort_trained<K: Key>(v: &mut [K], rmi: &CdfModel<K>) {
    let input_sz = v.len();
    let params = rmi.params();

    let batch_sz = params.batch_size as usize;
    let fanout = params.fanout as usize;
    let threshold = params.threshold as usize;
    let oa_ratio = params.overallocation_ratio as f64;
    let num_models = params.arch[1] as usize;

    let major_capacity = input_sz / fanout;

    let root = rmi.root();
    let leaves = rmi.leaves();

    let predict_leaf = |x: f64| -> usize {
        root.predict(x).clamp(0.0, (num_models - 1) as f64) as usize
    };
    let predict_cdf = |x: f64| -> f64 { leaves[predict_leaf(x)].predict(x) };

    // --- Repeated-key detection ------------------------------------------

    // A key whose run in the sorted sample is longer than one leaf's share of
    // points would overwhelm its predicted bucket; such keys are counted
    // instead of placed and merged back at the very end.
    let sample = rmi.training_sample();
    let rep_count_threshold = sample.len() / num_models;

    let mut rep_keys: Vec<(K, usize)> = Vec::new();
    let mut run_len = 1;
    for i in 1..sample.len() {
        if sample[i] == sample[i - 1] {
            run_len += 1;
        } else {
            if run_len > rep_count_threshold {
                rep_keys.push((sample[i - 1], 0));
            }
            run_len = 1;
        }
    }
    if run_len > rep_count_threshold {
        rep_keys.push((sample[sample.len() - 1], 0));
    }

    // --- Major bucketization ---------------------------------------------

    let mut major: Vec<K> = vec![v[0]; input_sz + 1];
    let mut major_sizes = vec![0usize; fanout];
    let mut spill: Vec<K> = Vec::new();
    let mut num_rep_keys = 0;

    if rep_keys.is_empty() {
        for &key in v.iter() {
            let cdf = predict_cdf(key.to_f64());
            let b = (cdf * fanout as f64).clamp(0.0, (fanout - 1) as f64) as usize;

            if major_sizes[b] < major_capacity {
                major[major_capacity * b + major_sizes[b]] = key;
                major_sizes[b] += 1;
            } else {
                spill.push(key);
            }
        }
    } else {
        for &key in v.iter() {
            if let Ok(idx) = rep_keys.binary_search_by(|probe| cmp_keys(&probe.0, &key)) {
                rep_keys[idx].1 += 1;
                num_rep_keys += 1;
                continue;
            }

            let cdf = predict_cdf(key.to_f64());
            let b = (cdf * fanout as f64).clamp(0.0, (fanout - 1) as f64) as usize;

            if major_sizes[b] < major_capacity {
                major[major_capacity * b + major_sizes[b]] = key;
                major_sizes[b] += 1;
            } else {
                spill.push(key);
            }
        }
    }

    // --- Minor bucketization and model-based counting sort ----------------

    let num_minor = ((major_capacity as f64 * oa_ratio / threshold as f64) as usize).max(1);
    let tot_minor = num_minor * fanout;

    let mut minor: Vec<K> = vec![v[0]; num_minor * threshold];
    let mut minor_sizes = vec![0usize; num_minor];
    let mut batch_cache = vec![0usize; batch_sz];
    let mut pred_cache = vec![0usize; threshold];

    // Number of keys already written to the sorted prefix of `major`.
    let mut num_placed = 0;

    for major_idx in 0..fanout {
        let mut start = major_idx * major_capacity;
        minor_sizes.fill(0);

        let minor_index = |cdf: f64| -> usize {
            (cdf * tot_minor as f64 - (major_idx * num_minor) as f64)
                .clamp(0.0, (num_minor - 1) as f64) as usize
        };

        // Predict-then-place in blocks of `batch_sz`, then once more for the
        // tail that did not fill a whole block.
        let num_batches = major_sizes[major_idx] / batch_sz;
        let tail_len = major_sizes[major_idx] - num_batches * batch_sz;

        for batch_len in std::iter::repeat(batch_sz)
            .take(num_batches)
            .chain(std::iter::once(tail_len))
        {
            for elm_idx in 0..batch_len {
                let cdf = predict_cdf(major[start + elm_idx].to_f64());
                batch_cache[elm_idx] = minor_index(cdf);
            }

            for elm_idx in 0..batch_len {
                let key = major[start + elm_idx];
                let mi = batch_cache[elm_idx];

                if minor_sizes[mi] < threshold {
                    minor[threshold * mi + minor_sizes[mi]] = key;
                    minor_sizes[mi] += 1;
                } else {
                    spill.push(key);
                }
            }

            start += batch_len;
        }

        for mi in 0..num_minor {
            let bucket_len = minor_sizes[mi];
            if bucket_len == 0 {
                continue;
            }

            let bucket = &minor[mi * threshold..mi * threshold + bucket_len];
            let base = (major_idx * num_minor + mi) * input_sz / tot_minor;

            let mut hist = vec![0usize; threshold];

            // If the whole bucket routes to one leaf, skip the root layer and
            // evaluate that leaf directly.
            let first_leaf = predict_leaf(bucket[0].to_f64());
            let last_leaf = predict_leaf(bucket[bucket_len - 1].to_f64());

            if first_leaf == last_leaf {
                let leaf = leaves[first_leaf];
                for (elm_idx, key) in bucket.iter().enumerate() {
                    let pos = (leaf.predict(key.to_f64()) * input_sz as f64 - base as f64)
                        .clamp(0.0, (threshold - 1) as f64) as usize;
                    pred_cache[elm_idx] = pos;
                    hist[pos] += 1;
                }
            } else {
                for (elm_idx, key) in bucket.iter().enumerate() {
                    let pos = (predict_cdf(key.to_f64()) * input_sz as f64 - base as f64)
                        .clamp(0.0, (threshold - 1) as f64) as usize;
                    pred_cache[elm_idx] = pos;
                    hist[pos] += 1;
                }
            }

            // Running totals shifted down by one turn each slot into the last
            // write index of its class. The wrap on an empty class 0 is
            // cancelled by the additions; wrapped values are never indexed.
            hist[0] = hist[0].wrapping_sub(1);
            for i in 1..threshold {
                hist[i] = hist[i].wrapping_add(hist[i - 1]);
            }

            // Scatter in reverse of the cached predictions, post-decrementing
            // each class index.
            for elm_idx in (0..bucket_len).rev() {
                let pos = pred_cache[elm_idx];
                major[num_placed + hist[pos]] = minor[mi * threshold + elm_idx];
                hist[pos] = hist[pos].wrapping_sub(1);
            }

            // Touch-up: the scatter can misplace keys by up to the bucket
            // width, and a key may belong before the already-placed prefix.
            insertion_sort_suffix(&mut major[..num_placed + bucket_len], num_placed);

            num_placed += bucket_len;
        }
    }

    debug_assert_eq!(num_placed + spill.len() + num_rep_keys, input_sz);

    // --- Spill and final merges ------------------------------------------

    spill.sort_by(cmp_keys);

    // The leading `num_rep_keys` slots are reserved for the repeated-key
    // sweep below.
    merge_into(&major[..num_placed], &spill, &mut v[num_rep_keys..]);

    if rep_keys.is_empty() {
        return;
    }

    // Left-to-right sweep interleaving the merged region with the repeated
    // keys, splatting each repeated key `count` times. The write index never
    // passes the read index, so nothing unread is overwritten.
    let mut input_idx = num_rep_keys;
    let mut write_idx = 0;
    let mut rep_idx = 0;

    while input_idx < input_sz && rep_idx < rep_keys.len() {
        let (rep_key, rep_count) = rep_keys[rep_idx];
        if v[input_idx] < rep_key {
            v[write_idx] = v[input_idx];
            write_idx += 1;
            input_idx += 1;
        } else {
            for i in 0..rep_count {
                v[write_idx + i] = rep_key;
            }
            write_idx += rep_count;
            rep_idx += 1;
        }
    }

    while rep_idx < rep_keys.len() {
        let (rep_key, rep_count) = rep_keys[rep_idx];
        for i in 0..rep_count {
            v[write_idx + i] = rep_key;
        }
        write_idx += rep_count;
        rep_idx += 1;
    }

    while input_idx < input_sz {
        v[write_idx] = v[input_idx];
        write_idx += 1;
        input_idx += 1;
    }
}

/// Insertion-sorts `v[offset..]` into the already sorted prefix `v[..offset]`.
/// Keys shift left as far as they compare, across the prefix boundary.
fn insertion_sort_suffix<K: Key>(v: &mut [K], offset: usize) {
    for i in offset..v.len() {
        let key = v[i];
        let mut j = i;
        while j > 0 && key < v[j - 1] {
            v[j] = v[j - 1];
            j -= 1;
        }
        v[j] = key;
    }
}

/// Merges two sorted slices into `out`, which must hold exactly both.
fn merge_into<K: Key>(a: &[K], b: &[K], out: &mut [K]) {
    debug_assert_eq!(a.len() + b.len(), out.len());

    let mut i = 0;
    let mut j = 0;
    for slot in out.iter_mut() {
        if i < a.len() && (j >= b.len() || a[i] <= b[j]) {
            *slot = a[i];
            i += 1;
        } else {
            *slot = b[j];
            j += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rmi::{train, Params, Rmi};

    #[test]
    fn insertion_sort_suffix_crosses_offset() {
        let mut v = [1, 3, 5, 7, 0, 6, 2];
        insertion_sort_suffix(&mut v, 4);
        assert_eq!(v, [0, 1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn merge_into_interleaves() {
        let a = [1, 4, 6];
        let b = [2, 3, 5, 7];
        let mut out = [0; 7];
        merge_into(&a, &b, &mut out);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn merge_into_empty_sides() {
        let mut out = [0; 3];
        merge_into(&[], &[4, 5, 6], &mut out);
        assert_eq!(out, [4, 5, 6]);
        merge_into(&[4, 5, 6], &[], &mut out);
        assert_eq!(out, [4, 5, 6]);
    }

    #[test]
    fn sort_trained_places_every_key() {
        let mut v: Vec<f64> = (0..40_000)
            .map(|i| ((i * 2_654_435_761u64 % 40_000) as f64) * 0.25)
            .collect();
        let mut expected = v.clone();
        expected.sort_by(cmp_keys);

        let params = Params {
            fanout: 20,
            threshold: 50,
            arch: [1, 16],
            sampling_rate: 0.25,
            ..Params::default()
        };
        let model = match train(&v, &params) {
            Rmi::Trained(model) => model,
            Rmi::Untrained => panic!("expected a trained model"),
        };
        sort_trained(&mut v, &model);

        assert_eq!(v, expected);
    }

    #[test]
    fn sort_trained_handles_heavy_duplicates() {
        // i mod 16 plus enough distinct noise for the model to train; the
        // mod-16 values trip the repeated-key path.
        let len = 60_000;
        let mut v: Vec<f64> = (0..len)
            .map(|i| {
                if i % 3 == 0 {
                    (((i as i64 * 48_271) % 104_729) as f64) + 100.0
                } else {
                    (i % 16) as f64
                }
            })
            .collect();
        let mut expected = v.clone();
        expected.sort_by(cmp_keys);

        // The stride-2 sample keeps the 8 even residues, 2500 copies each,
        // well above the sample_len / L = 1000 repeat threshold.
        let params = Params {
            fanout: 25,
            threshold: 60,
            arch: [1, 30],
            sampling_rate: 0.5,
            ..Params::default()
        };
        let model = match train(&v, &params) {
            Rmi::Trained(model) => model,
            Rmi::Untrained => panic!("expected a trained model"),
        };
        sort_trained(&mut v, &model);

        assert_eq!(v, expected);
    }
}
