#![no_main]

use libfuzzer_sys::fuzz_target;

use learned_sort::Params;

fuzz_target!(|data: &[u8]| {
    // NaN is outside the Key contract.
    let mut v: Vec<f64> = data
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
        .filter(|x| !x.is_nan())
        .collect();

    let mut expected = v.clone();
    expected.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());

    let params = Params {
        sampling_rate: 1.0,
        fanout: 8,
        threshold: 10,
        arch: [1, 4],
        ..Params::default()
    };
    learned_sort::sort_with(&mut v, &params);

    assert_eq!(v, expected);
});
