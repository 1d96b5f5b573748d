#![no_main]

use libfuzzer_sys::fuzz_target;

use learned_sort::Params;

fuzz_target!(|data: &[u8]| {
    let mut v: Vec<u32> = data
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();

    let mut expected = v.clone();
    expected.sort_unstable();

    // Small hyperparameters so fuzz-sized inputs reach the trained engine.
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
