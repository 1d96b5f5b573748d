use learned_sort::{Key, Params};
use sort_test_tools::instantiate_sort_tests;
use sort_test_tools::Sort;

// Validates the test battery itself against the standard library sort.

struct SortImpl {}

impl Sort for SortImpl {
    fn name() -> String {
        "rust_std_unstable".into()
    }

    fn sort<K>(arr: &mut [K])
    where
        K: Key,
    {
        arr.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
    }

    fn sort_with<K>(arr: &mut [K], _params: &Params)
    where
        K: Key,
    {
        arr.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
    }
}

instantiate_sort_tests!(SortImpl);
