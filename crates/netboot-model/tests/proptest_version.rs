// SPDX-License-Identifier: Apache-2.0

use netboot_model::{compare_versions, is_semver};
use proptest::prelude::*;
use proptest::test_runner::Config;
use std::cmp::Ordering;

fn version_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (0_u32..30, 0_u32..30, 0_u32..30).prop_map(|(a, b, c)| format!("{a}.{b}.{c}")),
        (0_u32..30, 0_u32..30).prop_map(|(a, b)| format!("v{a}.{b}")),
        (0_u32..5, 0_u32..5, "[a-z]{1,4}", 0_u32..5)
            .prop_map(|(a, b, pre, n)| format!("{a}.{b}.0-{pre}.{n}")),
        "[a-z0-9\\.]{1,8}",
    ]
}

proptest! {
    #![proptest_config(Config::with_cases(256))]
    #[test]
    fn comparison_is_antisymmetric(a in version_strategy(), b in version_strategy()) {
        prop_assert_eq!(compare_versions(&a, &b), compare_versions(&b, &a).reverse());
    }

    #[test]
    fn comparison_is_equal_only_for_identical_strings(a in version_strategy(), b in version_strategy()) {
        prop_assert_eq!(compare_versions(&a, &b) == Ordering::Equal, a == b);
    }

    #[test]
    fn comparison_is_transitive(
        a in version_strategy(),
        b in version_strategy(),
        c in version_strategy()
    ) {
        let mut v = vec![a, b, c];
        v.sort_by(|x, y| compare_versions(x, y));
        prop_assert_ne!(compare_versions(&v[0], &v[1]), Ordering::Greater);
        prop_assert_ne!(compare_versions(&v[1], &v[2]), Ordering::Greater);
        prop_assert_ne!(compare_versions(&v[0], &v[2]), Ordering::Greater);
    }

    #[test]
    fn plain_triples_order_numerically(
        a in (0_u32..50, 0_u32..50, 0_u32..50),
        b in (0_u32..50, 0_u32..50, 0_u32..50)
    ) {
        let va = format!("{}.{}.{}", a.0, a.1, a.2);
        let vb = format!("{}.{}.{}", b.0, b.1, b.2);
        prop_assert!(is_semver(&va));
        prop_assert_eq!(compare_versions(&va, &vb), a.cmp(&b));
    }
}
