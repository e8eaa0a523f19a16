//! Property-based tests using proptest
//!
//! These tests verify the compartment resolver, the page cap of the metric
//! search and the series naming rules using randomized inputs.

use oci_metrics_datasource::datasource::compartments::resolve_full_names;
use oci_metrics_datasource::datasource::pagination::{collect_pages, MAX_METRIC_PAGES};
use oci_metrics_datasource::datasource::series::series_name;
use oci_metrics_datasource::oci::http::Page;
use oci_metrics_datasource::oci::identity::Compartment;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

const TENANCY: &str = "ocid1.tenancy.oc1..root";

/// Generate an acyclic compartment tree: entry `i` hangs below the tenancy
/// or below an earlier entry. Each flag marks the entry active.
fn arb_tree() -> impl Strategy<Value = Vec<(Option<usize>, bool)>> {
    prop::collection::vec((any::<prop::sample::Index>(), any::<bool>(), any::<bool>()), 0..60)
        .prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (parent, under_root, active))| {
                    let parent = (!under_root && i > 0).then(|| parent.index(i));
                    (parent, active)
                })
                .collect()
        })
}

fn to_compartments(tree: &[(Option<usize>, bool)]) -> Vec<Compartment> {
    tree.iter()
        .enumerate()
        .map(|(i, (parent, active))| Compartment {
            id: format!("c{}", i),
            compartment_id: parent.map_or(TENANCY.to_string(), |p| format!("c{}", p)),
            name: format!("n{}", i),
            lifecycle_state: if *active { "ACTIVE" } else { "INACTIVE" }.to_string(),
        })
        .collect()
}

/// Ids whose whole parent chain is active
fn reachable(tree: &[(Option<usize>, bool)]) -> HashSet<String> {
    let mut ok = vec![false; tree.len()];
    for (i, (parent, active)) in tree.iter().enumerate() {
        ok[i] = *active && parent.map_or(true, |p| ok[p]);
    }
    ok.iter()
        .enumerate()
        .filter(|(_, ok)| **ok)
        .map(|(i, _)| format!("c{}", i))
        .collect()
}

proptest! {
    /// One full-path entry per reachable active compartment, plus the root
    #[test]
    fn resolver_covers_reachable_compartments(tree in arb_tree()) {
        let mut compartments = to_compartments(&tree);
        compartments.reverse();

        let names = resolve_full_names(TENANCY, "acme", &compartments);
        let expected = reachable(&tree);

        prop_assert_eq!(names.len(), expected.len() + 1);
        for (name, id) in &names {
            if id == TENANCY {
                prop_assert!(name.ends_with("(tenancy, shown as '/')"));
            } else {
                prop_assert!(name.starts_with('/'));
                prop_assert!(expected.contains(id));
                let suffix = format!("/n{}", &id[1..]);
                prop_assert!(name.ends_with(&suffix));
            }
        }
    }

    /// Child paths extend their parent's path
    #[test]
    fn resolver_child_extends_parent(tree in arb_tree()) {
        let compartments = to_compartments(&tree);
        let names = resolve_full_names(TENANCY, "acme", &compartments);
        let by_id: BTreeMap<&str, &str> =
            names.iter().map(|(name, id)| (id.as_str(), name.as_str())).collect();

        for c in &compartments {
            if let (Some(child), Some(parent)) =
                (by_id.get(c.id.as_str()), by_id.get(c.compartment_id.as_str()))
            {
                if c.compartment_id != TENANCY {
                    prop_assert_eq!(child.to_string(), format!("{}/{}", parent, c.name));
                }
            }
        }
    }

    /// N pages take N calls, endless cursors stop at the cap
    #[test]
    fn pagination_is_capped(pages in 1usize..45) {
        let calls = AtomicUsize::new(0);

        let items = tokio_test::block_on(collect_pages(Some(MAX_METRIC_PAGES), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                Ok(Page {
                    items: vec![n],
                    next_page: (n < pages).then(|| format!("p{}", n + 1)),
                })
            }
        }))
        .unwrap();

        let expected = pages.min(MAX_METRIC_PAGES);
        prop_assert_eq!(calls.load(Ordering::SeqCst), expected);
        prop_assert_eq!(items, (1..=expected).collect::<Vec<_>>());
    }

    /// Without a `*Name` dimension every value is listed in key order
    #[test]
    fn naming_falls_back_to_sorted_values(
        metric in "[A-Z][a-zA-Z]{0,20}",
        dims in prop::collection::btree_map("[a-z]{1,10}", "[a-zA-Z0-9.-]{0,12}", 0..6),
    ) {
        let name = series_name(&metric, &dims);
        let values: Vec<&str> = dims.values().map(String::as_str).collect();
        prop_assert_eq!(name, format!("{}, {{{}}}", metric, values.join(", ")));
    }

    /// A `*Name` dimension shows up as its own braced suffix
    #[test]
    fn naming_uses_display_name(
        prefix in "[a-z]{1,8}",
        value in "[a-z0-9-]{1,12}",
        other in "[a-z]{1,8}",
    ) {
        let dims = BTreeMap::from([
            (format!("{}Name", prefix), value.clone()),
            (other, "ignored".to_string()),
        ]);
        let name = series_name("Metric", &dims);
        prop_assert_eq!(name, format!("Metric, {{{}}}", value));
    }
}
