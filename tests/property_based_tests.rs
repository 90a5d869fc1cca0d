use proptest::prelude::*;
use std::collections::HashMap;

use flowsync_core::definitions::content_checksum;
use flowsync_core::orchestration::{DependencyGraphAnalyzer, DependencyNode};

/// Random DAG: node `i` may only depend on nodes with a smaller index
fn dag_strategy() -> impl Strategy<Value = Vec<DependencyNode>> {
    (1usize..12)
        .prop_flat_map(|n| {
            let edges = proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n);
            (Just(n), edges)
        })
        .prop_map(|(n, edges)| {
            (0..n)
                .map(|i| {
                    let deps = (0..i)
                        .filter(|j| edges[i][*j])
                        .map(|j| format!("n{j}"))
                        .collect();
                    DependencyNode::new(format!("n{i}"), deps)
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

proptest! {
    /// Property: the checksum is a pure function of the bytes
    #[test]
    fn checksum_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(content_checksum(&bytes), content_checksum(&bytes.clone()));
    }

    /// Property: different content yields a different checksum
    #[test]
    fn checksum_changes_with_content(
        a in proptest::collection::vec(any::<u8>(), 0..256),
        b in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(content_checksum(&a), content_checksum(&b));
    }

    /// Property: in an acyclic graph every dependency precedes its dependents
    #[test]
    fn topological_order_respects_dependencies(nodes in dag_strategy()) {
        let analysis = DependencyGraphAnalyzer::new().analyze(&nodes);
        prop_assert!(!analysis.has_cycle);
        prop_assert_eq!(analysis.order.len(), nodes.len());

        let position: HashMap<&str, usize> = analysis
            .order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        for node in &nodes {
            for dep in &node.dependencies {
                prop_assert!(
                    position[dep.as_str()] < position[node.name.as_str()],
                    "{} must come before {}", dep, node.name
                );
            }
        }
    }

    /// Property: a ring of any size is reported with every participant
    #[test]
    fn rings_are_always_cycles(size in 1usize..10) {
        let nodes: Vec<DependencyNode> = (0..size)
            .map(|i| DependencyNode::new(format!("r{i}"), vec![format!("r{}", (i + 1) % size)]))
            .collect();
        let analysis = DependencyGraphAnalyzer::new().analyze(&nodes);

        prop_assert!(analysis.has_cycle);
        prop_assert_eq!(analysis.cycles.len(), 1);
        prop_assert_eq!(analysis.cycles[0].len(), size);
    }
}
