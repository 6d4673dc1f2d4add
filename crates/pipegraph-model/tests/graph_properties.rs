use pipegraph_model::{GraphError, NodeId, PipelineOutputs, ResourceGraph, ResourceKind, ResourceNode};
use proptest::prelude::*;
use serde_json::json;

const MAX_NODES: usize = 12;

/// Edge `i -> j` exists when `i < j` and `edges[j][i]` is set, so every input is acyclic
fn dag() -> impl Strategy<Value = Vec<Vec<bool>>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), MAX_NODES), 1..MAX_NODES)
}

fn id(index: usize) -> NodeId {
    NodeId::new(ResourceKind::Role, &format!("n{index}"))
}

fn nodes(edges: &[Vec<bool>]) -> Vec<ResourceNode> {
    edges
        .iter()
        .enumerate()
        .map(|(j, row)| {
            let node = ResourceNode::new(ResourceKind::Role, &format!("n{j}"), json!({ "index": j }));
            (0..j).filter(|&i| row[i]).fold(node, |node, i| node.depends_on(&id(i)))
        })
        .collect()
}

fn build(nodes: impl IntoIterator<Item = ResourceNode>) -> ResourceGraph {
    ResourceGraph::new(
        nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
        PipelineOutputs::default(),
    )
}

proptest! {
    #[test]
    fn prop_apply_order_respects_every_edge(edges in dag()) {
        let graph = build(nodes(&edges));
        let order = graph.apply_order().unwrap();
        prop_assert_eq!(order.len(), graph.len());

        let position = |target: &NodeId| order.iter().position(|id| *id == target).unwrap();
        for node in graph.nodes().values() {
            for dependency in &node.depends_on {
                prop_assert!(position(dependency) < position(&node.id));
            }
        }
    }

    #[test]
    fn prop_back_edge_is_a_cycle(edges in dag()) {
        let mut nodes = nodes(&edges);
        let last = nodes.len() - 1;
        prop_assume!(last > 0);
        // Chain every node to its predecessor, then close the loop.
        for j in 1..=last {
            nodes[j].depends_on.insert(id(j - 1));
        }
        nodes[0].depends_on.insert(id(last));

        let graph = build(nodes);
        let result = graph.apply_order();
        prop_assert!(matches!(result, Err(GraphError::CycleDetected(_))));
    }

    #[test]
    fn prop_fingerprint_ignores_insertion_order(edges in dag()) {
        let forward = build(nodes(&edges));
        let reverse = build(nodes(&edges).into_iter().rev());
        prop_assert_eq!(forward.fingerprint(), reverse.fingerprint());
    }

    #[test]
    fn prop_fingerprint_tracks_attributes(edges in dag(), pick in any::<prop::sample::Index>()) {
        let original = nodes(&edges);
        let mut changed = original.clone();
        let target = pick.index(changed.len());
        changed[target].attributes["index"] = json!("edited");

        prop_assert_ne!(build(original).fingerprint(), build(changed).fingerprint());
    }
}
