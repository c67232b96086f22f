//! §4.8 Refinement hierarchy: a DAG recording every historical split, mapping
//! concrete states to the current abstract state id in O(depth).
//!
//! Grounded on `original_source/src/search/cartesian_abstractions/refinement_hierarchy.cc`:
//! a split on `node` with `wanted = {v1..vk}` becomes a chain of `k` internal
//! nodes on the same variable, every "value matches" branch pointing at the
//! single new right-child leaf, the final "no match" branch at the new left
//! child. Reusing the obsolete node's `NodeId` for the first link in the chain
//! means every existing parent pointer into it stays valid.

use crate::ids::{AbstractStateId, NodeId};
use sas_collections::ref_store::{RefStore, RefMap};
use sas_task::ids::{Value, VarId};

enum Node {
    Leaf(AbstractStateId),
    Split {
        var: VarId,
        value: Value,
        /// taken when `state[var] == value`
        if_match: NodeId,
        /// taken otherwise
        if_no_match: NodeId,
    },
}

pub struct RefinementHierarchy {
    nodes: RefStore<NodeId, Node>,
    root: NodeId,
    leaf_of: RefMap<AbstractStateId, NodeId>,
}

impl RefinementHierarchy {
    pub fn new(root_state: AbstractStateId) -> Self {
        let mut nodes = RefStore::new();
        let root = nodes.push(Node::Leaf(root_state));
        let mut leaf_of = RefMap::default();
        leaf_of.insert(root_state, root);
        RefinementHierarchy { nodes, root, leaf_of }
    }

    /// Appends a fresh leaf for `state`, not connected to the tree (used only
    /// when constructing auxiliary/disconnected bookkeeping; `split` is the
    /// usual way new leaves enter the live hierarchy).
    pub fn add_node(&mut self, state: AbstractStateId) -> NodeId {
        let id = self.nodes.push(Node::Leaf(state));
        self.leaf_of.insert(state, id);
        id
    }

    /// Converts the leaf currently mapped to `obsolete` into a chain of
    /// `wanted.len()` split nodes on `var`. Every "match" branch in the chain
    /// goes to a single new leaf for `right_state`; the final "no match" branch
    /// goes to a new leaf for `left_state`.
    pub fn split(&mut self, obsolete: AbstractStateId, var: VarId, wanted: &[Value], left_state: AbstractStateId, right_state: AbstractStateId) {
        assert!(!wanted.is_empty(), "split requires a non-empty wanted set");
        let node_id = *self.leaf_of.get(obsolete).expect("split target must be a current leaf");
        self.leaf_of.remove(obsolete);

        let right_leaf = self.nodes.push(Node::Leaf(right_state));
        let left_leaf = self.nodes.push(Node::Leaf(left_state));
        self.leaf_of.insert(right_state, right_leaf);
        self.leaf_of.insert(left_state, left_leaf);

        // Build the chain back-to-front: the last link's "no match" points at
        // left_leaf; every other link's "no match" points at the next link.
        let mut next_no_match = left_leaf;
        // Reserve fresh NodeIds for all but the first link (the first reuses
        // `node_id` itself), then wire them back-to-front.
        let mut chain_ids: Vec<NodeId> = Vec::with_capacity(wanted.len());
        chain_ids.push(node_id);
        for _ in 1..wanted.len() {
            // placeholder leaf, immediately overwritten below; value doesn't
            // matter since every node is fully rewritten before being reachable.
            chain_ids.push(self.nodes.push(Node::Leaf(right_state)));
        }
        for i in (0..wanted.len()).rev() {
            let this_id = chain_ids[i];
            self.nodes[this_id] = Node::Split {
                var,
                value: wanted[i],
                if_match: right_leaf,
                if_no_match: next_no_match,
            };
            next_no_match = this_id;
        }
    }

    pub fn lookup(&self, state: &[Value]) -> AbstractStateId {
        let mut current = self.root;
        loop {
            match &self.nodes[current] {
                Node::Leaf(id) => return *id,
                Node::Split { var, value, if_match, if_no_match } => {
                    current = if state[usize::from(*var)] == *value { *if_match } else { *if_no_match };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_before_any_split_is_the_root_state() {
        let root = AbstractStateId::from(0usize);
        let h = RefinementHierarchy::new(root);
        assert_eq!(h.lookup(&[0, 1]), root);
        assert_eq!(h.lookup(&[5, 9]), root);
    }

    #[test]
    fn single_value_split_routes_by_equality() {
        let root = AbstractStateId::from(0usize);
        let mut h = RefinementHierarchy::new(root);
        let left = AbstractStateId::from(1usize);
        let right = AbstractStateId::from(2usize);
        h.split(root, VarId::from(0usize), &[1], left, right);
        assert_eq!(h.lookup(&[1, 0]), right);
        assert_eq!(h.lookup(&[0, 0]), left);
        assert_eq!(h.lookup(&[2, 0]), left);
    }

    #[test]
    fn chained_wanted_split_all_matches_go_to_right() {
        let root = AbstractStateId::from(0usize);
        let mut h = RefinementHierarchy::new(root);
        let left = AbstractStateId::from(1usize);
        let right = AbstractStateId::from(2usize);
        h.split(root, VarId::from(0usize), &[1, 2, 3], left, right);
        assert_eq!(h.lookup(&[1, 0]), right);
        assert_eq!(h.lookup(&[2, 0]), right);
        assert_eq!(h.lookup(&[3, 0]), right);
        assert_eq!(h.lookup(&[0, 0]), left);
        assert_eq!(h.lookup(&[9, 0]), left);
    }

    #[test]
    fn splitting_the_new_left_child_keeps_right_branch_intact() {
        let root = AbstractStateId::from(0usize);
        let mut h = RefinementHierarchy::new(root);
        let left = AbstractStateId::from(1usize);
        let right = AbstractStateId::from(2usize);
        h.split(root, VarId::from(0usize), &[1], left, right);

        let left2 = AbstractStateId::from(3usize);
        let right2 = AbstractStateId::from(4usize);
        h.split(left, VarId::from(1usize), &[5], left2, right2);

        assert_eq!(h.lookup(&[1, 0]), right, "var0=1 branch is untouched by the second split");
        assert_eq!(h.lookup(&[0, 5]), right2);
        assert_eq!(h.lookup(&[0, 0]), left2);
    }
}
