//! Decision tree structures for GBDT inference
//!
//! Every node, internal or leaf, carries the (shrunken) value the trainer
//! would have predicted had it stopped splitting there. Leaves use it as
//! the tree output; internal nodes use it for path attribution.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into feature vector
/// - `left` and `right` point to child node indices
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `value` is the prediction contributed by this tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Split threshold; rows with `x <= threshold` go left
    pub threshold: f64,

    /// Node output in margin space
    pub value: f64,

    /// Hessian mass of the training rows that reached this node
    pub cover: f64,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(
        id: i32,
        feature_idx: i32,
        threshold: f64,
        left: i32,
        right: i32,
        value: f64,
        cover: f64,
    ) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            value,
            cover,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64, cover: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            value,
            cover,
        }
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx < 0
    }
}

/// A single regression tree of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Indices of the nodes visited for a feature vector, root to leaf.
    ///
    /// Assumes a validated tree and a vector long enough for every split.
    fn decision_path(&self, features: &[f64]) -> Vec<usize> {
        let mut path = Vec::new();
        let mut idx = 0usize;
        while let Some(node) = self.nodes.get(idx) {
            path.push(idx);
            if node.is_leaf() {
                break;
            }
            let feature_value = features
                .get(node.feature_idx as usize)
                .copied()
                .unwrap_or(0.0);
            idx = if feature_value <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
        path
    }

    /// Evaluate this tree on a feature vector
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        self.decision_path(features)
            .last()
            .map(|&idx| self.nodes[idx].value)
            .unwrap_or(0.0)
    }

    /// Attribute this tree's output along the decision path.
    ///
    /// Each split credits the change in node value to the feature it
    /// tested. Returns the root value; root value plus the credited amounts
    /// equals `evaluate(features)`.
    pub fn path_contributions(&self, features: &[f64], out: &mut [f64]) -> f64 {
        let path = self.decision_path(features);
        let Some(&root) = path.first() else {
            return 0.0;
        };
        for pair in path.windows(2) {
            let parent = &self.nodes[pair[0]];
            let child = &self.nodes[pair[1]];
            if let Some(slot) = out.get_mut(parent.feature_idx as usize) {
                *slot += child.value - parent.value;
            }
        }
        self.nodes[root].value
    }

    /// Get the root node
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Validate tree structure against the model's feature count
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.value.is_finite() {
                return Err(format!("Node {i} has a non-finite value"));
            }
            if node.is_leaf() {
                continue;
            }
            // Children must come after their parent so traversal cannot cycle
            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }
            if node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "Internal node {} splits on feature {} but the model has {} features",
                    i, node.feature_idx, feature_count
                ));
            }
            if !node.threshold.is_finite() {
                return Err(format!("Node {i} has a non-finite threshold"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// if x0 <= 0.5 then -1.0 else (if x1 <= 0.0 then 0.5 else 2.0)
    fn sample_tree() -> Tree {
        Tree::new(vec![
            Node::internal(0, 0, 0.5, 1, 2, 0.2, 10.0),
            Node::leaf(1, -1.0, 4.0),
            Node::internal(2, 1, 0.0, 3, 4, 1.0, 6.0),
            Node::leaf(3, 0.5, 3.0),
            Node::leaf(4, 2.0, 3.0),
        ])
    }

    #[test]
    fn test_node_creation() {
        let internal = Node::internal(0, 3, 1.5, 1, 2, 0.1, 8.0);
        assert_eq!(internal.feature_idx, 3);
        assert!(!internal.is_leaf());

        let leaf = Node::leaf(1, -0.25, 2.0);
        assert_eq!(leaf.feature_idx, -1);
        assert!(leaf.is_leaf());
    }

    #[test]
    fn test_tree_evaluation() {
        let tree = sample_tree();
        assert_eq!(tree.evaluate(&[0.0, 9.0]), -1.0);
        assert_eq!(tree.evaluate(&[0.5, 9.0]), -1.0); // equal goes left
        assert_eq!(tree.evaluate(&[1.0, -1.0]), 0.5);
        assert_eq!(tree.evaluate(&[1.0, 1.0]), 2.0);
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn test_path_contributions_add_up() {
        let tree = sample_tree();
        for features in [[0.0, 0.0], [1.0, -1.0], [1.0, 1.0]] {
            let mut out = vec![0.0; 2];
            let root = tree.path_contributions(&features, &mut out);
            let total = root + out.iter().sum::<f64>();
            assert!((total - tree.evaluate(&features)).abs() < 1e-12);
        }

        let mut out = vec![0.0; 2];
        tree.path_contributions(&[1.0, 1.0], &mut out);
        assert!((out[0] - 0.8).abs() < 1e-12);
        assert!((out[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tree_validation() {
        assert!(sample_tree().validate(2).is_ok());
        assert!(sample_tree().validate(1).is_err());

        let invalid = Tree::new(vec![
            Node::internal(0, 0, 0.5, 5, 2, 0.0, 1.0),
            Node::leaf(1, 1.0, 1.0),
            Node::leaf(2, 2.0, 1.0),
        ]);
        assert!(invalid.validate(1).is_err());

        let cyclic = Tree::new(vec![
            Node::internal(0, 0, 0.5, 0, 1, 0.0, 1.0),
            Node::leaf(1, 1.0, 1.0),
        ]);
        assert!(cyclic.validate(1).is_err());
    }
}
