//! CART regression tree.
//!
//! Splits minimise the summed squared error of the two children. Candidate
//! features are visited in a seeded random order per node, so a fixed seed
//! gives an identical tree on identical data.

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{check_predict_input, check_training_input, ModelError, Regressor};

/// Node impurity below which a node is not split further.
const MIN_IMPURITY: f64 = 1e-12;

/// Decision tree configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum depth of tree (None = grow until leaves are pure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Maximum features to consider for split (None = all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_features: Option<usize>,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Best split found for a node.
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

/// Decision Tree model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
    n_features: usize,
}

impl DecisionTree {
    /// Create a new decision tree with config
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            root: None,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Depth of the fitted tree (a single leaf has depth 1).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }

    /// Fit on a subset of rows (duplicates allowed) using only `columns`
    /// as split candidates.
    ///
    /// Shared by the forest (bootstrap rows) and boosting (row and column
    /// subsampling). Inputs are assumed to be checked by the caller.
    pub(crate) fn fit_rows(
        &mut self,
        features: &Array2<f64>,
        target: &Array1<f64>,
        rows: Vec<usize>,
        columns: &[usize],
    ) -> Result<(), ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if let Some(&bad) = columns.iter().find(|&&c| c >= features.ncols()) {
            return Err(ModelError::InvalidInput(format!(
                "split column {} out of range for {} features",
                bad,
                features.ncols()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut candidates = columns.to_vec();
        self.n_features = features.ncols();
        self.root = Some(self.build_node(features, target, rows, &mut candidates, 0, &mut rng));
        Ok(())
    }

    pub(crate) fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        Ok(root.predict(row))
    }

    fn build_node(
        &self,
        features: &Array2<f64>,
        target: &Array1<f64>,
        rows: Vec<usize>,
        candidates: &mut [usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = rows.len();
        let mean = rows.iter().map(|&r| target[r]).sum::<f64>() / n as f64;
        let sse: f64 = rows.iter().map(|&r| (target[r] - mean).powi(2)).sum();

        let leaf = TreeNode::Leaf { value: mean };

        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        let min_leaf = self.config.min_samples_leaf.max(1);
        if depth_reached
            || n < self.config.min_samples_split.max(2)
            || n < 2 * min_leaf
            || sse <= MIN_IMPURITY
        {
            return leaf;
        }

        candidates.shuffle(rng);
        let n_try = self
            .config
            .max_features
            .map_or(candidates.len(), |m| m.clamp(1, candidates.len()));

        let mut best: Option<SplitCandidate> = None;
        for &feature in candidates[..n_try].iter() {
            if let Some(split) = best_split(features, target, &rows, feature, mean, min_leaf) {
                if best.as_ref().map_or(true, |b| split.sse < b.sse) {
                    best = Some(split);
                }
            }
        }

        let best = match best {
            Some(b) if b.sse < sse => b,
            _ => return leaf,
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| features[[r, best.feature]] <= best.threshold);

        let left = self.build_node(features, target, left_rows, candidates, depth + 1, rng);
        let right = self.build_node(features, target, right_rows, candidates, depth + 1, rng);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Scan the sorted values of one feature for the lowest-error split.
///
/// Targets are centred on the node mean before accumulating so the
/// prefix-sum error formula does not lose precision on large rates.
fn best_split(
    features: &Array2<f64>,
    target: &Array1<f64>,
    rows: &[usize],
    feature: usize,
    node_mean: f64,
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = rows.len();
    let mut sorted: Vec<(f64, f64)> = rows
        .iter()
        .map(|&r| (features[[r, feature]], target[r] - node_mean))
        .collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total_sum: f64 = sorted.iter().map(|(_, y)| y).sum();
    let total_sq: f64 = sorted.iter().map(|(_, y)| y * y).sum();

    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    let mut best: Option<SplitCandidate> = None;

    for k in 1..n {
        let (x_prev, y_prev) = sorted[k - 1];
        left_sum += y_prev;
        left_sq += y_prev * y_prev;

        if k < min_leaf || n - k < min_leaf {
            continue;
        }
        let x_next = sorted[k].0;
        if x_prev >= x_next {
            continue;
        }

        let n_left = k as f64;
        let n_right = (n - k) as f64;
        let right_sum = total_sum - left_sum;
        let right_sq = total_sq - left_sq;
        let sse = (left_sq - left_sum * left_sum / n_left)
            + (right_sq - right_sum * right_sum / n_right);

        if best.as_ref().map_or(true, |b| sse < b.sse) {
            let mid = x_prev + (x_next - x_prev) / 2.0;
            // Midpoint can round up to the upper value for adjacent floats
            let threshold = if mid >= x_next { x_prev } else { mid };
            best = Some(SplitCandidate {
                feature,
                threshold,
                sse,
            });
        }
    }

    best
}

impl Regressor for DecisionTree {
    fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> Result<(), ModelError> {
        check_training_input(features, target)?;
        let rows: Vec<usize> = (0..features.nrows()).collect();
        let columns: Vec<usize> = (0..features.ncols()).collect();
        self.fit_rows(features, target, rows, &columns)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        check_predict_input(features, self.n_features)?;
        Ok(features
            .rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(slice) => root.predict(slice),
                None => root.predict(&row.to_vec()),
            })
            .collect())
    }
}
