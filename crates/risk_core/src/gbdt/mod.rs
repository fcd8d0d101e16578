//! Gradient Boosted Decision Tree inference for default prediction
//!
//! - **Binary logistic**: the ensemble output is a log-odds margin,
//!   `predict_proba` applies the logistic function
//! - **Deterministic traversal**: rows go left when `x <= threshold`
//! - **Canonical serialization**: models use sorted JSON keys for reproducible hashing
//! - **Exact attribution**: every node stores its value, so per-column path
//!   contributions plus the bias reproduce the margin
//!
//! # Model Format
//!
//! ```json
//! {
//!   "base_score": -1.2,
//!   "feature_count": 2,
//!   "feature_names": ["loan_int_rate", "loan_grade_A"],
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"id":0,"left":1,"right":2,"feature_idx":0,"threshold":0.35,"value":0.01,"cover":40.0},
//!         {"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"value":-0.08,"cover":28.0},
//!         {"id":2,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"value":0.21,"cover":12.0}
//!       ]
//!     }
//!   ],
//!   "version": 1
//! }
//! ```

pub mod model;
pub mod tree;

pub use model::{logit, sigmoid, Contributions, GbdtModel, MODEL_FORMAT_VERSION};
pub use tree::{Node, Tree};
