//! Model representations: SoA trees and the forest that sums them.

pub mod forest;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use tree::{MutableTree, NodeId, NodeStats, Tree, TreeValidationError};
