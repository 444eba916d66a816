//! Cluster path: the position of a point in the cluster hierarchy.

use smallvec::{smallvec, SmallVec};

/// Label of the single root cluster every point belongs to.
pub const ROOT_CLUSTER: &str = "0";

/// Path from the root of the cluster hierarchy down to a point's leaf
/// cluster. Hierarchical clustering is not computed yet, so every path is the
/// trivial `["0"]`; the inline capacity covers that without allocating.
pub type ClusterPath = SmallVec<[String; 2]>;

/// The path of a point that sits directly under the root cluster.
pub fn root_path() -> ClusterPath {
    smallvec![ROOT_CLUSTER.to_string()]
}
