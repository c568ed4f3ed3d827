//! A gradable unit of student work: a text passage or a diagram element.

use serde::{Deserialize, Serialize};

/// One semantic unit of a submission that can receive feedback.
///
/// Items are produced and clustered by the upstream clustering collaborator;
/// this core only reads them. An item belongs to at most one cluster, held as
/// a weak id reference rather than ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Element id assigned by the clustering collaborator.
    pub id: String,

    /// ID of the submission this item was extracted from.
    pub submission_id: i64,

    /// ID of the cluster this item belongs to, if any.
    pub cluster_id: Option<i64>,
}

impl Item {
    pub fn new(id: impl Into<String>, submission_id: i64) -> Self {
        Item {
            id: id.into(),
            submission_id,
            cluster_id: None,
        }
    }

    pub fn in_cluster(mut self, cluster_id: i64) -> Self {
        self.cluster_id = Some(cluster_id);
        self
    }
}
