/// Errors that can occur while suggesting feedback.
///
/// Statistical edge cases (empty cluster, no credited items) are not errors;
/// the statistics functions return `None` for those.
#[derive(Debug, thiserror::Error)]
pub enum SuggesterError {
    /// An item references a cluster id the caller did not supply.
    #[error("Item {item_id} references unknown cluster {cluster_id}")]
    UnknownCluster { item_id: String, cluster_id: i64 },
}
