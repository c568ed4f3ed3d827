//! # Cluster Statistics Module
//!
//! Pure statistical functions over a similarity cluster and the feedback its
//! items have received so far. Every function takes the graded feedback as an
//! explicit [`FeedbackIndex`] argument and has no side effects.
//!
//! All cluster-empty and no-credited-item cases yield `None` rather than an
//! error, so callers can treat "no value" as a normal outcome.

use domain::models::cluster::Cluster;

use crate::FeedbackIndex;

/// Credits awarded to an item, if it has been graded with credits.
pub fn credits_of(index: &FeedbackIndex, item_id: &str) -> Option<f64> {
    index.get(item_id).and_then(|feedback| feedback.credits)
}

/// Item ids of all credited items in the cluster, paired with their credits.
pub fn credited_items<'a>(cluster: &'a Cluster, index: &FeedbackIndex) -> Vec<(&'a str, f64)> {
    cluster
        .items()
        .iter()
        .filter_map(|item| credits_of(index, &item.id).map(|credits| (item.id.as_str(), credits)))
        .collect()
}

/// Expected credit value of a cluster.
///
/// Each credited item contributes its credits weighted uniformly by
/// `1 / |cluster|`; uncredited items contribute nothing but still widen the
/// denominator through that uniform weight. `None` for an empty cluster or a
/// cluster without credited items.
pub fn expectation(cluster: &Cluster, index: &FeedbackIndex) -> Option<f64> {
    let credited = credited_items(cluster, index);
    if cluster.size() == 0 || credited.is_empty() {
        return None;
    }
    let weight = 1.0 / cluster.size() as f64;
    Some(credited.iter().map(|(_, credits)| weight * credits).sum())
}

/// Signed weighted spread of a cluster's credited items around its
/// expectation.
///
/// `None` unless at least `threshold_size` items are credited. Note that the
/// deviations are not squared: this is the historical spread measure, not a
/// statistical variance, and is kept bit-for-bit as defined.
pub fn dispersion(cluster: &Cluster, index: &FeedbackIndex, threshold_size: usize) -> Option<f64> {
    let credited = credited_items(cluster, index);
    if credited.len() < threshold_size {
        return None;
    }
    let expected = expectation(cluster, index)?;

    Some(
        credited
            .iter()
            .map(|(item_id, credits)| {
                score_coverage_percentage(cluster, index, item_id)
                    .map_or(0.0, |coverage| (credits - expected) * coverage)
            })
            .sum(),
    )
}

/// Square root of [`dispersion`], with the same threshold gate.
pub fn stddev(cluster: &Cluster, index: &FeedbackIndex, threshold_size: usize) -> Option<f64> {
    dispersion(cluster, index, threshold_size).map(f64::sqrt)
}

/// Fraction of the cluster's items that have been credited.
pub fn coverage_percentage(cluster: &Cluster, index: &FeedbackIndex) -> Option<f64> {
    if cluster.size() == 0 {
        return None;
    }
    let credited = credited_items(cluster, index).len();
    Some(credited as f64 / cluster.size() as f64)
}

/// Fraction of the cluster's items sharing the given item's credit value.
///
/// `None` if the item is not part of the cluster or has no credits itself.
pub fn score_coverage_percentage(
    cluster: &Cluster,
    index: &FeedbackIndex,
    item_id: &str,
) -> Option<f64> {
    if !cluster.contains(item_id) {
        return None;
    }
    let item_credits = credits_of(index, item_id)?;
    let same_credit = cluster
        .items()
        .iter()
        .filter(|other| credits_of(index, &other.id) == Some(item_credits))
        .count();
    Some(same_credit as f64 / cluster.size() as f64)
}

/// Average credit over the whole cluster (uncredited items count as zero in
/// the numerator but stay in the denominator). `None` when no item is
/// credited.
pub fn average(cluster: &Cluster, index: &FeedbackIndex) -> Option<f64> {
    let credited = credited_items(cluster, index);
    if credited.is_empty() {
        return None;
    }
    let sum: f64 = credited.iter().map(|(_, credits)| credits).sum();
    Some(sum / cluster.size() as f64)
}

/// Maximum credit among the cluster's credited items.
pub fn max_score(cluster: &Cluster, index: &FeedbackIndex) -> Option<f64> {
    credited_items(cluster, index)
        .into_iter()
        .map(|(_, credits)| credits)
        .reduce(f64::max)
}

/// Minimum credit among the cluster's credited items.
pub fn min_score(cluster: &Cluster, index: &FeedbackIndex) -> Option<f64> {
    credited_items(cluster, index)
        .into_iter()
        .map(|(_, credits)| credits)
        .reduce(f64::min)
}

/// Median credit among the cluster's credited items.
///
/// The upper-middle element of the sorted credits (index `len / 2`), matching
/// the historical definition for even-sized sets.
pub fn median_score(cluster: &Cluster, index: &FeedbackIndex) -> Option<f64> {
    let mut credits: Vec<f64> = credited_items(cluster, index)
        .into_iter()
        .map(|(_, credits)| credits)
        .collect();
    if credits.is_empty() {
        return None;
    }
    credits.sort_by(|a, b| a.total_cmp(b));
    Some(credits[credits.len() / 2])
}
