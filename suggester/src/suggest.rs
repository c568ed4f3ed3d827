//! # Feedback Suggestion Module
//!
//! Produces feedback suggestions for ungraded items from their already-graded
//! cluster neighbors. Two independent strategies:
//!
//! - **Nearest-credited-neighbor**: clone the closest credited neighbor's
//!   feedback when it is nearer than [`DISTANCE_THRESHOLD`], otherwise emit a
//!   manual placeholder so the item falls back to human grading.
//! - **Inverse-distance-weighted interpolation** ([`FeedbackSuggester::calculate_score`]):
//!   a weighted average of all credited neighbors, accepted only when it lies
//!   inside one standard deviation of the cluster's expectation.
//!
//! The suggester only writes into the caller-supplied result's feedback
//! collection; clusters and the feedback index are never mutated.

use std::collections::HashMap;

use tracing::debug;

use domain::models::cluster::Cluster;
use domain::models::feedback::Feedback;
use domain::models::item::Item;
use domain::models::result::AssessmentResult;

use crate::error::SuggesterError;
use crate::statistics;
use crate::FeedbackIndex;

/// Maximum distance at which an existing feedback is cloned onto an
/// ungraded item.
pub const DISTANCE_THRESHOLD: f64 = 1.0;

/// Minimum number of credited items before the score acceptance window
/// (expectation ± stddev) is defined.
pub const DISPERSION_THRESHOLD_SIZE: usize = 5;

/// Suggests feedback for the items of one submission.
///
/// Borrows the clusters owned by the clustering collaborator and the graded
/// feedback index supplied by the caller.
pub struct FeedbackSuggester<'a> {
    clusters: &'a HashMap<i64, Cluster>,
    index: &'a FeedbackIndex,
    distance_threshold: f64,
    dispersion_threshold_size: usize,
}

impl<'a> FeedbackSuggester<'a> {
    pub fn new(clusters: &'a HashMap<i64, Cluster>, index: &'a FeedbackIndex) -> Self {
        FeedbackSuggester {
            clusters,
            index,
            distance_threshold: DISTANCE_THRESHOLD,
            dispersion_threshold_size: DISPERSION_THRESHOLD_SIZE,
        }
    }

    /// Builds a suggester with the thresholds from the environment config.
    pub fn with_config(
        clusters: &'a HashMap<i64, Cluster>,
        index: &'a FeedbackIndex,
        config: &common::config::Config,
    ) -> Self {
        FeedbackSuggester {
            clusters,
            index,
            distance_threshold: config.distance_threshold,
            dispersion_threshold_size: config.dispersion_threshold_size,
        }
    }

    /// Suggests feedback for every given item and stores the suggestions in
    /// the provided result's feedback collection.
    ///
    /// For each item that sits in a cluster, the nearest credited neighbor is
    /// looked up; if it is closer than [`DISTANCE_THRESHOLD`] its credits and
    /// detail text are cloned as automatic feedback. In every other case a
    /// manual placeholder with zero credits is emitted.
    pub fn suggest_feedback(
        &self,
        result: &mut AssessmentResult,
        items: &[Item],
    ) -> Result<(), SuggesterError> {
        let mut suggested = Vec::with_capacity(items.len());

        for item in items {
            suggested.push(self.suggest_for_item(item)?);
        }

        debug!(
            result_id = result.id,
            suggestions = suggested.len(),
            "populated feedback suggestions"
        );
        result.feedback = suggested;
        Ok(())
    }

    fn suggest_for_item(&self, item: &Item) -> Result<Feedback, SuggesterError> {
        if let Some(cluster_id) = item.cluster_id {
            let cluster =
                self.clusters
                    .get(&cluster_id)
                    .ok_or_else(|| SuggesterError::UnknownCluster {
                        item_id: item.id.clone(),
                        cluster_id,
                    })?;

            if let Some(neighbor_id) = self.nearest_credited_neighbor(item, cluster) {
                if cluster.distance(&item.id, &neighbor_id) < self.distance_threshold {
                    let neighbor_feedback = &self.index[&neighbor_id];
                    if let Some(credits) = neighbor_feedback.credits {
                        return Ok(Feedback::automatic(
                            item.id.clone(),
                            credits,
                            neighbor_feedback.detail_text.clone(),
                        ));
                    }
                }
            }
        }

        // No usable neighbor: placeholder that forces manual grading.
        Ok(Feedback::manual(item.id.clone(), 0.0))
    }

    /// The credited cluster neighbor closest to `item`, excluding `item`
    /// itself.
    fn nearest_credited_neighbor(&self, item: &Item, cluster: &Cluster) -> Option<String> {
        cluster
            .items()
            .iter()
            .filter(|other| other.id != item.id)
            .filter(|other| statistics::credits_of(self.index, &other.id).is_some())
            .min_by(|a, b| {
                cluster
                    .distance(&item.id, &a.id)
                    .total_cmp(&cluster.distance(&item.id, &b.id))
            })
            .map(|other| other.id.clone())
    }

    /// Interpolates a score for an ungraded item from all credited cluster
    /// neighbors, weighted by inverse distance.
    ///
    /// The interpolation is accepted only when it lies within
    /// `[expectation − stddev, expectation + stddev]` of the cluster
    /// (stddev gated on [`DISPERSION_THRESHOLD_SIZE`] credited items).
    /// Undefined when the item is already credited or the cluster has no
    /// credited items; an out-of-window suggestion is rejected so the item
    /// goes to manual grading.
    pub fn calculate_score(&self, item: &Item, cluster: &Cluster) -> Option<f64> {
        if statistics::credits_of(self.index, &item.id).is_some() {
            return None;
        }

        let credited: Vec<(&str, f64)> = statistics::credited_items(cluster, self.index)
            .into_iter()
            .filter(|(item_id, _)| *item_id != item.id)
            .collect();
        if credited.is_empty() {
            return None;
        }

        let mut weight_sum = 0.0;
        let mut weighted_credit_sum = 0.0;
        for (neighbor_id, credits) in &credited {
            let weight = 1.0 / cluster.distance(&item.id, neighbor_id).abs();
            weight_sum += weight;
            weighted_credit_sum += weight * credits;
        }
        let score = weighted_credit_sum / weight_sum;

        let expected = statistics::expectation(cluster, self.index)?;
        let deviation = statistics::stddev(cluster, self.index, self.dispersion_threshold_size)?;
        if score >= expected - deviation && score <= expected + deviation {
            Some(score)
        } else {
            debug!(
                item_id = %item.id,
                score,
                expected,
                deviation,
                "rejected interpolated score outside acceptance window"
            );
            None
        }
    }
}
