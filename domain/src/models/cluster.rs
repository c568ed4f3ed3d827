//! Similarity clusters owned by the upstream clustering collaborator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::item::Item;

/// A group of semantically similar items together with the pairwise distance
/// matrix computed by the clustering collaborator.
///
/// Clusters are read-only for this core. The distance function is symmetric
/// and non-negative; both orientations of a pair resolve to the same entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: i64,
    items: Vec<Item>,
    distances: HashMap<String, f64>,
}

impl Cluster {
    pub fn new(id: i64, items: Vec<Item>) -> Self {
        Cluster {
            id,
            items,
            distances: HashMap::new(),
        }
    }

    /// Records the distance between two items. Stored once per unordered pair.
    pub fn with_distance(mut self, a: &str, b: &str, distance: f64) -> Self {
        self.distances.insert(Self::pair_key(a, b), distance);
        self
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.items.iter().any(|item| item.id == item_id)
    }

    /// Distance between two items of this cluster.
    ///
    /// The distance of an item to itself is 0. Pairs the collaborator never
    /// scored are treated as infinitely far apart, so they can never win a
    /// nearest-neighbor search.
    pub fn distance(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 0.0;
        }
        self.distances
            .get(&Self::pair_key(a, b))
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    fn pair_key(a: &str, b: &str) -> String {
        if a <= b {
            format!("{a}\u{1}{b}")
        } else {
            format!("{b}\u{1}{a}")
        }
    }
}
