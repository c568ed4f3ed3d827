//! # Suggester Library
//!
//! This crate provides the automatic feedback suggestion engine for graded
//! student work. Items of a submission (text passages or diagram elements)
//! arrive grouped into similarity clusters by an external clustering
//! collaborator; this crate infers feedback for still-ungraded items from
//! their already-graded cluster neighbors.
//!
//! ## Key Concepts
//! - **FeedbackIndex**: the already-graded feedback per item, passed
//!   explicitly into every call instead of being looked up through a shared
//!   collaborator.
//! - **Statistics**: pure statistical functions over a cluster (expectation,
//!   dispersion, coverage). Edge cases are `None`, never errors.
//! - **Suggestion strategies**: nearest-credited-neighbor cloning and
//!   inverse-distance-weighted score interpolation.

pub mod error;
pub mod statistics;
pub mod suggest;

use std::collections::HashMap;

use domain::models::feedback::Feedback;

/// Already-graded feedback, keyed by item id.
///
/// Supplied by the caller for the cluster(s) under consideration; the engine
/// never fetches feedback itself.
pub type FeedbackIndex = HashMap<String, Feedback>;
