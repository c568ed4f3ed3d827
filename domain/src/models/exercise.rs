//! Exercise kinds, reduced to what conflict handling needs to know.
//!
//! The surrounding platform owns the exercise entities; this core carries
//! exercise ids plus this tag, and dispatches on the tag instead of a type
//! hierarchy.

use serde::{Deserialize, Serialize};

/// The kind of exercise an assessment belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExerciseKind {
    Text,
    Modeling,
}
