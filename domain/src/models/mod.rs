pub mod cluster;
pub mod conflict;
pub mod exercise;
pub mod feedback;
pub mod item;
pub mod result;
pub mod submission;
