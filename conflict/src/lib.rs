//! # Conflict Library
//!
//! Detection, escalation and resolution of assessment conflicts: when two
//! graders score the same semantic item differently, the detector opens a
//! stateful conflict, the state machine drives it through a deterministic
//! escalation protocol (causing tutor → tutors in conflict → instructor),
//! and the coordinator performs the surrounding side effects: committing the
//! aggregate with optimistic concurrency, notifying the responsible graders,
//! and pushing resolved decisions back into the assessment store.
//!
//! ## Key Concepts
//! - **State machine** ([`state_machine`]): side-effect-free transitions that
//!   return domain events instead of performing I/O.
//! - **Coordinator** ([`coordinator`]): read-modify-write transactions
//!   against the [`store`], event dispatch after commit, removal cascades.
//! - **Collaborators** ([`collaborators`]): the external seams for applying
//!   decisions, sending notifications and checking authorization.

pub mod collaborators;
pub mod coordinator;
pub mod detector;
pub mod state_machine;
pub mod store;
