//! Review engine for agent-produced diffs: parse unified diffs, navigate
//! them with collapse and follow, anchor comments to new-side lines, and
//! turn open comments into a review message (and back).

pub mod app;
pub mod config;
pub mod diff;
pub mod review;
pub mod watch;
