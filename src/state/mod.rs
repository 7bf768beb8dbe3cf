//! State module for tracking run progress
//!
//! # Components
//!
//! - `RunState`: lifecycle of one batch (idle, running, completed, aborted)

mod run_state;

pub use run_state::RunState;
