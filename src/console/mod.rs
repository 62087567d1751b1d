//! Console orchestration.
//!
//! This module owns the observable console state and the request lifecycle
//! for the two backend operations (list, run-now). UI/CLI layers send
//! commands in and consume state snapshots out, keeping responsibilities
//! separated.

mod controller;

pub(crate) use controller::{run_console, ConsoleState, UiCommand};
