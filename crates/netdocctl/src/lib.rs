//! NetDoc Control library - exposes modules for integration tests

pub mod cli;
pub mod commands;
pub mod display;
pub mod errors;
pub mod logging;
pub mod menu;
