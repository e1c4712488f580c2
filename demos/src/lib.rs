//! # Ember Demos
//!
//! Shared pieces of the demo binaries: command line parsing and a small
//! scene that exercises every stage of the render hardware interface.

pub mod args;
pub mod scene;
