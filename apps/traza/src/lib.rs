//! # traza
//!
//! Command-line front end for the Traza traceability engine.

pub mod cli;
pub mod config;
