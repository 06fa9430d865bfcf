//! Wiring for the `bulletin` command-line tool.

pub mod commands;
