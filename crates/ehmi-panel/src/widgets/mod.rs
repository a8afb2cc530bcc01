//! Reusable rendering helpers.

pub mod control_row;
