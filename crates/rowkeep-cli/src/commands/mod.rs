//! Command handlers

pub mod config;
pub mod status;
pub mod table;
