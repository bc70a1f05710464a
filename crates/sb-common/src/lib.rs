pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod money;
pub mod schedule;
pub mod split;
pub mod totals;
pub mod types;
pub mod validation;
