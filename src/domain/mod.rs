//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod interval;
pub mod ohlcv;
pub mod recommendation;
pub mod rule;
pub mod rule_eval;
pub mod scoring;
pub mod signal;
pub mod snapshot;
pub mod strategy;
pub mod universe;
