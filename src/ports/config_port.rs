//! Configuration access port trait.
//!
//! Typed getters return `Ok(None)` for an absent key and an error for a
//! present key that does not parse, so a typo never silently becomes a
//! default.

use crate::domain::error::RankError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, RankError>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, RankError>;
}
