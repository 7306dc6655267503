//! Configuration access port trait.

/// Typed INI-style lookups. Numeric and boolean getters return `default`
/// when the key is absent or unparsable; `config_validation` reports the
/// unparsable case before any getter is trusted.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
