//! Configuration access port trait.

/// Read-only view of a sectioned key/value configuration.
///
/// Lookups return `None` for absent keys and for values that do not parse as
/// the requested type. Validation reports the difference.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Option<i64>;
    fn get_double(&self, section: &str, key: &str) -> Option<f64>;

    /// All keys present in `section`, sorted. Empty when the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;
}
