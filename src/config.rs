//! Import tuning knobs

/// Rows per insert batch for endpoints and exchanges
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Longest serialized header block kept for proxy XML imports
pub const DEFAULT_HEADER_STORAGE_LIMIT: usize = 65_000;

const BATCH_SIZE_ENV: &str = "TRAFFIC_IMPORT_BATCH_SIZE";
const HEADER_LIMIT_ENV: &str = "TRAFFIC_IMPORT_HEADER_LIMIT";

/// Import configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Maximum rows per insert call
    pub batch_size: usize,
    /// Serialized header text above this many bytes is truncated
    pub header_storage_limit: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            header_storage_limit: DEFAULT_HEADER_STORAGE_LIMIT,
        }
    }
}

impl ImportConfig {
    /// Defaults, overridden by `TRAFFIC_IMPORT_BATCH_SIZE` and
    /// `TRAFFIC_IMPORT_HEADER_LIMIT` when they hold positive integers.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(size) = parse_positive(lookup(BATCH_SIZE_ENV), BATCH_SIZE_ENV) {
            config.batch_size = size;
        }
        if let Some(limit) = parse_positive(lookup(HEADER_LIMIT_ENV), HEADER_LIMIT_ENV) {
            config.header_storage_limit = limit;
        }
        config
    }
}

fn parse_positive(value: Option<String>, key: &str) -> Option<usize> {
    let raw = value?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_storage_limits() {
        let config = ImportConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.header_storage_limit, 65_000);
    }

    #[test]
    fn lookup_overrides_valid_values_only() {
        let config = ImportConfig::from_lookup(|key| match key {
            BATCH_SIZE_ENV => Some(" 25 ".to_string()),
            HEADER_LIMIT_ENV => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.header_storage_limit, DEFAULT_HEADER_STORAGE_LIMIT);

        let config = ImportConfig::from_lookup(|_| Some("lots".to_string()));
        assert_eq!(config, ImportConfig::default());
    }
}
