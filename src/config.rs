use std::env;
use std::path::PathBuf;

/// Retrieves an environment variable and splits it into a vector of strings
/// based on a delimiter. Empty segments are dropped.
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    split_delimited(&env::var(var).unwrap_or_default(), delimiter)
}

fn split_delimited(raw: &str, delimiter: char) -> Vec<String> {
    raw.split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Engine configuration, loaded once from the environment at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path of the persisted topic cluster document.
    pub cluster_store_path: PathBuf,
    /// Path of the persisted publish history document.
    pub history_path: PathBuf,
    /// Jaccard score a recent article must reach for a candidate topic to be
    /// rejected as too similar.
    pub diversity_threshold: f64,
    /// Lookback window for the diversity filter, in days.
    pub diversity_lookback_days: i64,
    /// Maximum number of history records the diversity filter considers.
    pub diversity_max_records: usize,
    /// Delay between consecutive autocomplete requests, in milliseconds.
    pub autocomplete_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cluster_store_path: PathBuf::from("data/topic-clusters.json"),
            history_path: PathBuf::from("data/publish-history.json"),
            diversity_threshold: 0.35,
            diversity_lookback_days: 30,
            diversity_max_records: 50,
            autocomplete_delay_ms: 250,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            cluster_store_path: env::var("CLUSTER_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cluster_store_path),
            history_path: env::var("PUBLISH_HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_path),
            diversity_threshold: env_or("DIVERSITY_THRESHOLD", defaults.diversity_threshold),
            diversity_lookback_days: env_or(
                "DIVERSITY_LOOKBACK_DAYS",
                defaults.diversity_lookback_days,
            ),
            diversity_max_records: env_or("DIVERSITY_MAX_RECORDS", defaults.diversity_max_records),
            autocomplete_delay_ms: env_or("AUTOCOMPLETE_DELAY_MS", defaults.autocomplete_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert!(config.diversity_threshold > 0.0 && config.diversity_threshold < 1.0);
        assert!(config.diversity_lookback_days > 0);
    }

    #[test]
    fn delimited_values_drop_empty_segments() {
        assert_eq!(split_delimited("a; b;;c ;", ';'), vec!["a", "b", "c"]);
        assert!(split_delimited("", ';').is_empty());
        assert!(split_delimited(" ; ;", ';').is_empty());
    }

    #[test]
    fn unset_env_var_yields_empty_vec() {
        // Read-only lookup of a name no test ever sets.
        assert!(get_env_var_as_vec("CORNERSTONE_UNSET_F9C2", ';').is_empty());
    }
}
