//! Engine configuration loaded from the environment.

use tracing::warn;

/// Knobs for the read path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Serve reads from the per-organization snapshot cache (`PANTRY_CACHE_ENABLED`).
    pub cache_enabled: bool,
    /// Replay the log on every cached read and repair drift (`PANTRY_VERIFY_ON_READ`).
    pub verify_on_read: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            verify_on_read: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cache_enabled: flag(&lookup, "PANTRY_CACHE_ENABLED", defaults.cache_enabled),
            verify_on_read: flag(&lookup, "PANTRY_VERIFY_ON_READ", defaults.verify_on_read),
        }
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(key, value = %raw, default, "unparsable boolean; using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
    }

    #[test]
    fn reads_flags() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PANTRY_CACHE_ENABLED", "false"),
            ("PANTRY_VERIFY_ON_READ", "1"),
        ]));

        assert!(!config.cache_enabled);
        assert!(config.verify_on_read);
    }

    #[test]
    fn garbage_keeps_default() {
        let config = EngineConfig::from_lookup(lookup(&[("PANTRY_CACHE_ENABLED", "maybe")]));
        assert!(config.cache_enabled);
    }
}
