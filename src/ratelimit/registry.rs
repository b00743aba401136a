//! Registry of limiters keyed by name.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::limiter::{Limiter, LimiterHandle};
use crate::config::TollgateConfig;
use crate::error::{Result, TollgateError};

/// The single source of truth mapping keys to limiters.
///
/// Limiters are only ever added. A key, once registered, keeps its limiter for
/// the lifetime of the registry. The registry is an ordinary value: build one
/// at startup and share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct LimiterRegistry {
    /// Registered limiters indexed by key
    limiters: RwLock<HashMap<String, LimiterHandle>>,
}

impl LimiterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every limiter in `config`.
    ///
    /// Fails on the first invalid or duplicate entry.
    pub fn from_config(config: &TollgateConfig) -> Result<Self> {
        let registry = Self::new();
        for limiter in &config.limiters {
            registry.register(limiter.key.clone(), limiter.rate, limiter.burst)?;
        }
        Ok(registry)
    }

    /// Register a new limiter allowing `rate` tokens per second with bursts of `burst`.
    ///
    /// Returns `AlreadyExists` if `key` is taken; the existing limiter is left
    /// as it was.
    pub fn register(&self, key: impl Into<String>, rate: f64, burst: u32) -> Result<()> {
        let key = key.into();
        Limiter::validate(&key, rate, burst)?;

        let mut limiters = self.limiters.write();
        match limiters.entry(key) {
            Entry::Occupied(entry) => {
                debug!(key = %entry.key(), "Rejected duplicate limiter registration");
                Err(TollgateError::AlreadyExists {
                    key: entry.key().clone(),
                })
            }
            Entry::Vacant(entry) => {
                let limiter = Limiter::new(entry.key().clone(), rate, burst);
                info!(key = %entry.key(), rate, burst, "Registered rate limiter");
                entry.insert(Arc::new(limiter));
                Ok(())
            }
        }
    }

    /// Look up the limiter registered under `key`.
    pub fn get(&self, key: &str) -> Result<LimiterHandle> {
        self.limiters
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| TollgateError::NotFound {
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.limiters.read().contains_key(key)
    }

    /// Get the number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.read().is_empty()
    }

    /// Registered keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.limiters.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimiterConfig;

    #[test]
    fn test_register_and_get() {
        let registry = LimiterRegistry::new();
        registry.register("mock", 10.0, 10).unwrap();

        let limiter = registry.get("mock").unwrap();
        assert_eq!(limiter.key(), "mock");
        assert_eq!(limiter.rate(), 10.0);
        assert_eq!(limiter.burst(), 10);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_register_keeps_original() {
        let registry = LimiterRegistry::new();
        registry.register("mock", 10.0, 10).unwrap();

        let err = registry.register("mock", 1.0, 1).unwrap_err();
        assert!(matches!(err, TollgateError::AlreadyExists { ref key } if key == "mock"));

        let limiter = registry.get("mock").unwrap();
        assert_eq!(limiter.rate(), 10.0);
        assert_eq!(limiter.burst(), 10);
    }

    #[test]
    fn test_get_unregistered_key() {
        let registry = LimiterRegistry::new();
        registry.register("mock", 10.0, 10).unwrap();

        let err = registry.get("mock2").unwrap_err();
        assert!(matches!(err, TollgateError::NotFound { ref key } if key == "mock2"));
    }

    #[test]
    fn test_invalid_parameters_do_not_register() {
        let registry = LimiterRegistry::new();

        assert!(matches!(
            registry.register("zero-rate", 0.0, 1),
            Err(TollgateError::InvalidRate { .. })
        ));
        assert!(matches!(
            registry.register("zero-burst", 1.0, 0),
            Err(TollgateError::InvalidBurst { .. })
        ));
        assert!(matches!(
            registry.register("slow", 1e-310, 1),
            Err(TollgateError::InvalidRate { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handles_share_limiter_state() {
        let registry = LimiterRegistry::new();
        registry.register("shared", 0.001, 1).unwrap();

        assert!(registry.get("shared").unwrap().try_acquire());
        assert!(!registry.get("shared").unwrap().try_acquire());
    }

    #[test]
    fn test_concurrent_register_has_single_winner() {
        let registry = Arc::new(LimiterRegistry::new());

        let handles: Vec<_> = (0..100u32)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let rate = (i + 1) as f64;
                    registry.register("race", rate, i + 1).map(|_| (rate, i + 1))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(TollgateError::AlreadyExists { .. })))
            .count();

        assert_eq!(winners.len(), 1);
        assert_eq!(losers, 99);

        let (rate, burst) = *winners[0];
        let limiter = registry.get("race").unwrap();
        assert_eq!(limiter.rate(), rate);
        assert_eq!(limiter.burst(), burst);
    }

    #[test]
    fn test_from_config() {
        let config = TollgateConfig {
            limiters: vec![
                LimiterConfig {
                    key: "github".to_string(),
                    rate: 2.0,
                    burst: 1,
                },
                LimiterConfig {
                    key: "internal".to_string(),
                    rate: 100.0,
                    burst: 20,
                },
            ],
            ..Default::default()
        };

        let registry = LimiterRegistry::from_config(&config).unwrap();
        let mut keys = registry.keys();
        keys.sort();
        assert_eq!(keys, vec!["github".to_string(), "internal".to_string()]);
    }

    #[test]
    fn test_from_config_rejects_duplicate_keys() {
        let entry = LimiterConfig {
            key: "github".to_string(),
            rate: 2.0,
            burst: 1,
        };
        let config = TollgateConfig {
            limiters: vec![entry.clone(), entry],
            ..Default::default()
        };

        assert!(matches!(
            LimiterRegistry::from_config(&config),
            Err(TollgateError::AlreadyExists { .. })
        ));
    }
}
