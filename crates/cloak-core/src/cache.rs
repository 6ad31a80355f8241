//! Password cache with pluggable providers.
//!
//! Caches previously entered key-unlock passwords, keyed by a one-way
//! fingerprint of the encrypted key material (never by the password).
//! Every provider call runs under a short timeout and a bounded retry;
//! after the retry budget is spent the cache disables itself for the rest
//! of the process. Fail-open: a flaky cache backend degrades to prompting,
//! it never blocks encryption or decryption.

use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

/// Upper bound on a single provider call.
pub const PROVIDER_CALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Attempts per operation before the cache disables itself.
pub const PROVIDER_CALL_ATTEMPTS: u32 = 2;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache provider failure: {0}")]
    Provider(String),
}

/// Backing store contract. Implementations may talk to an external service;
/// the wrapper above them assumes any call can hang or throw.
pub trait CacheProvider: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn write(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
}

/// One-way fingerprint of key material, used as the cache lookup key.
/// Identical input yields an identical fingerprint.
pub fn fingerprint(material: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(material))
}

/// Cache tuning carried in from the CLI layer.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub verbose: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            verbose: false,
        }
    }
}

/// TTL-bounded password cache over a pluggable [`CacheProvider`].
pub struct PasswordCache {
    provider: Option<Arc<dyn CacheProvider>>,
    enabled: bool,
    ttl: Duration,
    verbose: bool,
}

impl PasswordCache {
    pub fn new(provider: Arc<dyn CacheProvider>, config: CacheConfig) -> Self {
        Self {
            provider: Some(provider),
            enabled: true,
            ttl: config.ttl,
            verbose: config.verbose,
        }
    }

    /// A cache that never stores anything. Used when caching is not requested.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            enabled: false,
            ttl: DEFAULT_TTL,
            verbose: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a previously cached password. Returns `None` on a miss, on an
    /// expired entry, or whenever the provider misbehaves.
    pub fn get(&mut self, fingerprint: &str) -> Option<Zeroizing<Vec<u8>>> {
        let key = fingerprint.to_string();
        self.operation("read", move |provider| provider.read(&key))
            .flatten()
            .map(Zeroizing::new)
    }

    /// Store a password under the given fingerprint. Errors are absorbed.
    pub fn put(&mut self, fingerprint: &str, password: &[u8]) {
        let key = fingerprint.to_string();
        let value = password.to_vec();
        let ttl = self.ttl;
        self.operation("write", move |provider| provider.write(&key, &value, ttl));
    }

    /// Run a provider call on a watchdog thread so a hung backend cannot
    /// stall the crypto workflow. A call that neither succeeds nor returns
    /// within the budget disables the cache permanently.
    fn operation<T, F>(&mut self, what: &'static str, call: F) -> Option<T>
    where
        T: Send + 'static,
        F: Fn(&dyn CacheProvider) -> Result<T, CacheError> + Send + Sync + 'static,
    {
        if !self.enabled {
            return None;
        }
        let provider = self.provider.clone()?;
        let call = Arc::new(call);

        for _ in 0..PROVIDER_CALL_ATTEMPTS {
            let (tx, rx) = mpsc::channel();
            let provider = Arc::clone(&provider);
            let call = Arc::clone(&call);
            thread::spawn(move || {
                let _ = tx.send(call(provider.as_ref()));
            });

            match rx.recv_timeout(PROVIDER_CALL_TIMEOUT) {
                Ok(Ok(value)) => return Some(value),
                Ok(Err(e)) => {
                    tracing::debug!(operation = what, error = %e, "cache provider call failed")
                }
                // The worker thread is leaked; the provider owns no state we
                // need back.
                Err(_) => tracing::debug!(operation = what, "cache provider call timed out"),
            }
        }

        self.degrade(what);
        None
    }

    fn degrade(&mut self, what: &'static str) {
        if self.verbose {
            tracing::warn!(
                operation = what,
                "password cache provider keeps failing; disabling the cache for this run"
            );
        } else {
            tracing::debug!(operation = what, "password cache disabled after repeated failures");
        }
        self.enabled = false;
    }
}

/// In-process provider backed by a plain map. Useful for long-lived hosts
/// embedding the library and as the reference implementation in tests;
/// entries honor the TTL they were written with.
#[derive(Default)]
pub struct MemoryProvider {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl CacheProvider for MemoryProvider {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Provider(e.to_string()))?;
        let expired = matches!(entries.get(key), Some((_, deadline)) if *deadline <= Instant::now());
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    fn write(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Provider(e.to_string()))?;
        entries.insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    impl CacheProvider for FailingProvider {
        fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Provider("connection refused".into()))
        }

        fn write(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Provider("connection refused".into()))
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(b"the same key material");
        let b = fingerprint(b"the same key material");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_differs_for_different_keys() {
        assert_ne!(fingerprint(b"key one"), fingerprint(b"key two"));
    }

    #[test]
    fn test_fingerprint_is_not_the_material() {
        let fp = fingerprint(b"secret");
        assert!(!fp.contains("secret"));
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let mut cache =
            PasswordCache::new(Arc::new(MemoryProvider::default()), CacheConfig::default());
        cache.put("fp", b"sesame");
        let got = cache.get("fp").unwrap();
        assert_eq!(got.as_slice(), b"sesame");
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let mut cache = PasswordCache::new(
            Arc::new(MemoryProvider::default()),
            CacheConfig {
                ttl: Duration::from_millis(0),
                verbose: false,
            },
        );
        cache.put("fp", b"sesame");
        thread::sleep(Duration::from_millis(5));
        assert!(cache.get("fp").is_none());
        // an expired entry is a miss, not a failure
        assert!(cache.is_enabled());
    }

    #[test]
    fn test_failing_provider_disables_the_cache() {
        let mut cache = PasswordCache::new(Arc::new(FailingProvider), CacheConfig::default());
        assert!(cache.get("fp").is_none());
        assert!(!cache.is_enabled());

        // subsequent calls are silent no-ops
        cache.put("fp", b"sesame");
        assert!(cache.get("fp").is_none());
    }

    #[test]
    fn test_disabled_cache_is_inert() {
        let mut cache = PasswordCache::disabled();
        cache.put("fp", b"sesame");
        assert!(cache.get("fp").is_none());
        assert!(!cache.is_enabled());
    }
}
