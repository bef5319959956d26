//! Deterministic link shortening
//!
//! A short key is a prefix of the hex encoded SHA-256 digest of the full
//! path. The first URL to claim a prefix keeps it; a later URL whose prefix
//! is already bound to something else takes the next longer prefix of its
//! own digest. Once a URL has a key, shortening it again returns the stored
//! key without re-deriving it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

/// Default number of hex characters in a short key
pub const DEFAULT_KEY_LEN: usize = 6;

/// Length of a fully expanded key (hex encoded SHA-256)
pub const MAX_KEY_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid short key: {0}")]
    InvalidKey(String),
    #[error("no free short key left for {0}")]
    KeySpaceExhausted(String),
    #[error("link storage error: {0}")]
    Storage(String),
}

/// A validated short key: 1 to 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShortKey(String);

impl ShortKey {
    pub fn parse(raw: &str) -> Result<Self, LinkError> {
        if raw.is_empty() || raw.len() > MAX_KEY_LEN {
            return Err(LinkError::InvalidKey(format!(
                "length must be between 1 and {}, got {}",
                MAX_KEY_LEN,
                raw.len()
            )));
        }
        if !raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(LinkError::InvalidKey(format!(
                "must contain only lowercase hex characters: '{}'",
                raw
            )));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Composes the public short URL, e.g. `https://host/s/1a2b3c`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/s/{}", base_url.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for ShortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of binding a URL to a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The URL already had this key.
    Existing(ShortKey),
    /// A fresh key was stored for the URL.
    Created(ShortKey),
}

impl Binding {
    pub fn key(&self) -> &ShortKey {
        match self {
            Binding::Existing(key) | Binding::Created(key) => key,
        }
    }

    pub fn into_key(self) -> ShortKey {
        match self {
            Binding::Existing(key) | Binding::Created(key) => key,
        }
    }
}

/// Storage for the key to URL mapping.
///
/// `bind` must run as one atomic step: two callers binding the same new URL
/// concurrently end up with the same key, and two different URLs never
/// share one.
pub trait LinkStore: Send + Sync + 'static {
    /// Returns the key already bound to `url`, or binds the first candidate
    /// that is still free.
    fn bind(
        &self,
        url: &str,
        candidates: &mut dyn Iterator<Item = ShortKey>,
    ) -> Result<Binding, LinkError>;

    fn resolve(&self, key: &ShortKey) -> Result<Option<String>, LinkError>;
}

/// Digest prefixes of `url`, shortest first, starting at `min_len`.
pub fn candidate_keys(url: &str, min_len: usize) -> impl Iterator<Item = ShortKey> {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    let start = min_len.clamp(1, MAX_KEY_LEN);
    (start..=MAX_KEY_LEN).map(move |len| ShortKey(digest[..len].to_owned()))
}

pub struct LinkShortener<S> {
    store: S,
    key_len: usize,
}

impl<S: LinkStore> LinkShortener<S> {
    pub fn new(store: S) -> Self {
        Self::with_key_len(store, DEFAULT_KEY_LEN)
    }

    pub fn with_key_len(store: S, key_len: usize) -> Self {
        Self {
            store,
            key_len: key_len.clamp(1, MAX_KEY_LEN),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn shorten(&self, full_url: &str) -> Result<ShortKey, LinkError> {
        let mut candidates = candidate_keys(full_url, self.key_len);
        let binding = self.store.bind(full_url, &mut candidates)?;

        match &binding {
            Binding::Created(key) if key.as_str().len() > self.key_len => {
                info!(key = %key, url = full_url, "short key extended after collision");
            }
            Binding::Created(key) => info!(key = %key, url = full_url, "short link created"),
            Binding::Existing(key) => debug!(key = %key, url = full_url, "short link reused"),
        }

        Ok(binding.into_key())
    }

    /// Looks up the full URL for `raw_key`. Malformed keys are simply unknown.
    pub fn restore(&self, raw_key: &str) -> Result<Option<String>, LinkError> {
        match ShortKey::parse(raw_key) {
            Ok(key) => self.store.resolve(&key),
            Err(_) => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
struct Mappings {
    by_key: HashMap<ShortKey, String>,
    by_url: HashMap<String, ShortKey>,
}

/// Process-local store; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    inner: Mutex<Mappings>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Mappings> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LinkStore for MemoryLinkStore {
    fn bind(
        &self,
        url: &str,
        candidates: &mut dyn Iterator<Item = ShortKey>,
    ) -> Result<Binding, LinkError> {
        let mut map = self.lock();

        if let Some(key) = map.by_url.get(url) {
            return Ok(Binding::Existing(key.clone()));
        }

        for key in candidates {
            if map.by_key.contains_key(&key) {
                continue;
            }
            map.by_key.insert(key.clone(), url.to_owned());
            map.by_url.insert(url.to_owned(), key.clone());
            return Ok(Binding::Created(key));
        }

        Err(LinkError::KeySpaceExhausted(url.to_owned()))
    }

    fn resolve(&self, key: &ShortKey) -> Result<Option<String>, LinkError> {
        Ok(self.lock().by_key.get(key).cloned())
    }
}
