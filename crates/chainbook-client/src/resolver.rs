//! Address-to-name resolution with session-lifetime memoization.
//!
//! The cache holds two layers:
//!
//! - **Settled lookups** — every lookup that completed, including the
//!   explicit "no registered name" answer. Settled entries are add-only
//!   for the session and never re-queried. Transient lookup failures
//!   are NOT settled: they propagate to the caller and leave no entry,
//!   so the address is retried on the next cycle.
//! - **Published names** — the mapping the presentation layer reads.
//!   The sync coordinator merges a cycle's resolved names into it in
//!   one bulk step after every lookup of the cycle has settled, so
//!   consumers never observe a half-updated cycle.
//!
//! All state is behind `std::sync::Mutex`, never held across an await,
//! so concurrent resolution of distinct addresses proceeds
//! independently.

use std::collections::HashMap;
use std::sync::Mutex;

use chainbook_types::{Address, Result, WalletProvider};

// ---------------------------------------------------------------------------
// NameResolutionCache
// ---------------------------------------------------------------------------

/// Memoizing resolver over the wallet capability's name lookup.
#[derive(Default)]
pub struct NameResolutionCache {
    /// Settled lookups: `Some(name)` or the explicit `None` answer.
    entries: Mutex<HashMap<Address, Option<String>>>,
    /// Published resolved-name mapping, merged in bulk per cycle.
    names: Mutex<HashMap<Address, String>>,
}

impl NameResolutionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `address` to its registered name, memoizing the
    /// settled answer.
    ///
    /// Returns `Ok(None)` when the address has no registered name —
    /// that answer is cached and the lookup is never repeated. A
    /// transient failure propagates as
    /// [`chainbook_types::ChainbookError::Transport`] and caches
    /// nothing, so a later call retries.
    pub async fn resolve(
        &self,
        provider: &dyn WalletProvider,
        address: Address,
    ) -> Result<Option<String>> {
        if let Some(settled) = self.settled(&address) {
            return Ok(settled);
        }

        let resolved = provider.lookup_name(address).await?;

        match &resolved {
            Some(name) => tracing::debug!(%address, name, "address resolved"),
            None => tracing::debug!(%address, "address has no registered name"),
        }

        if let Ok(mut entries) = self.entries.lock() {
            // Add-only: if a concurrent lookup settled first, keep it.
            entries.entry(address).or_insert_with(|| resolved.clone());
        }
        Ok(resolved)
    }

    /// Merges a cycle's resolved names into the published mapping.
    ///
    /// Append-only: entries for addresses outside the batch are
    /// retained for the session.
    pub fn merge(&self, batch: impl IntoIterator<Item = (Address, String)>) {
        if let Ok(mut names) = self.names.lock() {
            names.extend(batch);
        }
    }

    /// Snapshot of the published name mapping.
    pub fn names(&self) -> HashMap<Address, String> {
        self.names.lock().map(|names| names.clone()).unwrap_or_default()
    }

    /// The published name for one address, if any.
    pub fn name_of(&self, address: &Address) -> Option<String> {
        self.names.lock().ok()?.get(address).cloned()
    }

    /// Number of settled lookups held.
    ///
    /// Useful for monitoring and tests.
    pub fn settled_count(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Drops everything. Called on session end.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if let Ok(mut names) = self.names.lock() {
            names.clear();
        }
    }

    fn settled(&self, address: &Address) -> Option<Option<String>> {
        self.entries.lock().ok()?.get(address).cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chainbook_types::{ChainbookError, Signature};

    /// Provider double with scripted names and a lookup counter.
    struct ScriptedProvider {
        names: HashMap<Address, String>,
        failing: Vec<Address>,
        lookups: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                names: HashMap::new(),
                failing: Vec::new(),
                lookups: AtomicUsize::new(0),
            }
        }

        fn with_name(mut self, address: Address, name: &str) -> Self {
            self.names.insert(address, name.to_string());
            self
        }

        fn with_failure(mut self, address: Address) -> Self {
            self.failing.push(address);
            self
        }

        fn lookup_count(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WalletProvider for ScriptedProvider {
        async fn request_accounts(&self) -> Result<Vec<Address>> {
            Ok(vec![])
        }

        async fn sign_message(&self, _account: Address, _message: &str) -> Result<Signature> {
            Ok(Signature::new(vec![]))
        }

        async fn lookup_name(&self, address: Address) -> Result<Option<String>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&address) {
                return Err(ChainbookError::Transport {
                    reason: "name service unreachable".into(),
                });
            }
            Ok(self.names.get(&address).cloned())
        }
    }

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[tokio::test]
    async fn resolve_is_idempotent() -> Result<()> {
        let provider = ScriptedProvider::new().with_name(addr(1), "alice");
        let cache = NameResolutionCache::new();

        let first = cache.resolve(&provider, addr(1)).await?;
        let second = cache.resolve(&provider, addr(1)).await?;

        assert_eq!(first, Some("alice".to_string()));
        assert_eq!(first, second);
        assert_eq!(provider.lookup_count(), 1, "second call must hit the cache");
        Ok(())
    }

    #[tokio::test]
    async fn explicit_no_name_is_cached() -> Result<()> {
        let provider = ScriptedProvider::new();
        let cache = NameResolutionCache::new();

        assert_eq!(cache.resolve(&provider, addr(2)).await?, None);
        assert_eq!(cache.resolve(&provider, addr(2)).await?, None);
        assert_eq!(provider.lookup_count(), 1);
        assert_eq!(cache.settled_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn transient_failure_is_not_cached() {
        let provider = ScriptedProvider::new().with_failure(addr(3));
        let cache = NameResolutionCache::new();

        let result = cache.resolve(&provider, addr(3)).await;
        assert!(matches!(result, Err(ChainbookError::Transport { .. })));
        assert_eq!(cache.settled_count(), 0, "failure must not settle");

        // The same address is retried, not served a stale negative.
        let result = cache.resolve(&provider, addr(3)).await;
        assert!(result.is_err());
        assert_eq!(provider.lookup_count(), 2);
    }

    #[tokio::test]
    async fn distinct_addresses_resolve_independently() -> Result<()> {
        let provider = ScriptedProvider::new()
            .with_name(addr(4), "bob")
            .with_failure(addr(5));
        let cache = NameResolutionCache::new();

        assert_eq!(cache.resolve(&provider, addr(4)).await?, Some("bob".into()));
        assert!(cache.resolve(&provider, addr(5)).await.is_err());
        assert_eq!(cache.settled_count(), 1);
        Ok(())
    }

    #[test]
    fn merge_is_append_only() {
        let cache = NameResolutionCache::new();
        cache.merge([(addr(1), "alice".to_string())]);
        cache.merge([(addr(2), "bob".to_string())]);

        let names = cache.names();
        assert_eq!(names.len(), 2);
        assert_eq!(names.get(&addr(1)), Some(&"alice".to_string()));
        assert_eq!(names.get(&addr(2)), Some(&"bob".to_string()));
    }

    #[test]
    fn clear_drops_both_layers() {
        let cache = NameResolutionCache::new();
        cache.merge([(addr(1), "alice".to_string())]);
        cache.clear();
        assert!(cache.names().is_empty());
        assert_eq!(cache.settled_count(), 0);
    }

    #[tokio::test]
    async fn published_mapping_untouched_by_resolve() -> Result<()> {
        // resolve() settles the memo but publication is the sync
        // cycle's bulk merge; nothing shows up in names() early.
        let provider = ScriptedProvider::new().with_name(addr(6), "carol");
        let cache = NameResolutionCache::new();

        let resolved = cache.resolve(&provider, addr(6)).await?;
        assert_eq!(resolved, Some("carol".into()));
        assert!(cache.names().is_empty());

        cache.merge([(addr(6), "carol".to_string())]);
        assert_eq!(cache.name_of(&addr(6)), Some("carol".into()));
        Ok(())
    }
}
