//! Contact-list synchronization for the authenticated session.
//!
//! One sync cycle:
//!
//! 1. Fetch the contact list from the directory (single call). A
//!    transport failure here leaves the previously held list untouched.
//! 2. Replace the held list wholesale, preserving server order. This
//!    happens-before any name resolution for the cycle.
//! 3. Resolve every fetched address concurrently through the
//!    [`NameResolutionCache`]. Individual failures are dropped from the
//!    cycle's merge (a missing name is not a sync failure), but the
//!    cycle only completes once every lookup has settled.
//! 4. Bulk-merge the cycle's resolved names into the published mapping.
//!
//! The coordinator is single-flight: a second `sync` while one is
//! outstanding fails with `SyncInFlight`, and [`is_syncing`] is the
//! suppression hook for drivers. A stale-session guard keyed by
//! session-token identity re-reads the live snapshot before any state
//! is touched and again before the name merge, so a cycle that outlives
//! its session is discarded rather than merged.
//!
//! [`is_syncing`]: ContactSyncCoordinator::is_syncing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use futures::future::join_all;

use chainbook_types::{Address, ChainbookError, DirectoryApi, Result, SessionToken};

use crate::connection::Connection;
use crate::resolver::NameResolutionCache;

// ---------------------------------------------------------------------------
// ContactSyncCoordinator
// ---------------------------------------------------------------------------

/// Owns the session's contact list and the single-flight sync latch.
#[derive(Default)]
pub struct ContactSyncCoordinator {
    /// `None` until the first successful sync of the session.
    contacts: Mutex<Option<Vec<Address>>>,
    /// Single-flight latch.
    in_flight: AtomicBool,
}

/// Releases the single-flight latch on every exit path.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ContactSyncCoordinator {
    /// Creates a coordinator with no contacts known.
    pub fn new() -> Self {
        Self::default()
    }

    /// The held contact list: `None` until the session's first
    /// successful sync, the server-ordered list afterwards.
    pub fn contacts(&self) -> Option<Vec<Address>> {
        self.contacts.lock().map(|held| held.clone()).unwrap_or(None)
    }

    /// Whether a sync cycle is currently outstanding. Drivers use this
    /// to suppress duplicate triggers.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Appends a contact to the held list after a successful
    /// add-contact call.
    ///
    /// A no-op while the list is unknown — the next full sync fetches
    /// everything, including the new entry.
    pub fn append(&self, address: Address) {
        if let Ok(mut held) = self.contacts.lock() {
            if let Some(list) = held.as_mut() {
                if !list.contains(&address) {
                    list.push(address);
                }
            }
        }
    }

    /// Drops the held list. Called on session end.
    pub fn clear(&self) {
        if let Ok(mut held) = self.contacts.lock() {
            *held = None;
        }
    }

    /// Runs one sync cycle for the authenticated session in
    /// `connection`.
    ///
    /// `live_token` must re-read the session token from the latest
    /// authoritative snapshot; it keys the stale-session guard.
    ///
    /// # Errors
    ///
    /// - [`ChainbookError::Contract`] if `connection` carries no
    ///   account or session token — a caller bug, not a runtime
    ///   condition.
    /// - [`ChainbookError::SyncInFlight`] if a cycle is already
    ///   outstanding.
    /// - [`ChainbookError::Transport`] if the contact fetch fails; the
    ///   previously held list is untouched.
    /// - [`ChainbookError::StaleSession`] if the session token changed
    ///   while the cycle was in flight; the result is discarded.
    pub async fn sync(
        &self,
        connection: &Connection,
        directory: &dyn DirectoryApi,
        resolver: &NameResolutionCache,
        live_token: impl Fn() -> Option<SessionToken>,
    ) -> Result<Vec<Address>> {
        let account = connection.account().ok_or_else(|| ChainbookError::Contract {
            reason: "sync requires a selected account".into(),
        })?;
        let token = connection
            .session_token()
            .cloned()
            .ok_or_else(|| ChainbookError::Contract {
                reason: "sync requires a session token".into(),
            })?;
        let provider = connection
            .provider()
            .cloned()
            .ok_or_else(|| ChainbookError::Contract {
                reason: "sync requires a wallet provider".into(),
            })?;

        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(ChainbookError::SyncInFlight);
        }
        let _guard = FlightGuard(&self.in_flight);

        tracing::debug!(%account, "contact sync started");

        let fetched = directory.get_contacts(account, &token).await?;

        if live_token().as_ref() != Some(&token) {
            tracing::info!("session ended during contact fetch; discarding result");
            return Err(ChainbookError::StaleSession);
        }

        // Wholesale replacement, server order preserved. Happens-before
        // any resolution of this cycle's addresses.
        if let Ok(mut held) = self.contacts.lock() {
            *held = Some(fetched.clone());
        }

        // Resolve concurrently; the cycle completes only once every
        // lookup has settled.
        let settled = join_all(fetched.iter().map(|&address| {
            let provider = provider.clone();
            async move { (address, resolver.resolve(provider.as_ref(), address).await) }
        }))
        .await;

        let resolved: Vec<(Address, String)> = settled
            .into_iter()
            .filter_map(|(address, outcome)| match outcome {
                Ok(Some(name)) => Some((address, name)),
                Ok(None) => None,
                Err(error) => {
                    tracing::debug!(%address, %error, "name lookup failed; left unresolved");
                    None
                }
            })
            .collect();

        if live_token().as_ref() != Some(&token) {
            tracing::info!("session ended during name resolution; discarding result");
            return Err(ChainbookError::StaleSession);
        }

        let resolved_count = resolved.len();
        resolver.merge(resolved);

        tracing::info!(
            contacts = fetched.len(),
            resolved = resolved_count,
            "contact sync complete"
        );
        Ok(fetched)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
