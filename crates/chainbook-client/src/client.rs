//! The client facade: authoritative snapshots and mutation entry points.
//!
//! A [`Client`] owns the single authoritative [`Connection`] snapshot,
//! the name-resolution cache, and the sync coordinator. The
//! presentation layer reads snapshots ([`snapshot`], [`contacts`],
//! [`names`]) and mutates only through [`connect`], [`sign_in`],
//! [`sign_out`], [`sync_contacts`], and [`add_contact`].
//!
//! The snapshot discipline: every transition reads the latest
//! snapshot, produces a new one through [`Connection::apply`], and
//! replaces the whole value under one lock. Nothing holds a lock
//! across an await, and callers re-read rather than caching snapshots.
//!
//! [`snapshot`]: Client::snapshot
//! [`contacts`]: Client::contacts
//! [`names`]: Client::names
//! [`connect`]: Client::connect
//! [`sign_in`]: Client::sign_in
//! [`sign_out`]: Client::sign_out
//! [`sync_contacts`]: Client::sync_contacts
//! [`add_contact`]: Client::add_contact

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chainbook_types::{
    Address, ChainbookError, ConnectionState, DirectoryApi, Result, SessionToken, VerifyOutcome,
};

use crate::connection::{Connection, ConnectionUpdate};
use crate::provider::{ProviderDetector, ProviderGateway, ProviderResult};
use crate::resolver::NameResolutionCache;
use crate::sync::ContactSyncCoordinator;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Wallet-authenticated contact book client.
pub struct Client {
    gateway: ProviderGateway,
    directory: Arc<dyn DirectoryApi>,
    connection: Mutex<Connection>,
    resolver: NameResolutionCache,
    coordinator: ContactSyncCoordinator,
}

impl Client {
    /// Creates a client over a provider detector and a directory
    /// service. The connection starts at `CheckingProvider`.
    pub fn new(detector: impl ProviderDetector + 'static, directory: Arc<dyn DirectoryApi>) -> Self {
        Self {
            gateway: ProviderGateway::new(detector),
            directory,
            connection: Mutex::new(Connection::new()),
            resolver: NameResolutionCache::new(),
            coordinator: ContactSyncCoordinator::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Read-only snapshots
    // -----------------------------------------------------------------------

    /// The latest authoritative connection snapshot.
    pub fn snapshot(&self) -> Connection {
        self.connection
            .lock()
            .map(|held| held.clone())
            .unwrap_or_default()
    }

    /// The held contact list, `None` until the first successful sync.
    pub fn contacts(&self) -> Option<Vec<Address>> {
        self.coordinator.contacts()
    }

    /// Snapshot of the published resolved-name mapping.
    pub fn names(&self) -> HashMap<Address, String> {
        self.resolver.names()
    }

    /// Whether a sync cycle is currently outstanding.
    pub fn is_syncing(&self) -> bool {
        self.coordinator.is_syncing()
    }

    /// The driving condition for a sync: contacts unknown AND a session
    /// token present AND no cycle already in flight. Evaluate once per
    /// token change, not by polling.
    pub fn needs_sync(&self) -> bool {
        self.current_token().is_some() && self.contacts().is_none() && !self.is_syncing()
    }

    // -----------------------------------------------------------------------
    // Provider detection
    // -----------------------------------------------------------------------

    /// Runs provider detection and advances the lifecycle accordingly.
    ///
    /// Idempotent: once a provider is held (or `NoProvider` was
    /// reached) repeated calls are no-ops. Detection itself is memoized
    /// by the gateway, so the environment is probed once per
    /// application lifetime.
    pub async fn connect(&self) -> Result<ConnectionState> {
        let current = self.snapshot();
        if current.provider().is_some() || current.state() == ConnectionState::NoProvider {
            return Ok(current.state());
        }

        let next = match self.gateway.detect().await {
            ProviderResult::Found(handle) => self.transition(
                ConnectionUpdate::to_state(ConnectionState::ProviderFound).with_provider(handle),
            )?,
            ProviderResult::NotFound => {
                self.transition(ConnectionUpdate::to_state(ConnectionState::NoProvider))?
            }
        };
        Ok(next.state())
    }

    // -----------------------------------------------------------------------
    // Sign-in protocol
    // -----------------------------------------------------------------------

    /// Drives the challenge/signature sign-in protocol to completion.
    ///
    /// Sequence: request accounts → issue challenge → sign → verify →
    /// store token. Any failing step returns the machine to
    /// `ProviderFound` with all partial state discarded; no partial
    /// token is ever observable.
    ///
    /// # Errors
    ///
    /// - [`ChainbookError::UserDeclined`] when the wallet refuses
    ///   account access or signing (retry available).
    /// - [`ChainbookError::SignatureRejected`] when the directory
    ///   refuses the signature (retry available).
    /// - [`ChainbookError::Transport`] for transient failures reaching
    ///   the directory.
    /// - [`ChainbookError::Contract`] when called without a detected
    ///   provider.
    pub async fn sign_in(&self) -> Result<Connection> {
        let current = self.snapshot();
        if current.state() == ConnectionState::SignedIn {
            return Ok(current);
        }
        let provider = match (current.state(), current.provider()) {
            (ConnectionState::ProviderFound, Some(handle)) => handle.clone(),
            _ => {
                return Err(ChainbookError::Contract {
                    reason: format!(
                        "sign-in requires a detected provider, connection is {}",
                        current.state()
                    ),
                })
            }
        };

        self.transition(ConnectionUpdate::to_state(ConnectionState::AwaitingAccount))?;

        let accounts = match provider.request_accounts().await {
            Ok(accounts) => accounts,
            Err(error) => {
                self.return_to_provider_found();
                return Err(error);
            }
        };
        let account = match accounts.first() {
            Some(account) => *account,
            None => {
                self.return_to_provider_found();
                return Err(ChainbookError::UserDeclined {
                    action: "account access".into(),
                });
            }
        };

        self.transition(
            ConnectionUpdate::to_state(ConnectionState::AwaitingSignature).with_account(account),
        )?;

        let challenge = match self.directory.issue_challenge(account).await {
            Ok(challenge) => challenge,
            Err(error) => {
                self.return_to_provider_found();
                return Err(error);
            }
        };

        let signature = match provider.sign_message(account, &challenge).await {
            Ok(signature) => signature,
            Err(error) => {
                self.return_to_provider_found();
                return Err(error);
            }
        };

        match self
            .directory
            .verify_signature(account, &challenge, &signature)
            .await
        {
            Ok(VerifyOutcome::Authorized(token)) => self.transition(
                ConnectionUpdate::to_state(ConnectionState::SignedIn).with_session_token(token),
            ),
            Ok(VerifyOutcome::Rejected) => {
                self.return_to_provider_found();
                Err(ChainbookError::SignatureRejected)
            }
            Err(error) => {
                self.return_to_provider_found();
                Err(error)
            }
        }
    }

    /// Ends the session: the connection returns to `CheckingProvider`
    /// and the contact list and name mapping are dropped.
    ///
    /// The provider detection memo is kept, so a subsequent
    /// [`connect`](Self::connect) re-attaches without probing again.
    pub fn sign_out(&self) -> Result<()> {
        self.transition(ConnectionUpdate::to_state(ConnectionState::CheckingProvider))?;
        self.coordinator.clear();
        self.resolver.clear();
        Ok(())
    }

    /// Ends the session AND discards the detected provider, so the next
    /// [`connect`](Self::connect) probes the environment again.
    pub fn disconnect_provider(&self) -> Result<()> {
        self.sign_out()?;
        self.gateway.discard();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Contacts
    // -----------------------------------------------------------------------

    /// Runs one contact sync cycle for the current session.
    ///
    /// See [`ContactSyncCoordinator::sync`] for the cycle's ordering
    /// and failure semantics.
    pub async fn sync_contacts(&self) -> Result<Vec<Address>> {
        let snapshot = self.snapshot();
        self.coordinator
            .sync(&snapshot, self.directory.as_ref(), &self.resolver, || {
                self.current_token()
            })
            .await
    }

    /// Stores a new contact at the directory, appends it to the held
    /// list, and resolves its name.
    ///
    /// The name lookup failing leaves the new contact unresolved; the
    /// add itself still succeeds.
    ///
    /// # Errors
    ///
    /// [`ChainbookError::Contract`] without an authenticated session;
    /// [`ChainbookError::Transport`] if the directory call fails (the
    /// held list is untouched).
    pub async fn add_contact(&self, contact: Address) -> Result<()> {
        let snapshot = self.snapshot();
        let (account, token) = match (snapshot.account(), snapshot.session_token()) {
            (Some(account), Some(token)) => (account, token.clone()),
            _ => {
                return Err(ChainbookError::Contract {
                    reason: "add-contact requires an authenticated session".into(),
                })
            }
        };

        self.directory.add_contact(account, &token, contact).await?;
        self.coordinator.append(contact);
        tracing::info!(address = %contact, "contact added");

        if let Some(provider) = snapshot.provider() {
            match self.resolver.resolve(provider.as_ref(), contact).await {
                Ok(Some(name)) => self.resolver.merge([(contact, name)]),
                Ok(None) => {}
                Err(error) => {
                    tracing::debug!(address = %contact, %error, "new contact left unresolved");
                }
            }
        }
        Ok(())
    }

    /// Resolves a single address through the wallet capability,
    /// publishing the name on success.
    pub async fn resolve_name(&self, address: Address) -> Result<Option<String>> {
        let snapshot = self.snapshot();
        let provider = snapshot.provider().ok_or_else(|| ChainbookError::Contract {
            reason: "name resolution requires a detected provider".into(),
        })?;

        let resolved = self.resolver.resolve(provider.as_ref(), address).await?;
        if let Some(name) = &resolved {
            self.resolver.merge([(address, name.clone())]);
        }
        Ok(resolved)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Applies an update to the latest snapshot and stores the result.
    ///
    /// Read, merge, and replace happen under one lock, serializing
    /// concurrent transitions against the same snapshot value.
    fn transition(&self, update: ConnectionUpdate) -> Result<Connection> {
        let mut held = self.connection.lock().map_err(|_| ChainbookError::Contract {
            reason: "connection snapshot lock poisoned".into(),
        })?;
        let next = held.apply(update)?;
        *held = next.clone();
        Ok(next)
    }

    /// Falls back to `ProviderFound` after a failed sign-in step.
    fn return_to_provider_found(&self) {
        if let Err(error) =
            self.transition(ConnectionUpdate::to_state(ConnectionState::ProviderFound))
        {
            tracing::error!(%error, "failed to reset connection after sign-in failure");
        }
    }

    /// Re-reads the session token from the latest snapshot.
    fn current_token(&self) -> Option<SessionToken> {
        self.connection
            .lock()
            .ok()
            .and_then(|held| held.session_token().cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{FixedDetector, MockDirectory, MockProvider};

    #[tokio::test]
    async fn connect_is_idempotent() -> Result<()> {
        let provider = Arc::new(MockProvider::new());
        let client = Client::new(
            FixedDetector::found(provider),
            Arc::new(MockDirectory::new()),
        );

        assert_eq!(client.connect().await?, ConnectionState::ProviderFound);
        assert_eq!(client.connect().await?, ConnectionState::ProviderFound);
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_without_provider_is_a_contract_violation() {
        let client = Client::new(FixedDetector::absent(), Arc::new(MockDirectory::new()));
        client.connect().await.expect("connect");

        let result = client.sign_in().await;
        assert!(matches!(result, Err(ChainbookError::Contract { .. })));
    }

    #[tokio::test]
    async fn sign_out_before_sign_in_is_rejected() {
        let provider = Arc::new(MockProvider::new());
        let client = Client::new(
            FixedDetector::found(provider),
            Arc::new(MockDirectory::new()),
        );
        client.connect().await.expect("connect");

        // provider_found -> checking_provider is not in the table.
        let result = client.sign_out();
        assert!(matches!(result, Err(ChainbookError::StateViolation { .. })));
    }
}
