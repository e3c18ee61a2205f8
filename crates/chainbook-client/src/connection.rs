//! Connection snapshots and the lifecycle transition function.
//!
//! A [`Connection`] is an immutable snapshot of the wallet session:
//! lifecycle state, detected provider, selected account, session token.
//! [`Connection::apply`] is the only way to produce the next snapshot —
//! it merges a partial update, enforces the lifecycle table, and logs
//! every observable change. Consumers always replace whole snapshots;
//! no field is ever mutated in place.
//!
//! # Lifecycle table
//!
//! ```text
//! CheckingProvider ── provider detected ──▶ ProviderFound
//! CheckingProvider ── provider absent ────▶ NoProvider (terminal)
//! ProviderFound ──── account requested ──▶ AwaitingAccount
//! ProviderFound ──── account selected ───▶ AwaitingSignature
//! AwaitingAccount ── account selected ───▶ AwaitingSignature
//! AwaitingAccount ── declined / failed ──▶ ProviderFound
//! AwaitingSignature ─ verified ──────────▶ SignedIn
//! AwaitingSignature ─ rejected / failed ─▶ ProviderFound
//! SignedIn ───────── sign-out ───────────▶ CheckingProvider
//! ```
//!
//! Re-entering the current state is a no-op, so duplicate triggers
//! reacting to the same condition are harmless.

use std::fmt;
use std::sync::Arc;

use chainbook_types::{
    Address, ChainbookError, ConnectionState, Result, SessionToken, WalletProvider,
};

/// Shared handle to a detected wallet capability.
pub type ProviderHandle = Arc<dyn WalletProvider>;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Immutable snapshot of the wallet session.
///
/// Fields are private: the transition function is the single source of
/// truth for which combinations are valid. The invariants it maintains:
///
/// - `account` is present only at `AwaitingSignature` and `SignedIn`.
/// - `session_token` is present only at `SignedIn`.
/// - `provider` is absent at `CheckingProvider` and `NoProvider`.
#[derive(Clone)]
pub struct Connection {
    state: ConnectionState,
    provider: Option<ProviderHandle>,
    account: Option<Address>,
    session_token: Option<SessionToken>,
}

impl Connection {
    /// Creates the initial snapshot: `CheckingProvider`, nothing held.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::CheckingProvider,
            provider: None,
            account: None,
            session_token: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The detected wallet capability, if any.
    pub fn provider(&self) -> Option<&ProviderHandle> {
        self.provider.as_ref()
    }

    /// The selected account, if the lifecycle has established one.
    pub fn account(&self) -> Option<Address> {
        self.account
    }

    /// The held session token, if signed in.
    pub fn session_token(&self) -> Option<&SessionToken> {
        self.session_token.as_ref()
    }

    /// Produces the next snapshot from a partial update.
    ///
    /// The merge itself has no side effect beyond `tracing` audit logs.
    /// An update targeting the current state merges fields and is
    /// otherwise a no-op; an update targeting a state the table does
    /// not reach from here fails with
    /// [`ChainbookError::StateViolation`]; an update entering a state
    /// without the data that state requires fails with
    /// [`ChainbookError::Contract`]. On failure the current snapshot
    /// stands untouched — transitions are fully applied or fully
    /// rejected.
    pub fn apply(&self, update: ConnectionUpdate) -> Result<Connection> {
        let target = update.state.unwrap_or(self.state);

        if target != self.state && !table_allows(self.state, target) {
            return Err(ChainbookError::StateViolation {
                from: self.state,
                to: target,
            });
        }

        // Merge: explicit fields win, everything else carries over.
        let mut next = Connection {
            state: target,
            provider: update.provider.or_else(|| self.provider.clone()),
            account: update.account.or(self.account),
            session_token: update.session_token.or_else(|| self.session_token.clone()),
        };

        // Per-state invariants. Entering a pre-auth state drops the
        // partial data the table tells us to discard; entering a state
        // without its required data is a caller bug.
        match target {
            ConnectionState::CheckingProvider | ConnectionState::NoProvider => {
                next.provider = None;
                next.account = None;
                next.session_token = None;
            }
            ConnectionState::ProviderFound | ConnectionState::AwaitingAccount => {
                if next.provider.is_none() {
                    return Err(ChainbookError::Contract {
                        reason: format!("entering {target} requires a provider handle"),
                    });
                }
                next.account = None;
                next.session_token = None;
            }
            ConnectionState::AwaitingSignature => {
                if next.provider.is_none() || next.account.is_none() {
                    return Err(ChainbookError::Contract {
                        reason: "entering awaiting_signature requires a provider and an account"
                            .into(),
                    });
                }
                next.session_token = None;
            }
            ConnectionState::SignedIn => {
                if next.provider.is_none() || next.account.is_none() || next.session_token.is_none()
                {
                    return Err(ChainbookError::Contract {
                        reason: "entering signed_in requires a provider, an account, and a token"
                            .into(),
                    });
                }
            }
        }

        self.log_changes(&next);
        Ok(next)
    }

    /// Audit log for every observable change (state, account, token
    /// presence, provider presence).
    fn log_changes(&self, next: &Connection) {
        if next.state != self.state {
            tracing::info!(from = %self.state, to = %next.state, "connection state changed");
        }
        if next.account != self.account {
            match next.account {
                Some(account) => tracing::info!(%account, "account selected"),
                None => tracing::debug!("account cleared"),
            }
        }
        if next.session_token.is_some() != self.session_token.is_some() {
            if next.session_token.is_some() {
                tracing::info!("session token acquired");
            } else {
                tracing::info!("session token cleared");
            }
        }
        if next.provider.is_some() != self.provider.is_some() {
            if next.provider.is_some() {
                tracing::info!("provider set");
            } else {
                tracing::debug!("provider cleared");
            }
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("provider", &self.provider.is_some())
            .field("account", &self.account)
            .field("session_token", &self.session_token.is_some())
            .finish()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        let providers_match = match (&self.provider, &other.provider) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        providers_match
            && self.state == other.state
            && self.account == other.account
            && self.session_token == other.session_token
    }
}

// ---------------------------------------------------------------------------
// ConnectionUpdate
// ---------------------------------------------------------------------------

/// Partial update merged into a [`Connection`] snapshot.
///
/// Unset fields carry the current value over. There is no way to clear
/// a field directly — clearing happens as a consequence of the target
/// state's invariants.
#[derive(Default)]
pub struct ConnectionUpdate {
    state: Option<ConnectionState>,
    provider: Option<ProviderHandle>,
    account: Option<Address>,
    session_token: Option<SessionToken>,
}

impl ConnectionUpdate {
    /// An update that moves the lifecycle to `state`.
    pub fn to_state(state: ConnectionState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// Stores the detected provider handle.
    pub fn with_provider(mut self, provider: ProviderHandle) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Stores the selected account.
    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    /// Stores the issued session token.
    pub fn with_session_token(mut self, token: SessionToken) -> Self {
        self.session_token = Some(token);
        self
    }
}

// ---------------------------------------------------------------------------
// Lifecycle table
// ---------------------------------------------------------------------------

/// Returns `true` if the lifecycle table contains the edge `from → to`.
fn table_allows(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;
    matches!(
        (from, to),
        (CheckingProvider, ProviderFound)
            | (CheckingProvider, NoProvider)
            | (ProviderFound, AwaitingAccount)
            | (ProviderFound, AwaitingSignature)
            | (AwaitingAccount, AwaitingSignature)
            | (AwaitingAccount, ProviderFound)
            | (AwaitingSignature, SignedIn)
            | (AwaitingSignature, ProviderFound)
            | (SignedIn, CheckingProvider)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
