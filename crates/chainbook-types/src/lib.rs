//! Core shared types for the chainbook wallet-authenticated contact book.
//!
//! This crate defines all fundamental types used across the workspace.
//! No other crate should define shared types — everything lives here,
//! including the capability traits ([`WalletProvider`], [`DirectoryApi`])
//! that the wallet and transport crates implement without depending on
//! the client core.

pub mod config;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Canonical account identifier: 20 bytes, rendered as `0x` + 40
/// lowercase hex characters.
///
/// Addresses key every mapping in the system (contact lists, name
/// resolution). Parsing accepts an optional `0x` prefix and mixed-case
/// hex and canonicalizes to the lowercase form, so two spellings of the
/// same account always compare equal.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The fixed byte length of an address.
    pub const LEN: usize = 20;

    /// Creates a new `Address` from raw bytes.
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ChainbookError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| ChainbookError::InvalidAddress {
            reason: "invalid hex encoding".into(),
        })?;
        if bytes.len() != Self::LEN {
            return Err(ChainbookError::InvalidAddress {
                reason: format!("expected {} bytes, got {}", Self::LEN, bytes.len()),
            });
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

// Wire representation is the canonical hex string, not a byte array.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SessionToken
// ---------------------------------------------------------------------------

/// Opaque credential proving a completed wallet-signature challenge.
///
/// Required on every authenticated directory call. `Debug` and
/// `Display` are redacted so tokens never end up in logs; transports
/// read the raw value through [`SessionToken::as_str`].
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for transport attachment.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken(…)")
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "…")
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Raw signature bytes produced by a wallet capability.
///
/// The byte layout is wallet-scheme specific; the core treats it as
/// opaque material forwarded to the directory service for verification.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Wraps raw signature bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle state of the wallet connection.
///
/// The state machine in `chainbook-client` is the single source of
/// truth for which transitions are legal; consumers must never infer
/// state from field presence.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Provider detection has not completed yet.
    CheckingProvider,
    /// No wallet capability is available. Terminal for this run.
    NoProvider,
    /// A wallet capability is available; sign-in may be attempted.
    ProviderFound,
    /// An account request is in flight at the wallet.
    AwaitingAccount,
    /// The account is selected; the challenge signature is pending.
    AwaitingSignature,
    /// The challenge was verified and a session token is held.
    SignedIn,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckingProvider => write!(f, "checking_provider"),
            Self::NoProvider => write!(f, "no_provider"),
            Self::ProviderFound => write!(f, "provider_found"),
            Self::AwaitingAccount => write!(f, "awaiting_account"),
            Self::AwaitingSignature => write!(f, "awaiting_signature"),
            Self::SignedIn => write!(f, "signed_in"),
        }
    }
}

// ---------------------------------------------------------------------------
// VerifyOutcome
// ---------------------------------------------------------------------------

/// Result of submitting a challenge signature to the directory.
///
/// Rejection is a normal protocol outcome (the machine returns to
/// `ProviderFound`), distinct from a transport failure reaching the
/// directory at all.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerifyOutcome {
    /// The signature proved account ownership; a session was issued.
    Authorized(SessionToken),
    /// The directory refused the signature.
    Rejected,
}

// ---------------------------------------------------------------------------
// ChainbookError
// ---------------------------------------------------------------------------

/// Central error type for the chainbook system.
///
/// All crates in the workspace convert their internal errors into
/// variants of this enum, ensuring a unified error handling surface.
/// Absence conditions (no provider, no resolved name, no session) are
/// represented in data, never as errors.
#[derive(Debug, Error)]
pub enum ChainbookError {
    /// The provided address is malformed.
    #[error("invalid address: {reason}")]
    InvalidAddress {
        /// Why the address failed to parse.
        reason: String,
    },

    /// The wallet declined an account or signing request.
    ///
    /// The state machine returns to its last stable pre-authentication
    /// state; a retry is available.
    #[error("wallet declined {action}")]
    UserDeclined {
        /// What the wallet refused ("account access", "signature").
        action: String,
    },

    /// The directory service refused the challenge signature.
    #[error("signature rejected by the directory service")]
    SignatureRejected,

    /// A transient network failure.
    ///
    /// Post-authentication calls that come back token-rejected are
    /// folded into this variant: locally retryable, never a trigger for
    /// automatic re-authentication.
    #[error("transport error: {reason}")]
    Transport {
        /// Human-readable description of the failure.
        reason: String,
    },

    /// A connection-state transition not present in the lifecycle table.
    #[error("illegal connection transition: {from} -> {to}")]
    StateViolation {
        /// State the transition started from.
        from: ConnectionState,
        /// State the transition requested.
        to: ConnectionState,
    },

    /// A caller contract violation (e.g. sync without a session).
    ///
    /// Not a runtime condition: never retry, fix the caller.
    #[error("contract violation: {reason}")]
    Contract {
        /// Which precondition the caller broke.
        reason: String,
    },

    /// A sync was requested while one is already in flight.
    #[error("contact sync already in flight")]
    SyncInFlight,

    /// An in-flight sync outlived its session; its result was discarded.
    #[error("session ended while sync was in flight; result discarded")]
    StaleSession,

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// A keystore file operation failed.
    #[error("keystore error: {reason}")]
    KeystoreError {
        /// Human-readable description of the keystore failure.
        reason: String,
    },
}

/// Convenience result type using [`ChainbookError`].
pub type Result<T> = std::result::Result<T, ChainbookError>;

// ---------------------------------------------------------------------------
// WalletProvider capability
// ---------------------------------------------------------------------------

/// The wallet capability the core drives.
///
/// Implemented by `chainbook-wallet` for local keystores and by test
/// doubles. Absence of any implementation is a first-class state
/// (`ConnectionState::NoProvider`), not an error — this trait only
/// exists once a capability has been detected.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Requests the wallet's accounts, in wallet preference order.
    ///
    /// # Errors
    ///
    /// [`ChainbookError::UserDeclined`] if the wallet refuses access,
    /// [`ChainbookError::Transport`] for capability-level failures.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// Signs `message` with the key behind `account`
    /// (`personal_sign`-equivalent).
    ///
    /// # Errors
    ///
    /// [`ChainbookError::UserDeclined`] if the wallet refuses to sign.
    async fn sign_message(&self, account: Address, message: &str) -> Result<Signature>;

    /// Resolves an address to its registered human-readable name.
    ///
    /// Returns `Ok(None)` when the address has no registered name —
    /// an absence, not a failure. Transient lookup failures are
    /// [`ChainbookError::Transport`] and must never be conflated with
    /// `None` by callers.
    async fn lookup_name(&self, address: Address) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// DirectoryApi collaborator
// ---------------------------------------------------------------------------

/// The backend authentication and contact-storage service.
///
/// A black-box request/response collaborator: `chainbook-http` speaks
/// the real wire protocol, tests substitute doubles. Every
/// post-authentication call carries the session token; implementations
/// must fold a token-rejected response into
/// [`ChainbookError::Transport`] so callers retry locally instead of
/// re-authenticating.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Issues a single-use challenge nonce for `account`.
    async fn issue_challenge(&self, account: Address) -> Result<String>;

    /// Submits the signed challenge for verification.
    ///
    /// Returns [`VerifyOutcome::Rejected`] when the directory refuses
    /// the signature; transport failures are errors.
    async fn verify_signature(
        &self,
        account: Address,
        challenge: &str,
        signature: &Signature,
    ) -> Result<VerifyOutcome>;

    /// Fetches the contact list for the authenticated account,
    /// in server-defined order.
    async fn get_contacts(&self, account: Address, token: &SessionToken) -> Result<Vec<Address>>;

    /// Stores a new contact for the authenticated account.
    async fn add_contact(
        &self,
        account: Address,
        token: &SessionToken,
        contact: Address,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
