//! Test doubles for the capability traits.
//!
//! Public so integration tests (and downstream crates' tests) can drive
//! the core without a real wallet or directory. Every double counts its
//! calls, and the slow paths can be gated to make in-flight interleavings
//! deterministic.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use chainbook_types::{
    Address, ChainbookError, DirectoryApi, Result, SessionToken, Signature, VerifyOutcome,
    WalletProvider,
};

use crate::connection::ProviderHandle;
use crate::provider::ProviderDetector;

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Two-phase rendezvous for freezing a mock mid-call.
///
/// The mock side calls [`pass`](Gate::pass): it announces arrival and
/// then blocks until the test side [`open`](Gate::open)s the gate. The
/// test side can [`wait_entered`](Gate::wait_entered) to know the mock
/// has arrived before acting.
#[derive(Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Creates a closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock side: announce arrival, then wait for the gate to open.
    pub async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }

    /// Test side: wait until the mock has arrived at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Test side: let the mock through.
    pub fn open(&self) {
        self.release.notify_one();
    }
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

/// Scriptable wallet capability.
pub struct MockProvider {
    accounts: Vec<Address>,
    names: HashMap<Address, String>,
    failing_lookups: HashSet<Address>,
    gated_lookups: HashMap<Address, Gate>,
    decline_accounts: AtomicBool,
    decline_signing: AtomicBool,
    lookup_calls: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl MockProvider {
    /// A provider with one default account and no names.
    pub fn new() -> Self {
        Self {
            accounts: vec![Address::new([0xAA; 20])],
            names: HashMap::new(),
            failing_lookups: HashSet::new(),
            gated_lookups: HashMap::new(),
            decline_accounts: AtomicBool::new(false),
            decline_signing: AtomicBool::new(false),
            lookup_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// Replaces the account list.
    pub fn with_accounts(mut self, accounts: Vec<Address>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Registers a resolvable name.
    pub fn with_name(mut self, address: Address, name: &str) -> Self {
        self.names.insert(address, name.to_string());
        self
    }

    /// Makes lookups for `address` fail transiently.
    pub fn with_failing_lookup(mut self, address: Address) -> Self {
        self.failing_lookups.insert(address);
        self
    }

    /// Freezes lookups for `address` on the returned gate.
    pub fn with_gated_lookup(mut self, address: Address) -> (Self, Gate) {
        let gate = Gate::new();
        self.gated_lookups.insert(address, gate.clone());
        (self, gate)
    }

    /// Declines account requests from now on.
    pub fn decline_accounts(&self) {
        self.decline_accounts.store(true, Ordering::SeqCst);
    }

    /// Declines signature requests from now on.
    pub fn decline_signing(&self) {
        self.decline_signing.store(true, Ordering::SeqCst);
    }

    /// Number of `lookup_name` calls served.
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    /// Number of `sign_message` calls served.
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        if self.decline_accounts.load(Ordering::SeqCst) {
            return Err(ChainbookError::UserDeclined {
                action: "account access".into(),
            });
        }
        Ok(self.accounts.clone())
    }

    async fn sign_message(&self, account: Address, message: &str) -> Result<Signature> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.decline_signing.load(Ordering::SeqCst) {
            return Err(ChainbookError::UserDeclined {
                action: "signature".into(),
            });
        }
        // Deterministic fake signature over account + message.
        let mut bytes = account.as_bytes().to_vec();
        bytes.extend_from_slice(message.as_bytes());
        Ok(Signature::new(bytes))
    }

    async fn lookup_name(&self, address: Address) -> Result<Option<String>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gated_lookups.get(&address) {
            gate.pass().await;
        }
        if self.failing_lookups.contains(&address) {
            return Err(ChainbookError::Transport {
                reason: "name service unreachable".into(),
            });
        }
        Ok(self.names.get(&address).cloned())
    }
}

// ---------------------------------------------------------------------------
// MockDirectory
// ---------------------------------------------------------------------------

/// Scriptable directory service.
pub struct MockDirectory {
    contacts: Mutex<Vec<Address>>,
    reject_signatures: AtomicBool,
    fail_verification: AtomicBool,
    fail_fetch: AtomicBool,
    fetch_gate: Option<Gate>,
    challenge_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    add_calls: AtomicUsize,
    issued_tokens: AtomicUsize,
}

impl MockDirectory {
    /// A directory that accepts every signature and holds no contacts.
    pub fn new() -> Self {
        Self {
            contacts: Mutex::new(Vec::new()),
            reject_signatures: AtomicBool::new(false),
            fail_verification: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fetch_gate: None,
            challenge_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            add_calls: AtomicUsize::new(0),
            issued_tokens: AtomicUsize::new(0),
        }
    }

    /// Seeds the stored contact list (server order).
    pub fn with_contacts(self, contacts: Vec<Address>) -> Self {
        if let Ok(mut held) = self.contacts.lock() {
            *held = contacts;
        }
        self
    }

    /// Replaces the stored contact list after construction.
    pub fn set_contacts(&self, contacts: Vec<Address>) {
        if let Ok(mut held) = self.contacts.lock() {
            *held = contacts;
        }
    }

    /// Rejects every submitted signature.
    pub fn rejecting_signatures(self) -> Self {
        self.reject_signatures.store(true, Ordering::SeqCst);
        self
    }

    /// Fails verification with a transport error.
    pub fn with_failing_verification(self) -> Self {
        self.fail_verification.store(true, Ordering::SeqCst);
        self
    }

    /// Fails contact fetches with a transport error from now on.
    pub fn fail_fetches(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    /// Freezes contact fetches on the returned gate.
    pub fn with_fetch_gate(mut self) -> (Self, Gate) {
        let gate = Gate::new();
        self.fetch_gate = Some(gate.clone());
        (self, gate)
    }

    /// Number of challenges issued.
    pub fn challenge_calls(&self) -> usize {
        self.challenge_calls.load(Ordering::SeqCst)
    }

    /// Number of verification attempts served.
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Number of contact fetches served.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of add-contact calls served.
    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryApi for MockDirectory {
    async fn issue_challenge(&self, account: Address) -> Result<String> {
        let n = self.challenge_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("nonce-{n}-{account}"))
    }

    async fn verify_signature(
        &self,
        _account: Address,
        _challenge: &str,
        _signature: &Signature,
    ) -> Result<VerifyOutcome> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_verification.load(Ordering::SeqCst) {
            return Err(ChainbookError::Transport {
                reason: "verification endpoint unreachable".into(),
            });
        }
        if self.reject_signatures.load(Ordering::SeqCst) {
            return Ok(VerifyOutcome::Rejected);
        }
        let n = self.issued_tokens.fetch_add(1, Ordering::SeqCst);
        Ok(VerifyOutcome::Authorized(SessionToken::new(format!(
            "session-{n}"
        ))))
    }

    async fn get_contacts(&self, _account: Address, _token: &SessionToken) -> Result<Vec<Address>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.fetch_gate {
            gate.pass().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ChainbookError::Transport {
                reason: "contact endpoint unreachable".into(),
            });
        }
        Ok(self.contacts.lock().map(|held| held.clone()).unwrap_or_default())
    }

    async fn add_contact(
        &self,
        _account: Address,
        _token: &SessionToken,
        contact: Address,
    ) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut held) = self.contacts.lock() {
            held.push(contact);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FixedDetector
// ---------------------------------------------------------------------------

/// Detector that always answers the same way.
pub struct FixedDetector(Option<ProviderHandle>);

impl FixedDetector {
    /// A detector that finds `provider`.
    pub fn found(provider: ProviderHandle) -> Self {
        Self(Some(provider))
    }

    /// A detector for an environment without a wallet.
    pub fn absent() -> Self {
        Self(None)
    }
}

#[async_trait]
impl ProviderDetector for FixedDetector {
    async fn detect(&self) -> Option<ProviderHandle> {
        self.0.clone()
    }
}
