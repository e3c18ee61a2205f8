//! Ed25519 signer behind the wallet capability.
//!
//! # Address derivation
//!
//! ```text
//! address = SHA3-256(public_key)[..20]
//! ```
//!
//! # Message signing
//!
//! `sign_message` is the `personal_sign` equivalent: the signed bytes
//! are the UTF-8 message prefixed with a fixed domain separator, so a
//! sign-in challenge signature can never double as a signature over
//! anything else.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha3::{Digest, Sha3_256};

use chainbook_types::{Address, ChainbookError, Result, Signature, WalletProvider};

/// Domain separator prefixed to every signed message.
pub const SIGNING_DOMAIN: &[u8] = b"chainbook-signin-v1:";

// ---------------------------------------------------------------------------
// LocalWallet
// ---------------------------------------------------------------------------

/// A wallet capability backed by a locally held Ed25519 key.
pub struct LocalWallet {
    signing_key: SigningKey,
    address: Address,
}

impl LocalWallet {
    /// Generates a wallet with a fresh random key.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Builds a wallet from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = derive_address(&signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// The wallet's account address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The public half of the signing key, for verification.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The raw seed bytes, for keystore persistence.
    pub(crate) fn seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

/// Derives the account address from a public key.
pub fn derive_address(pubkey: &VerifyingKey) -> Address {
    let digest = Sha3_256::digest(pubkey.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Address::new(bytes)
}

/// The exact bytes signed for a message (domain separator + UTF-8).
pub fn signable_bytes(message: &str) -> Vec<u8> {
    let mut bytes = SIGNING_DOMAIN.to_vec();
    bytes.extend_from_slice(message.as_bytes());
    bytes
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        Ok(vec![self.address])
    }

    async fn sign_message(&self, account: Address, message: &str) -> Result<Signature> {
        if account != self.address {
            // The keystore only holds one key; a request for any other
            // account is declined like a foreign-account prompt.
            return Err(ChainbookError::UserDeclined {
                action: format!("signature for unknown account {account}"),
            });
        }
        let signature = self.signing_key.sign(&signable_bytes(message));
        Ok(Signature::new(signature.to_bytes().to_vec()))
    }

    async fn lookup_name(&self, address: Address) -> Result<Option<String>> {
        // A local keystore carries no naming directory: every address
        // is simply unregistered, which is an absence, not a failure.
        tracing::trace!(%address, "local wallet has no naming directory");
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn same_seed_same_address() {
        let a = LocalWallet::from_seed([0x42; 32]);
        let b = LocalWallet::from_seed([0x42; 32]);
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn different_seed_different_address() {
        let a = LocalWallet::from_seed([0x01; 32]);
        let b = LocalWallet::from_seed([0x02; 32]);
        assert_ne!(a.address(), b.address());
    }

    #[tokio::test]
    async fn request_accounts_returns_the_wallet_address() -> Result<()> {
        let wallet = LocalWallet::from_seed([0x42; 32]);
        assert_eq!(wallet.request_accounts().await?, vec![wallet.address()]);
        Ok(())
    }

    #[tokio::test]
    async fn signature_verifies_over_domain_separated_bytes() -> Result<()> {
        let wallet = LocalWallet::from_seed([0x42; 32]);
        let signature = wallet.sign_message(wallet.address(), "nonce-123").await?;

        let raw: [u8; 64] = signature
            .as_bytes()
            .try_into()
            .expect("ed25519 signature is 64 bytes");
        let sig = ed25519_dalek::Signature::from_bytes(&raw);

        assert!(wallet
            .verifying_key()
            .verify(&signable_bytes("nonce-123"), &sig)
            .is_ok());
        // The bare message must NOT verify — the domain prefix binds it.
        assert!(wallet
            .verifying_key()
            .verify(b"nonce-123", &sig)
            .is_err());
        Ok(())
    }

    #[tokio::test]
    async fn signing_for_foreign_account_is_declined() {
        let wallet = LocalWallet::from_seed([0x42; 32]);
        let other = Address::new([0xEE; 20]);
        let result = wallet.sign_message(other, "nonce").await;
        assert!(matches!(result, Err(ChainbookError::UserDeclined { .. })));
    }

    #[tokio::test]
    async fn lookup_name_is_always_absent() -> Result<()> {
        let wallet = LocalWallet::from_seed([0x42; 32]);
        assert_eq!(wallet.lookup_name(Address::new([1; 20])).await?, None);
        Ok(())
    }
}
