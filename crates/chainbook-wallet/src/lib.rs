//! Local keystore wallet for chainbook.
//!
//! Implements the [`chainbook_types::WalletProvider`] capability with
//! an Ed25519 key held in an on-disk keystore file, plus the
//! [`KeystoreDetector`] that turns "does a keystore exist here?" into
//! the provider-detection answer the client core expects. A missing
//! keystore is a normal outcome (no provider), never an error.

pub mod keystore;
pub mod signer;

pub use keystore::{read_keystore, write_keystore, KeystoreDetector, KEYSTORE_VERSION};
pub use signer::LocalWallet;
