//! Core client logic for chainbook: provider detection, the connection
//! state machine, name resolution, and contact synchronization.
//!
//! The pieces compose as follows: a [`ProviderGateway`] supplies the
//! wallet capability, the connection state machine
//! ([`Connection::apply`]) drives it through the sign-in lifecycle, and
//! once a session exists the [`ContactSyncCoordinator`] fetches the
//! contact list and feeds addresses through the
//! [`NameResolutionCache`]. The [`Client`] facade wires them together
//! and holds the shared snapshots the presentation layer reads.

pub mod client;
pub mod connection;
pub mod provider;
pub mod resolver;
pub mod sync;
pub mod testing;

pub use client::Client;
pub use connection::{Connection, ConnectionUpdate, ProviderHandle};
pub use provider::{ProviderDetector, ProviderGateway, ProviderResult};
pub use resolver::NameResolutionCache;
pub use sync::ContactSyncCoordinator;
