//! Integration tests for the chainbook client core.
//!
//! Every test drives the public facade with the in-repo mock wallet and
//! directory doubles. Interleavings that matter (sign-out mid-sync,
//! duplicate triggers) are made deterministic with gates rather than
//! sleeps.

use std::sync::Arc;

use chainbook_client::testing::{FixedDetector, MockDirectory, MockProvider};
use chainbook_client::Client;
use chainbook_types::{Address, ChainbookError, ConnectionState, Result};

fn addr(byte: u8) -> Address {
    Address::new([byte; 20])
}

fn client_with(provider: MockProvider, directory: MockDirectory) -> Client {
    Client::new(
        FixedDetector::found(Arc::new(provider)),
        Arc::new(directory),
    )
}

// ---------------------------------------------------------------------------
// Provider detection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn absent_provider_reaches_terminal_no_provider() -> Result<()> {
    let client = Client::new(FixedDetector::absent(), Arc::new(MockDirectory::new()));

    assert_eq!(client.connect().await?, ConnectionState::NoProvider);

    // Terminal: repeated detection stays put, nothing else is held.
    assert_eq!(client.connect().await?, ConnectionState::NoProvider);
    let snapshot = client.snapshot();
    assert!(snapshot.provider().is_none());
    assert!(snapshot.account().is_none());
    assert!(snapshot.session_token().is_none());
    Ok(())
}

// ---------------------------------------------------------------------------
// Sign-in protocol
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_sign_in_and_sync_produces_contacts_and_names() -> Result<()> {
    let contacts = vec![addr(0xDE), addr(0x11)];
    let provider = MockProvider::new()
        .with_accounts(vec![addr(0xAB)])
        .with_name(addr(0xDE), "alice.chain");
    let directory = MockDirectory::new().with_contacts(contacts.clone());
    let client = client_with(provider, directory);

    client.connect().await?;
    let connection = client.sign_in().await?;

    assert_eq!(connection.state(), ConnectionState::SignedIn);
    assert_eq!(connection.account(), Some(addr(0xAB)));
    assert!(connection.session_token().is_some());

    // The driving condition holds exactly now: token present, contacts
    // unknown, nothing in flight.
    assert!(client.needs_sync());

    let fetched = client.sync_contacts().await?;
    assert_eq!(fetched, contacts, "server order preserved");
    assert_eq!(client.contacts(), Some(contacts));
    assert!(!client.needs_sync());

    // Only the resolvable subset shows up in the mapping.
    let names = client.names();
    assert_eq!(names.len(), 1);
    assert_eq!(names.get(&addr(0xDE)), Some(&"alice.chain".to_string()));
    Ok(())
}

#[tokio::test]
async fn rejected_signature_returns_to_provider_found() -> Result<()> {
    let directory = MockDirectory::new().rejecting_signatures();
    let client = client_with(MockProvider::new(), directory);

    client.connect().await?;
    let result = client.sign_in().await;
    assert!(matches!(result, Err(ChainbookError::SignatureRejected)));

    let snapshot = client.snapshot();
    assert_eq!(snapshot.state(), ConnectionState::ProviderFound);
    assert!(snapshot.account().is_none());
    assert!(snapshot.session_token().is_none());
    Ok(())
}

#[tokio::test]
async fn declined_signature_request_allows_retry() -> Result<()> {
    let provider = MockProvider::new();
    provider.decline_signing();
    let provider = Arc::new(provider);
    let client = Client::new(
        FixedDetector::found(provider.clone()),
        Arc::new(MockDirectory::new()),
    );

    client.connect().await?;
    let result = client.sign_in().await;
    assert!(matches!(result, Err(ChainbookError::UserDeclined { .. })));
    assert_eq!(client.snapshot().state(), ConnectionState::ProviderFound);

    // Retry is available from the stable state.
    let result = client.sign_in().await;
    assert!(result.is_err(), "still declining");
    assert_eq!(client.snapshot().state(), ConnectionState::ProviderFound);
    Ok(())
}

#[tokio::test]
async fn verification_transport_failure_leaves_no_partial_session() -> Result<()> {
    let directory = MockDirectory::new().with_failing_verification();
    let client = client_with(MockProvider::new(), directory);

    client.connect().await?;
    let result = client.sign_in().await;
    assert!(matches!(result, Err(ChainbookError::Transport { .. })));

    let snapshot = client.snapshot();
    assert_eq!(snapshot.state(), ConnectionState::ProviderFound);
    assert!(snapshot.session_token().is_none());
    Ok(())
}

#[tokio::test]
async fn sign_in_is_idempotent_once_signed_in() -> Result<()> {
    let directory = MockDirectory::new();
    let client = client_with(MockProvider::new(), directory);

    client.connect().await?;
    let first = client.sign_in().await?;
    let second = client.sign_in().await?;

    assert_eq!(first.session_token(), second.session_token());
    Ok(())
}

// ---------------------------------------------------------------------------
// Contact sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_failure_leaves_previous_contacts_untouched() -> Result<()> {
    let contacts = vec![addr(1), addr(2)];
    let directory = Arc::new(MockDirectory::new().with_contacts(contacts.clone()));
    let client = Client::new(
        FixedDetector::found(Arc::new(MockProvider::new())),
        directory.clone(),
    );

    client.connect().await?;
    client.sign_in().await?;
    client.sync_contacts().await?;
    assert_eq!(client.contacts(), Some(contacts.clone()));

    // The endpoint goes dark; the re-sync fails in the fetch step.
    directory.fail_fetches();
    let result = client.sync_contacts().await;
    assert!(matches!(result, Err(ChainbookError::Transport { .. })));

    // Round-trip: the pre-failure list equals the post-attempt list.
    assert_eq!(client.contacts(), Some(contacts));
    assert!(!client.is_syncing(), "failed cycle released the latch");
    Ok(())
}

// ---------------------------------------------------------------------------
// Re-entrancy and staleness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_sync_while_in_flight_is_suppressed() -> Result<()> {
    let (directory, gate) = MockDirectory::new()
        .with_contacts(vec![addr(1)])
        .with_fetch_gate();
    let client = Arc::new(client_with(MockProvider::new(), directory));

    client.connect().await?;
    client.sign_in().await?;

    let background = {
        let client = client.clone();
        tokio::spawn(async move { client.sync_contacts().await })
    };
    gate.wait_entered().await;

    assert!(client.is_syncing());
    let duplicate = client.sync_contacts().await;
    assert!(matches!(duplicate, Err(ChainbookError::SyncInFlight)));

    gate.open();
    let result = background.await.expect("task");
    assert_eq!(result?, vec![addr(1)]);
    assert!(!client.is_syncing());
    Ok(())
}

#[tokio::test]
async fn sign_out_mid_sync_discards_the_result() -> Result<()> {
    let (directory, gate) = MockDirectory::new()
        .with_contacts(vec![addr(1), addr(2)])
        .with_fetch_gate();
    let provider = MockProvider::new().with_name(addr(1), "alice.chain");
    let client = Arc::new(client_with(provider, directory));

    client.connect().await?;
    client.sign_in().await?;

    let background = {
        let client = client.clone();
        tokio::spawn(async move { client.sync_contacts().await })
    };
    gate.wait_entered().await;

    // End the session while the fetch is parked at the gate.
    client.sign_out()?;
    gate.open();

    let result = background.await.expect("task");
    assert!(matches!(result, Err(ChainbookError::StaleSession)));

    // The abandoned session's result never repopulated anything.
    assert!(client.contacts().is_none());
    assert!(client.names().is_empty());
    Ok(())
}

// ---------------------------------------------------------------------------
// Bulk merge semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn names_merge_only_after_every_lookup_settles() -> Result<()> {
    let (provider, lookup_gate) = MockProvider::new()
        .with_name(addr(1), "alice.chain")
        .with_name(addr(2), "bob.chain")
        .with_gated_lookup(addr(2));
    let directory = MockDirectory::new().with_contacts(vec![addr(1), addr(2), addr(3)]);
    let client = Arc::new(client_with(provider, directory));

    client.connect().await?;
    client.sign_in().await?;

    let background = {
        let client = client.clone();
        tokio::spawn(async move { client.sync_contacts().await })
    };

    // One lookup is parked at the gate; the cycle must not publish
    // anything yet, even though the other lookups have settled.
    lookup_gate.wait_entered().await;
    assert!(client.names().is_empty(), "no streaming merges");

    lookup_gate.open();
    background.await.expect("task")?;

    let names = client.names();
    assert_eq!(names.len(), 2);
    assert_eq!(names.get(&addr(1)), Some(&"alice.chain".to_string()));
    assert_eq!(names.get(&addr(2)), Some(&"bob.chain".to_string()));
    assert!(!names.contains_key(&addr(3)), "unresolved stays absent");
    Ok(())
}

#[tokio::test]
async fn failed_lookups_are_dropped_but_sync_succeeds() -> Result<()> {
    let provider = MockProvider::new()
        .with_name(addr(1), "alice.chain")
        .with_failing_lookup(addr(2));
    let directory = MockDirectory::new().with_contacts(vec![addr(1), addr(2)]);
    let client = client_with(provider, directory);

    client.connect().await?;
    client.sign_in().await?;

    let fetched = client.sync_contacts().await?;
    assert_eq!(fetched.len(), 2, "a missing name is not a sync failure");

    let names = client.names();
    assert_eq!(names.len(), 1);
    assert!(names.contains_key(&addr(1)));
    Ok(())
}

#[tokio::test]
async fn resync_retains_names_for_dropped_contacts() -> Result<()> {
    let provider = MockProvider::new()
        .with_name(addr(1), "alice.chain")
        .with_name(addr(2), "bob.chain");
    let directory = Arc::new(MockDirectory::new().with_contacts(vec![addr(1), addr(2)]));
    let client = Client::new(FixedDetector::found(Arc::new(provider)), directory.clone());

    client.connect().await?;
    client.sign_in().await?;
    client.sync_contacts().await?;
    assert_eq!(client.names().len(), 2);

    // The server dropped addr(2); the list shrinks but its name
    // survives in the mapping for the rest of the session.
    directory.set_contacts(vec![addr(1)]);
    client.sync_contacts().await?;
    assert_eq!(client.contacts(), Some(vec![addr(1)]));
    assert_eq!(client.names().len(), 2);
    assert_eq!(client.names().get(&addr(2)), Some(&"bob.chain".to_string()));
    Ok(())
}

// ---------------------------------------------------------------------------
// Add contact
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_contact_appends_locally_and_resolves() -> Result<()> {
    let provider = MockProvider::new().with_name(addr(7), "carol.chain");
    let directory = MockDirectory::new().with_contacts(vec![addr(1)]);
    let client = client_with(provider, directory);

    client.connect().await?;
    client.sign_in().await?;
    client.sync_contacts().await?;

    client.add_contact(addr(7)).await?;
    assert_eq!(client.contacts(), Some(vec![addr(1), addr(7)]));
    assert_eq!(client.names().get(&addr(7)), Some(&"carol.chain".to_string()));
    Ok(())
}

#[tokio::test]
async fn add_contact_without_session_is_a_contract_violation() {
    let client = client_with(MockProvider::new(), MockDirectory::new());
    client.connect().await.expect("connect");

    let result = client.add_contact(addr(7)).await;
    assert!(matches!(result, Err(ChainbookError::Contract { .. })));
}

// ---------------------------------------------------------------------------
// Session teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_out_clears_session_state_and_reconnect_works() -> Result<()> {
    let provider = MockProvider::new().with_name(addr(1), "alice.chain");
    let directory = MockDirectory::new().with_contacts(vec![addr(1)]);
    let client = client_with(provider, directory);

    client.connect().await?;
    client.sign_in().await?;
    client.sync_contacts().await?;
    assert!(client.contacts().is_some());
    assert!(!client.names().is_empty());

    client.sign_out()?;
    let snapshot = client.snapshot();
    assert_eq!(snapshot.state(), ConnectionState::CheckingProvider);
    assert!(snapshot.session_token().is_none());
    assert!(client.contacts().is_none());
    assert!(client.names().is_empty());

    // The detection memo survives sign-out: reconnect without reprobe.
    assert_eq!(client.connect().await?, ConnectionState::ProviderFound);
    client.sign_in().await?;
    assert_eq!(client.snapshot().state(), ConnectionState::SignedIn);
    Ok(())
}
