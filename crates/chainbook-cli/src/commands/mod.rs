//! Command handlers and the shared client bootstrap.

pub mod contacts;
pub mod resolve;
pub mod status;
pub mod wallet;

use std::sync::Arc;

use chainbook_client::Client;
use chainbook_http::HttpDirectory;
use chainbook_types::config::ClientConfig;
use chainbook_types::ConnectionState;
use chainbook_wallet::KeystoreDetector;

use crate::GlobalOpts;

/// Builds a client over the configured directory and keystore.
pub(crate) fn build_client(opts: &GlobalOpts) -> std::result::Result<Client, String> {
    let config = ClientConfig {
        directory_url: opts.directory_url.clone(),
        request_timeout_secs: opts.timeout_secs,
        ..ClientConfig::default()
    };
    let directory = HttpDirectory::new(&config).map_err(|e| e.to_string())?;
    Ok(Client::new(
        KeystoreDetector::new(&opts.keystore),
        Arc::new(directory),
    ))
}

/// Builds a client and drives it through detection and sign-in.
pub(crate) async fn authenticated_client(opts: &GlobalOpts) -> std::result::Result<Client, String> {
    let client = build_client(opts)?;

    match client.connect().await.map_err(|e| e.to_string())? {
        ConnectionState::ProviderFound => {}
        ConnectionState::NoProvider => {
            return Err(format!(
                "no wallet keystore at {} — run `chainbook wallet init` first",
                opts.keystore.display()
            ));
        }
        other => return Err(format!("unexpected connection state: {other}")),
    }

    client.sign_in().await.map_err(|e| e.to_string())?;
    Ok(client)
}
