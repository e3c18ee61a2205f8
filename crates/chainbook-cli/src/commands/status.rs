//! Connection status command.

use chainbook_types::ConnectionState;

use crate::output;
use crate::GlobalOpts;

pub async fn run(opts: &GlobalOpts) -> std::result::Result<(), String> {
    let client = super::build_client(opts)?;
    let state = client.connect().await.map_err(|e| e.to_string())?;

    output::print_kv("connection", &state.to_string(), opts.json);

    if state == ConnectionState::ProviderFound {
        if let Some(provider) = client.snapshot().provider() {
            let accounts = provider
                .request_accounts()
                .await
                .map_err(|e| e.to_string())?;
            if let Some(account) = accounts.first() {
                output::print_kv("account", &account.to_string(), opts.json);
            }
        }
    }
    Ok(())
}
