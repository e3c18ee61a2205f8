//! Contact commands: list, add.

use clap::Subcommand;

use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum ContactsAction {
    /// Fetch and display the contact list with resolved names.
    List,
    /// Add a contact to the directory.
    Add {
        /// Contact address (0x + 40 hex chars).
        address: String,
    },
}

pub async fn run(action: ContactsAction, opts: &GlobalOpts) -> std::result::Result<(), String> {
    match action {
        ContactsAction::List => list(opts).await,
        ContactsAction::Add { address } => add(opts, &address).await,
    }
}

async fn list(opts: &GlobalOpts) -> std::result::Result<(), String> {
    let client = super::authenticated_client(opts).await?;

    let contacts = client.sync_contacts().await.map_err(|e| e.to_string())?;
    let names = client.names();

    let headers = &["address", "name"];
    let rows: Vec<Vec<String>> = contacts
        .iter()
        .map(|address| {
            vec![
                address.to_string(),
                names.get(address).cloned().unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();
    output::print_table(headers, &rows, opts.json);
    Ok(())
}

async fn add(opts: &GlobalOpts, address: &str) -> std::result::Result<(), String> {
    let address = output::parse_address(address)?;

    let client = super::authenticated_client(opts).await?;
    client.add_contact(address).await.map_err(|e| e.to_string())?;

    let label = match client.names().get(&address) {
        Some(name) => format!("{name} ({address})"),
        None => address.to_string(),
    };
    output::print_success(&format!("contact added: {label}"), opts.json);
    Ok(())
}
