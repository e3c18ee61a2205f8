//! Name resolution command.

use chainbook_types::ConnectionState;

use crate::output;
use crate::GlobalOpts;

pub async fn run(address: &str, opts: &GlobalOpts) -> std::result::Result<(), String> {
    let address = output::parse_address(address)?;

    let client = super::build_client(opts)?;
    if client.connect().await.map_err(|e| e.to_string())? == ConnectionState::NoProvider {
        return Err(format!(
            "no wallet keystore at {} — run `chainbook wallet init` first",
            opts.keystore.display()
        ));
    }

    match client.resolve_name(address).await.map_err(|e| e.to_string())? {
        Some(name) => output::print_kv(&address.to_string(), &name, opts.json),
        None => output::print_kv(&address.to_string(), "(no registered name)", opts.json),
    }
    Ok(())
}
