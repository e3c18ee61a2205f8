//! Wallet keystore commands: init, show.

use clap::Subcommand;

use chainbook_wallet::{read_keystore, write_keystore, LocalWallet};

use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum WalletAction {
    /// Generate a fresh wallet keystore.
    Init,
    /// Show the keystore's account address.
    Show,
}

pub async fn run(action: WalletAction, opts: &GlobalOpts) -> std::result::Result<(), String> {
    match action {
        WalletAction::Init => init(opts),
        WalletAction::Show => show(opts),
    }
}

fn init(opts: &GlobalOpts) -> std::result::Result<(), String> {
    if opts.keystore.exists() {
        return Err(format!(
            "keystore already exists at {}",
            opts.keystore.display()
        ));
    }

    let wallet = LocalWallet::generate();
    write_keystore(&opts.keystore, &wallet).map_err(|e| e.to_string())?;

    output::print_success(
        &format!(
            "keystore written to {} for account {}",
            opts.keystore.display(),
            wallet.address()
        ),
        opts.json,
    );
    Ok(())
}

fn show(opts: &GlobalOpts) -> std::result::Result<(), String> {
    let wallet = read_keystore(&opts.keystore).map_err(|e| e.to_string())?;
    output::print_kv("address", &wallet.address().to_string(), opts.json);
    Ok(())
}
