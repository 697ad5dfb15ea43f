//! Delete key command

use anyhow::Result;

use super::{print_success, Context};

/// Run the deletekey command
pub async fn run(ctx: &Context, name: &str, skip_confirm: bool) -> Result<()> {
    let wallet = ctx.open_wallet()?;
    let mut prompter = ctx.prompter(skip_confirm)?;

    match wallet.delete_key(name, prompter.as_mut())? {
        Some(path) => print_success(&format!("Keystore '{}' deleted ({})", name, path.display())),
        None => println!("Aborted."),
    }

    Ok(())
}
