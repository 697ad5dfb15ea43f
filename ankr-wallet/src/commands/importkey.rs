//! Import key command

use anyhow::Result;
use std::path::Path;

use super::{print_success, Context};

/// Run the importkey command
pub async fn run(ctx: &Context, name: &str, keyfile: &Path) -> Result<()> {
    let wallet = ctx.open_wallet()?;
    let mut prompter = ctx.prompter(false)?;

    let stored = wallet.import_key(name, keyfile, prompter.as_mut())?;

    println!();
    print_success("Keystore imported!");
    println!("  Name:     {}", stored.info.name);
    println!("  Address:  {}", stored.info.address);
    println!("  Keystore: {}", stored.path.display());

    Ok(())
}
