//! Generate key command

use anyhow::Result;

use super::{print_success, print_warning, Context};

/// Run the genkey command
pub async fn run(ctx: &Context, name: &str) -> Result<()> {
    let wallet = ctx.open_wallet()?;
    let mut prompter = ctx.prompter(false)?;

    print_warning("Back up the keystore once it is generated. The private key is stored nowhere else.");
    let stored = wallet.generate_key(name, prompter.as_mut())?;

    println!();
    print_success("Key generated!");
    println!("  Name:       {}", stored.info.name);
    println!("  Address:    {}", stored.info.address);
    if let Some(public_key) = &stored.info.public_key {
        println!("  Public key: {}", public_key);
    }
    println!("  Keystore:   {}", stored.path.display());

    Ok(())
}
