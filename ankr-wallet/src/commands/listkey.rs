//! List keys command

use anyhow::Result;

use super::Context;

/// Run the listkey command
pub async fn run(ctx: &Context) -> Result<()> {
    let wallet = ctx.open_wallet()?;
    let keys = wallet.list_keys()?;

    if keys.is_empty() {
        println!("No keys found in {}", wallet.store().dir().display());
        return Ok(());
    }

    println!("{:<20} {:<42} PUBLIC KEY", "NAME", "ADDRESS");
    for key in keys {
        println!(
            "{:<20} {:<42} {}",
            key.name,
            key.address,
            key.public_key.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
