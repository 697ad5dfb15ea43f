//! Balance command

use anyhow::Result;

use super::Context;

/// Run the getbalance command
pub async fn run(ctx: &Context, address: &str, symbol: &str) -> Result<()> {
    let wallet = ctx.open_wallet()?;

    println!("Querying balance of {}", address);
    let balance = wallet.balance(address, symbol).await?;
    println!("Balance: {} {}", balance, symbol);

    Ok(())
}
