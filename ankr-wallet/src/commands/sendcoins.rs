//! Send coins command

use anyhow::Result;

use ankr_wallet::transaction::parse_amount;
use ankr_wallet::TransferRequest;

use super::{print_success, print_warning, Context};

/// Command line arguments of a transfer
pub struct SendArgs {
    pub symbol: String,
    pub to: String,
    pub keyfile: String,
    pub amount: String,
    pub memo: String,
    pub gas_price: Option<String>,
    pub tx_version: Option<String>,
    pub skip_confirm: bool,
}

/// Run the sendcoins command
pub async fn run(ctx: &Context, args: SendArgs) -> Result<()> {
    let wallet = ctx.open_wallet()?;

    let request = TransferRequest {
        keyfile: args.keyfile,
        to: args.to,
        symbol: args.symbol,
        amount: parse_amount(&args.amount)?,
        memo: args.memo,
        gas_price: args.gas_price.as_deref().map(parse_amount).transpose()?,
        version: args.tx_version,
    };

    let mut prompter = ctx.prompter(args.skip_confirm)?;

    println!(
        "Sending {} {} to {}",
        request.amount, request.symbol, request.to
    );
    let Some(report) = wallet
        .send_transfer(&request, prompter.as_mut())
        .await?
    else {
        println!("Aborted.");
        return Ok(());
    };

    if report.selection.degraded {
        print_warning(&format!(
            "No endpoint passed the liveness check, used {}",
            report.selection.endpoint
        ));
    }

    println!();
    print_success("Transaction committed!");
    println!("  From:   {}", report.from);
    println!("  Hash:   {}", report.receipt.tx_hash);
    println!("  Height: {}", report.receipt.height);

    Ok(())
}
