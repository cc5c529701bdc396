//! Loss Reserving CLI
//!
//! Fits the Cape Cod method to loss and exposure triangles and prints
//! ultimates and IBNR per index row and origin period

use anyhow::{Context, Result};
use clap::Parser;
use loss_reserving::inputs::{InputArgs, MethodArgs};
use loss_reserving::{CapeCod, ReserveSummary};

#[derive(Debug, Parser)]
#[command(name = "loss_reserving", version, about = "Cape Cod loss reserving")]
struct Cli {
    #[command(flatten)]
    inputs: InputArgs,

    #[command(flatten)]
    method: MethodArgs,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let inputs = cli.inputs.load().context("Failed to load reserving inputs")?;
    let config = cli.method.config().context("Invalid Cape Cod configuration")?;
    let model = CapeCod::new(config, inputs.pattern)?;
    let fitted = model
        .fit(&inputs.losses, Some(&inputs.exposure))
        .context("Cape Cod fit failed")?;
    let summary = fitted.summary();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_table(&summary);
    }
    Ok(())
}

fn print_table(summary: &ReserveSummary) {
    println!("Cape Cod Reserves");
    println!("=================\n");
    println!(
        "{:<20} {:>10} {:>14} {:>10} {:>10} {:>14} {:>14} {:>14}",
        "Index", "Origin", "Latest", "Apriori", "Detrended", "Expected", "Ultimate", "IBNR"
    );
    println!("{}", "-".repeat(114));

    for row in &summary.rows {
        let mut label = row.index.join("/");
        if label.is_empty() {
            label = row.column.clone();
        }
        println!(
            "{:<20} {:>10} {:>14.2} {:>10.4} {:>10.4} {:>14.2} {:>14.2} {:>14.2}",
            label,
            row.origin,
            row.latest,
            row.apriori,
            row.detrended_apriori,
            row.expectation,
            row.ultimate,
            row.ibnr,
        );
    }

    println!("{}", "-".repeat(114));
    println!("\nSummary:");
    println!("  Total Latest:   {:.2}", summary.total_latest);
    println!("  Total Expected: {:.2}", summary.total_expectation);
    println!("  Total Ultimate: {:.2}", summary.total_ultimate);
    println!("  Total IBNR:     {:.2}", summary.total_ibnr);
}
