mod allocation;
mod cli;
mod detail;
mod error;
mod exporter;
mod fmt;
mod models;
mod normalizer;
mod pivot;
mod reconciler;
mod schema;
mod settings;
mod tax;
mod totals;
mod validator;
mod workbook;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { path, force } => cli::init::run(path.as_deref(), force),
        Commands::Report {
            input,
            output,
            work_sheet,
            totals_sheet,
            types,
            alloc,
            alloc_out,
            config,
        } => cli::report::run(
            &input,
            output.as_deref(),
            work_sheet.as_deref(),
            totals_sheet.as_deref(),
            &types,
            alloc.as_deref(),
            alloc_out.as_deref(),
            config.as_deref(),
        ),
        Commands::Work {
            input,
            sheet,
            output,
            transfer,
            config,
        } => cli::work::run(&input, sheet.as_deref(), &output, transfer, config.as_deref()),
        Commands::Totals {
            input,
            sheet,
            output,
            config,
        } => cli::totals::run(&input, sheet.as_deref(), output.as_deref(), config.as_deref()),
        Commands::Pivot {
            input,
            sheet,
            income_type,
            output,
            config,
        } => cli::pivot::run(
            &input,
            sheet.as_deref(),
            &income_type,
            output.as_deref(),
            config.as_deref(),
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
