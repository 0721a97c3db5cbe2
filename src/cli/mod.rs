pub mod init;
pub mod pivot;
pub mod report;
pub mod totals;
pub mod work;

use std::collections::BTreeSet;

use clap::{Parser, Subcommand};

/// Parse a comma-separated income-type selection. Codes are upper-cased;
/// an empty string or the `all` sentinel selects everything.
pub(crate) fn parse_types(raw: &str) -> BTreeSet<String> {
    if raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case("all") {
        return BTreeSet::new();
    }
    raw.split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Parser)]
#[command(
    name = "frontdesk",
    about = "Front-desk revenue ledger verifier: tax-split and reconciled voucher reports."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file to edit (sheets, buckets, aliases, hit names).
    Init {
        /// Where to write it (default: the user-level config path)
        #[arg(long)]
        path: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Run the full pipeline and export the verified report workbook.
    Report {
        /// Input workbook (must contain the detail and totals sheets)
        input: String,
        /// Output workbook path (default: <input>_报表-<timestamp>.xlsx)
        #[arg(long)]
        output: Option<String>,
        /// Detail sheet name (default from config: 工作表)
        #[arg(long = "work-sheet")]
        work_sheet: Option<String>,
        /// Totals sheet name (default from config: 总数)
        #[arg(long = "totals-sheet")]
        totals_sheet: Option<String>,
        /// Income types to include, comma separated; "all" disables filtering
        #[arg(long, default_value = "H")]
        types: String,
        /// Edited allocation CSV from a previous run (edits persist by 名称/项目)
        #[arg(long)]
        alloc: Option<String>,
        /// Where to write the editable allocation CSV (written even when
        /// validation blocks the workbook, so edits can be fixed and fed back)
        #[arg(long = "alloc-out")]
        alloc_out: Option<String>,
        /// JSON config file
        #[arg(long)]
        config: Option<String>,
    },
    /// Normalize the detail sheet into a long-form CSV.
    Work {
        /// Input workbook
        input: String,
        /// Detail sheet name
        #[arg(long)]
        sheet: Option<String>,
        /// Output CSV path
        #[arg(short, long)]
        output: String,
        /// Transfer credit for the room-fee adjustment check
        #[arg(short, long)]
        transfer: Option<f64>,
        /// JSON config file
        #[arg(long)]
        config: Option<String>,
    },
    /// Normalize the totals sheet into a long-form CSV and print the
    /// back-derived voucher figures.
    Totals {
        /// Input workbook
        input: String,
        /// Totals sheet name
        #[arg(long)]
        sheet: Option<String>,
        /// Output CSV path
        #[arg(short, long)]
        output: Option<String>,
        /// JSON config file
        #[arg(long)]
        config: Option<String>,
    },
    /// Export a name × project pivot filtered to one income type.
    Pivot {
        /// Input workbook
        input: String,
        /// Detail sheet name
        #[arg(long)]
        sheet: Option<String>,
        /// Income type to keep
        #[arg(short = 't', long = "income-type", default_value = "H")]
        income_type: String,
        /// Output workbook path (default: <input>_<type>_tax.xlsx)
        #[arg(short, long)]
        output: Option<String>,
        /// JSON config file
        #[arg(long)]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_types() {
        let set = parse_types("h, L,z");
        assert!(set.contains("H"));
        assert!(set.contains("L"));
        assert!(set.contains("Z"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_parse_types_all_sentinel() {
        assert!(parse_types("all").is_empty());
        assert!(parse_types("").is_empty());
        assert!(parse_types("  ").is_empty());
    }
}
