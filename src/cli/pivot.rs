use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::detail::normalize_detail;
use crate::error::{FrontdeskError, Result};
use crate::exporter::export_pivot;
use crate::pivot::pivot;
use crate::settings::load_settings;
use crate::workbook::load_grid;

pub fn run(
    input: &str,
    sheet: Option<&str>,
    income_type: &str,
    output: Option<&str>,
    config: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config.map(Path::new))?;
    let sheet = sheet.unwrap_or(&settings.work_sheet);

    let input_path = PathBuf::from(input);
    let grid = load_grid(&input_path, sheet)?;
    let detail = normalize_detail(&grid, &settings.project_aliases)?;

    let selection = super::parse_types(income_type);
    let table = pivot(&detail.rows, &selection);
    if table.names.is_empty() {
        return Err(FrontdeskError::Other(format!(
            "no detail rows match income type {income_type:?}"
        )));
    }

    let output_path = match output {
        Some(p) => PathBuf::from(p),
        None => {
            let stem = input_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("pivot");
            input_path.with_file_name(format!("{stem}_{}_tax.xlsx", income_type.to_uppercase()))
        }
    };
    export_pivot(&output_path, &table)?;
    println!(
        "{}",
        format!(
            "pivot written to {} ({} names x {} projects)",
            output_path.display(),
            table.names.len(),
            table.projects.len()
        )
        .green()
    );
    Ok(())
}
