use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use sha2::{Digest, Sha256};

use crate::error::{FrontdeskError, Result};

/// A worksheet pulled into memory as raw cells. All header location and
/// normalization happens on this grid, so the rest of the crate never
/// touches calamine directly.
pub type Grid = Vec<Vec<Data>>;

/// Resolve a sheet name: exact match first, then substring, then the first
/// sheet in the workbook. Source files are inconsistent about suffixes like
/// "工作表(8月)", so exact-only matching would reject most of them.
pub fn pick_sheet(names: &[String], preferred: &str) -> Option<String> {
    if names.iter().any(|n| n == preferred) {
        return Some(preferred.to_string());
    }
    if let Some(n) = names.iter().find(|n| n.contains(preferred)) {
        return Some(n.clone());
    }
    names.first().cloned()
}

pub fn load_grid(path: &Path, sheet: &str) -> Result<Grid> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| FrontdeskError::Workbook(format!("Failed to open {}: {e}", path.display())))?;
    let names = workbook.sheet_names().to_vec();
    let resolved = pick_sheet(&names, sheet)
        .ok_or_else(|| FrontdeskError::Workbook(format!("{} has no sheets", path.display())))?;
    let range = workbook
        .worksheet_range(&resolved)
        .map_err(|e| FrontdeskError::Workbook(format!("Failed to read sheet {resolved:?}: {e}")))?;
    Ok(range.rows().map(|r| r.to_vec()).collect())
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Cell coercion helpers
// ---------------------------------------------------------------------------

/// Trimmed, non-empty string content of a cell.
pub fn cell_str(row: &[Data], idx: usize) -> Option<String> {
    let cell = row.get(idx)?;
    let s = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Account codes come through as floats; render integral ones
            // without the trailing ".0".
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Numeric content of a cell. Strings are parsed leniently since exported
/// sheets often carry formatted amounts.
pub fn cell_num(row: &[Data], idx: usize) -> Option<f64> {
    match row.get(idx)? {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => parse_amount(s),
        _ => None,
    }
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace(',', "").replace('"', "").replace('¥', "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

/// First column in `row` whose string content contains `needle`.
pub fn find_cell_containing(row: &[Data], needle: &str) -> Option<usize> {
    row.iter().position(|cell| match cell {
        Data::String(s) => s.contains(needle),
        _ => false,
    })
}
