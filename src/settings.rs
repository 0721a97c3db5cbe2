use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::allocation::BucketConfig;
use crate::error::{FrontdeskError, Result};
use crate::exporter;
use crate::reconciler::{default_hit_list, extend_hit_list, HitListEntry};

/// Per-run configuration. Everything has a sensible default so the tool
/// works on a bare workbook; a JSON file (--config, or the user-level file
/// under ~/.config/frontdesk) overrides the parts it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_work_sheet")]
    pub work_sheet: String,
    #[serde(default = "default_totals_sheet")]
    pub totals_sheet: String,
    /// Absolute tolerance for balance comparisons.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub buckets: BucketConfig,
    /// Legacy project names merged before pivoting.
    #[serde(default = "default_project_aliases")]
    pub project_aliases: BTreeMap<String, String>,
    /// Extra exact-match names appended to the default hit list,
    /// category → names.
    #[serde(default)]
    pub extra_hit_names: BTreeMap<String, Vec<String>>,
    /// Result sheets to include in the report workbook.
    #[serde(default = "default_export_sheets")]
    pub export_sheets: Vec<String>,
}

fn default_work_sheet() -> String {
    "工作表".to_string()
}

fn default_totals_sheet() -> String {
    "总数".to_string()
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_project_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([("半日租".to_string(), "房费".to_string())])
}

fn default_export_sheets() -> Vec<String> {
    exporter::ALL_SHEETS.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_sheet: default_work_sheet(),
            totals_sheet: default_totals_sheet(),
            tolerance: default_tolerance(),
            buckets: BucketConfig::default(),
            project_aliases: default_project_aliases(),
            extra_hit_names: BTreeMap::new(),
            export_sheets: default_export_sheets(),
        }
    }
}

impl Settings {
    /// Default hit list plus the configured appendments.
    pub fn hit_list(&self) -> Vec<HitListEntry> {
        extend_hit_list(default_hit_list(), &self.extra_hit_names)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("frontdesk")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Explicit path is required to exist; the user-level file is optional.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (settings_path(), false),
    };
    if !path.exists() {
        if required {
            return Err(FrontdeskError::Settings(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| FrontdeskError::Settings(format!("{}: {e}", path.display())))?;
    settings.buckets.validate()?;
    Ok(settings)
}

pub fn save_settings(settings: &Settings, path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FrontdeskError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
