use std::path::Path;

use crate::error::{FrontdeskError, Result};
use crate::settings::{save_settings, settings_path, Settings};

/// Write a default config file for the user to edit: sheet names, bucket
/// registry, project aliases and extra hit names all live there.
pub fn run(path: Option<&str>, force: bool) -> Result<()> {
    let target = match path {
        Some(p) => Path::new(p).to_path_buf(),
        None => settings_path(),
    };
    if target.exists() && !force {
        return Err(FrontdeskError::Settings(format!(
            "{} already exists (pass --force to overwrite)",
            target.display()
        )));
    }
    save_settings(&Settings::default(), Some(&target))?;
    println!("config written to {}", target.display());
    Ok(())
}
