mod project;
mod resolve;
mod settings;

use std::collections::HashMap;

pub use project::{ProjectFile, PROJECT_FILE_NAME};
pub use resolve::{ConfigOverrides, ConfigSources, ResolvedConfig, DEFAULT_EDITOR};
pub use settings::{SettingKey, Settings};

use crate::Result;

/// Resolve configuration for this invocation from the real environment,
/// the working directory's project file and the user's settings.
pub fn load(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let cwd = std::env::current_dir()?;
    let project = ProjectFile::discover(&cwd)?;
    let settings = Settings::load()?;

    let default_tag = crate::git::current_sha(&cwd);

    Ok(ResolvedConfig::resolve(&ConfigSources {
        overrides,
        env: &env,
        project: project.as_ref(),
        settings: &settings,
        default_tag,
    }))
}
