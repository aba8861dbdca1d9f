use std::env;
use std::path::PathBuf;

/// Directory under the home directory holding VERA settings and the launcher lock.
const CONFIG_SUBDIR: [&str; 2] = [".config", "vera"];

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<PathBuf, String> {
    for var in ["HOME", "USERPROFILE"] {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                return Ok(PathBuf::from(value));
            }
        }
    }

    Err("Home directory not set".to_string())
}

/// Default configuration directory: `~/.config/vera`.
pub fn default_config_dir() -> Result<PathBuf, String> {
    let mut dir = get_home_dir()?;
    dir.extend(CONFIG_SUBDIR);
    Ok(dir)
}
