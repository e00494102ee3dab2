use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result, describe_toml_error},
    schema::SkiffConfig,
    template::default_config_template,
    validate::{Severity, validate_toml_str},
};

/// Config file name, both project-local and user-global.
const CONFIG_FILENAME: &str = "skiff.toml";
const TOKEN_CACHE_FILENAME: &str = "tokencache.json";

/// Returns the user-global config directory (`~/.config/skiff/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "skiff").map(|d| d.config_dir().to_path_buf())
}

/// Where `skiff init` writes when no path is given.
pub fn default_config_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILENAME)
}

/// Default token cache location, next to the user-global config file.
pub fn default_token_cache_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(TOKEN_CACHE_FILENAME)
}

/// Find the first config file in standard locations.
///
/// Search order:
/// 1. `./skiff.toml` (project-local)
/// 2. `~/.config/skiff/skiff.toml` (user-global)
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }
    config_dir()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .filter(|p| p.exists())
}

/// Refuse config files that group or other can read.
#[cfg(unix)]
pub fn check_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)
        .map_err(|e| Error::io(path, e))?
        .permissions()
        .mode();
    if mode & 0o077 != 0 {
        return Err(Error::InsecurePermissions {
            path: path.to_path_buf(),
            mode: mode & 0o777,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn check_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Read, permission-check and parse a config file. Placeholders are
/// normalized away; no semantic validation happens here.
pub fn load_config(path: &Path) -> Result<SkiffConfig> {
    check_permissions(path)?;
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut config: SkiffConfig = toml::from_str(&raw).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        detail: describe_toml_error(&raw, &e),
    })?;
    config.normalize();
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// [`load_config`] plus full validation. Warnings are logged; any error-level
/// diagnostic fails the load with [`Error::Malformed`].
pub fn load_validated(path: &Path) -> Result<SkiffConfig> {
    let config = load_config(path)?;
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let result = validate_toml_str(&raw);
    for diag in &result.diagnostics {
        if diag.severity == Severity::Warning {
            warn!(path = %path.display(), field = %diag.path, "{}", diag.message);
        }
    }
    if result.has_errors() {
        return Err(Error::Malformed {
            diagnostics: result.errors(),
        });
    }
    Ok(config)
}

/// Write the documented template to `path` with owner-only permissions.
///
/// Never overwrites an existing file.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.to_path_buf()),
        _ => Error::io(path, e),
    })?;
    file.write_all(default_config_template().as_bytes())
        .map_err(|e| Error::io(path, e))?;
    debug!(path = %path.display(), "wrote default config");
    Ok(())
}
