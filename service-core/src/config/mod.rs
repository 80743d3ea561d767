use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment prefix shared by every service (`APP__SERVER__PORT=9000`).
pub const ENV_PREFIX: &str = "APP";

/// Locate a service's `config/` directory.
///
/// Works both when launched from the workspace root and from inside the
/// service's own directory.
pub fn configuration_directory(service_dir: &str) -> Result<PathBuf, AppError> {
    let base_path = std::env::current_dir()?;

    if base_path.ends_with(service_dir) {
        Ok(base_path.join("config"))
    } else {
        Ok(base_path.join(service_dir).join("config"))
    }
}

/// Load layered settings: `base.yaml`, then an optional `local.yaml`, then
/// `APP__`-prefixed environment variables.
///
/// `.env` files are the binary's business; this only reads the process
/// environment as it finds it.
pub fn load_layered<T: DeserializeOwned>(config_dir: &Path) -> Result<T, AppError> {
    let settings = Cfg::builder()
        .add_source(File::from(config_dir.join("base.yaml")).required(true))
        .add_source(File::from(config_dir.join("local.yaml")).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("permissions.super_admins")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        server: SampleServer,
    }

    #[derive(Debug, Deserialize)]
    struct SampleServer {
        port: u16,
    }

    #[test]
    fn test_load_layered_reads_base_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.yaml"), "server:\n  port: 8123\n").unwrap();

        let sample: Sample = load_layered(dir.path()).unwrap();
        assert_eq!(sample.server.port, 8123);
    }

    #[test]
    fn test_load_layered_missing_base_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Sample, AppError> = load_layered(dir.path());
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_load_layered_leaves_dotenv_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.yaml"), "server:\n  port: 8123\n").unwrap();
        std::fs::write(dir.path().join(".env"), "SERVICE_CORE_DOTENV_MARKER=1\n").unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let result: Result<Sample, AppError> = load_layered(dir.path());
        std::env::set_current_dir(previous).unwrap();

        assert!(result.is_ok());
        assert!(std::env::var("SERVICE_CORE_DOTENV_MARKER").is_err());
    }
}
