use crate::config::{ExecutionConfig, LaunchConfig};
use crate::error::{Error, Result};
use std::path::Path;

/// Checks whether a directory looks like a server installation.
///
/// A valid installation is a directory containing `jboss-modules.jar` and a
/// `modules` directory.
pub fn is_valid_home_directory(path: &Path) -> bool {
    path.is_dir() && path.join("jboss-modules.jar").is_file() && path.join("modules").is_dir()
}

/// Fails with a validation error unless `path` is a server installation.
pub fn validate_home(path: &Path) -> Result<()> {
    if is_valid_home_directory(path) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "JBOSS_HOME '{}' is not a valid directory.",
            path.display()
        )))
    }
}

/// Validates a launch configuration
pub fn validate_launch_config(config: &LaunchConfig) -> Result<()> {
    validate_home(&config.install_location)?;

    if config.startup_timeout_seconds == 0 {
        return Err(Error::Validation(
            "The startup timeout must be greater than 0".to_string(),
        ));
    }
    if config.timeout_seconds == 0 {
        return Err(Error::Validation(
            "The timeout must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates an execution configuration
pub fn validate_execution_config(config: &ExecutionConfig) -> Result<()> {
    if config.timeout_seconds == 0 {
        return Err(Error::Validation(
            "The timeout must be greater than 0".to_string(),
        ));
    }

    // Offline execution works on the local installation only
    if config.offline {
        match &config.install_location {
            Some(location) => validate_home(location)?,
            None => {
                return Err(Error::Validation(
                    "An installation location is required to execute commands offline".to_string(),
                ));
            }
        }
    } else if let Some(location) = &config.install_location {
        validate_home(location)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_home() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jboss-modules.jar"), b"").unwrap();
        std::fs::create_dir(dir.path().join("modules")).unwrap();
        dir
    }

    #[test]
    fn test_valid_home() {
        let home = make_home();
        assert!(is_valid_home_directory(home.path()));
        assert!(validate_home(home.path()).is_ok());
    }

    #[test]
    fn test_invalid_home() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_valid_home_directory(dir.path()));
        assert!(matches!(validate_home(dir.path()), Err(Error::Validation(_))));
    }

    #[test]
    fn test_offline_requires_location() {
        let config = ExecutionConfig {
            offline: true,
            ..ExecutionConfig::default()
        };
        assert!(matches!(
            validate_execution_config(&config),
            Err(Error::Validation(_))
        ));

        let config = ExecutionConfig {
            offline: true,
            install_location: Some(PathBuf::from("/does/not/exist")),
            ..ExecutionConfig::default()
        };
        assert!(matches!(
            validate_execution_config(&config),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let home = make_home();
        let mut config = LaunchConfig::new(home.path());
        config.startup_timeout_seconds = 0;
        assert!(validate_launch_config(&config).is_err());
    }
}
