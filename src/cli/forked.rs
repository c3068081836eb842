use crate::config::ExecutionConfig;
use crate::error::{Error, Result};
use crate::server::ServerProcessHandle;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[cfg(windows)]
const CLI_SCRIPT: &str = "jboss-cli.bat";
#[cfg(not(windows))]
const CLI_SCRIPT: &str = "jboss-cli.sh";

/// The CLI launcher: the configured executable, else the installation's script.
pub fn cli_executable(config: &ExecutionConfig) -> Result<PathBuf> {
    if let Some(executable) = &config.cli_executable {
        return Ok(executable.clone());
    }
    config
        .install_location
        .as_ref()
        .map(|home| home.join("bin").join(CLI_SCRIPT))
        .ok_or_else(|| {
            Error::Validation(
                "An installation location or a CLI executable is required to run the CLI in a separate process"
                    .to_string(),
            )
        })
}

/// Builds the argument list of the helper CLI process, executable first.
///
/// # Examples
///
/// ```
/// use wildfly_orchestrator::cli::{CommandSet, forked};
/// use wildfly_orchestrator::config::ExecutionConfig;
///
/// let mut config = ExecutionConfig::with_commands(
///     CommandSet::builder().command(":reload").build(),
/// );
/// config.fork = true;
/// config.cli_executable = Some("/opt/wildfly/bin/jboss-cli.sh".into());
///
/// let args = forked::build_arguments(&config).unwrap();
/// assert_eq!(
///     args,
///     vec![
///         "/opt/wildfly/bin/jboss-cli.sh",
///         "--connect",
///         "--controller=localhost:9990",
///         "--command=:reload",
///     ]
/// );
/// ```
pub fn build_arguments(config: &ExecutionConfig) -> Result<Vec<String>> {
    let mut args = vec![cli_executable(config)?.display().to_string()];

    if !config.offline {
        args.push("--connect".to_string());
        args.push(format!("--controller={}", config.connection.controller()));
    }
    if let Some(auth) = &config.connection.authentication_config {
        args.push(format!("-Dwildfly.config.url={}", config_url(auth)));
    }
    args.extend(
        config
            .jvm_options
            .iter()
            .map(|opt| format!("--jvm-option={}", opt)),
    );
    args.extend(
        config
            .module_options
            .iter()
            .map(|opt| format!("--module-option={}", opt)),
    );
    if config.offline {
        args.push("--offline".to_string());
    }
    if config.batch {
        args.push("--batch".to_string());
    }
    args.extend(
        config
            .properties_files
            .iter()
            .map(|file| format!("--properties={}", file.display())),
    );
    args.extend(
        config
            .system_properties
            .iter()
            .map(|(key, value)| format!("-D{}={}", key, value)),
    );
    args.extend(
        config
            .commands
            .commands()
            .iter()
            .map(|cmd| format!("--command={}", cmd)),
    );
    args.extend(
        config
            .commands
            .scripts()
            .iter()
            .map(|script| format!("--file={}", script.display())),
    );
    if !config.fail_on_error {
        args.push("--continue-on-error".to_string());
    }
    Ok(args)
}

fn config_url(location: &str) -> String {
    if location.contains("://") || location.starts_with("file:") {
        location.to_string()
    } else {
        format!("file:{}", location)
    }
}

/// Runs the commands in a helper CLI process and waits for it to exit.
#[tracing::instrument(skip(config))]
pub async fn execute(config: &ExecutionConfig) -> Result<()> {
    let args = build_arguments(config)?;
    let working_dir = match &config.install_location {
        Some(location) => location.clone(),
        None => std::env::current_dir()
            .map_err(|e| Error::Io(format!("Failed to read the current directory: {}", e)))?,
    };

    let mut env = BTreeMap::new();
    if let Some(location) = &config.install_location {
        env.insert("JBOSS_HOME".to_string(), location.display().to_string());
    }

    tracing::info!(executable = %args[0], "Executing commands in a CLI process");
    tracing::debug!(arguments = ?args, "CLI arguments");

    let mut process = ServerProcessHandle::spawn(args, &working_dir, &env, &config.stdout)?;
    match process.wait().await? {
        Some(0) => {
            tracing::info!("CLI process completed");
            Ok(())
        }
        code => {
            let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
            tracing::error!(exit_code = %code, "CLI process failed");
            Err(Error::CommandExecution(format!(
                "The CLI process exited with code {}",
                code
            )))
        }
    }
}
