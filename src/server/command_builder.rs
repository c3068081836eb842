use crate::config::{DebugConfig, LaunchConfig};
use crate::server::ServerType;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const JAVA_EXECUTABLE: &str = "java.exe";
#[cfg(not(windows))]
const JAVA_EXECUTABLE: &str = "java";

/// The JVM part shared by every server command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JvmLaunch {
    install_location: PathBuf,
    java_home: Option<PathBuf>,
    module_dirs: Vec<PathBuf>,
    java_options: Vec<String>,
    module_options: Vec<String>,
    properties_file: Option<PathBuf>,
    server_arguments: Vec<String>,
}

impl JvmLaunch {
    /// Creates a launch for the given installation
    pub fn new(install_location: impl Into<PathBuf>) -> Self {
        Self {
            install_location: install_location.into(),
            java_home: None,
            module_dirs: Vec::new(),
            java_options: Vec::new(),
            module_options: Vec::new(),
            properties_file: None,
            server_arguments: Vec::new(),
        }
    }

    /// The java executable: the configured java home, then `JAVA_HOME`, then `PATH`.
    pub fn java_executable(&self) -> String {
        let java_home = self
            .java_home
            .clone()
            .or_else(|| std::env::var_os("JAVA_HOME").map(PathBuf::from));
        match java_home {
            Some(home) => home.join("bin").join(JAVA_EXECUTABLE).display().to_string(),
            None => JAVA_EXECUTABLE.to_string(),
        }
    }

    /// `<install>/modules` followed by the extra module directories.
    pub fn module_path(&self) -> String {
        let separator = if cfg!(windows) { ";" } else { ":" };
        std::iter::once(self.install_location.join("modules"))
            .chain(self.module_dirs.iter().cloned())
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn home(&self) -> String {
        self.install_location.display().to_string()
    }

    fn path(&self, relative: &str) -> String {
        self.install_location.join(relative).display().to_string()
    }

    fn boot_arguments(&self, base: &str, log_file: &str) -> Vec<String> {
        vec![
            format!(
                "-Dorg.jboss.boot.log.file={}",
                self.path(&format!("{}/log/{}", base, log_file))
            ),
            format!(
                "-Dlogging.configuration=file:{}",
                self.path(&format!("{}/configuration/logging.properties", base))
            ),
        ]
    }

    fn modules_jar(&self) -> Vec<String> {
        let mut args = vec!["-jar".to_string(), self.path("jboss-modules.jar")];
        args.extend(self.module_options.iter().cloned());
        args.push("-mp".to_string());
        args.push(self.module_path());
        args
    }

    fn trailing_arguments(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(file) = &self.properties_file {
            args.push(format!("-P={}", file.display()));
        }
        args.extend(self.server_arguments.iter().cloned());
        args
    }
}

/// Builds the command line of a server process.
///
/// One implementation exists per [`ServerType`]; both share their JVM
/// settings through a [`JvmLaunch`].
pub trait CommandBuilder: Send + Sync {
    /// The shared JVM settings
    fn jvm(&self) -> &JvmLaunch;

    /// The shared JVM settings, mutably
    fn jvm_mut(&mut self) -> &mut JvmLaunch;

    /// The server type this builder produces command lines for
    fn server_type(&self) -> ServerType;

    /// The full command line, executable first
    fn build(&self) -> Vec<String>;

    /// The installation directory
    fn install_location(&self) -> &Path {
        &self.jvm().install_location
    }

    /// Sets the Java installation
    fn set_java_home(&mut self, java_home: Option<PathBuf>) {
        self.jvm_mut().java_home = java_home;
    }

    /// Appends module directories after `<install>/modules`
    fn add_module_dirs(&mut self, dirs: &[PathBuf]) {
        self.jvm_mut().module_dirs.extend(dirs.iter().cloned());
    }

    /// Replaces the JVM options
    fn set_java_options(&mut self, options: &[String]) {
        self.jvm_mut().java_options = options.to_vec();
    }

    /// Appends JVM options
    fn add_java_options(&mut self, options: &[String]) {
        self.jvm_mut().java_options.extend(options.iter().cloned());
    }

    /// Replaces the JBoss Modules options
    fn set_module_options(&mut self, options: &[String]) {
        self.jvm_mut().module_options = options.to_vec();
    }

    /// Sets the properties file passed with `-P`
    fn set_properties_file(&mut self, file: Option<PathBuf>) {
        self.jvm_mut().properties_file = file;
    }

    /// Appends arguments passed to the server
    fn add_server_arguments(&mut self, args: &[String]) {
        self.jvm_mut().server_arguments.extend(args.iter().cloned());
    }
}

/// Command line of a standalone server.
#[derive(Debug, Clone)]
pub struct StandaloneCommandBuilder {
    jvm: JvmLaunch,
    debug: DebugConfig,
    server_config: Option<String>,
}

impl StandaloneCommandBuilder {
    /// Creates a builder for the given installation
    pub fn new(install_location: impl Into<PathBuf>) -> Self {
        Self {
            jvm: JvmLaunch::new(install_location),
            debug: DebugConfig::default(),
            server_config: None,
        }
    }

    /// Sets the debug agent settings
    pub fn set_debug(&mut self, debug: DebugConfig) {
        self.debug = debug;
    }

    /// Sets the configuration file, e.g. `standalone-full.xml`
    pub fn set_server_configuration(&mut self, config: Option<String>) {
        self.server_config = config;
    }

    fn debug_agent(&self) -> Option<String> {
        if !self.debug.enabled {
            return None;
        }
        Some(format!(
            "-agentlib:jdwp=transport=dt_socket,server=y,suspend={},address={}:{}",
            if self.debug.suspend { "y" } else { "n" },
            self.debug.host,
            self.debug.port
        ))
    }
}

impl CommandBuilder for StandaloneCommandBuilder {
    fn jvm(&self) -> &JvmLaunch {
        &self.jvm
    }

    fn jvm_mut(&mut self) -> &mut JvmLaunch {
        &mut self.jvm
    }

    fn server_type(&self) -> ServerType {
        ServerType::Standalone
    }

    fn build(&self) -> Vec<String> {
        let jvm = &self.jvm;
        let mut cmd = vec![jvm.java_executable(), "-D[Standalone]".to_string()];
        cmd.extend(jvm.java_options.iter().cloned());
        cmd.extend(self.debug_agent());
        cmd.push(format!("-Djboss.home.dir={}", jvm.home()));
        cmd.extend(jvm.boot_arguments("standalone", "server.log"));
        cmd.extend(jvm.modules_jar());
        cmd.push("org.jboss.as.standalone".to_string());
        cmd.push(format!("-Djboss.home.dir={}", jvm.home()));
        cmd.push(format!("-Djboss.server.base.dir={}", jvm.path("standalone")));
        if let Some(config) = &self.server_config {
            cmd.push(format!("-c={}", config));
        }
        cmd.extend(jvm.trailing_arguments());
        cmd
    }
}

/// Command line of a domain: the process controller, which starts the host
/// controller with the arguments after `--`.
#[derive(Debug, Clone)]
pub struct DomainCommandBuilder {
    jvm: JvmLaunch,
    domain_config: Option<String>,
    host_config: Option<String>,
}

impl DomainCommandBuilder {
    /// Creates a builder for the given installation
    pub fn new(install_location: impl Into<PathBuf>) -> Self {
        Self {
            jvm: JvmLaunch::new(install_location),
            domain_config: None,
            host_config: None,
        }
    }

    /// Sets the domain configuration file, e.g. `domain.xml`
    pub fn set_domain_configuration(&mut self, config: Option<String>) {
        self.domain_config = config;
    }

    /// Sets the host configuration file, e.g. `host.xml`
    pub fn set_host_configuration(&mut self, config: Option<String>) {
        self.host_config = config;
    }
}

impl CommandBuilder for DomainCommandBuilder {
    fn jvm(&self) -> &JvmLaunch {
        &self.jvm
    }

    fn jvm_mut(&mut self) -> &mut JvmLaunch {
        &mut self.jvm
    }

    fn server_type(&self) -> ServerType {
        ServerType::Domain
    }

    fn build(&self) -> Vec<String> {
        let jvm = &self.jvm;
        let java = jvm.java_executable();

        let mut cmd = vec![java.clone(), "-D[Process Controller]".to_string()];
        cmd.extend(jvm.java_options.iter().cloned());
        cmd.extend(jvm.boot_arguments("domain", "process-controller.log"));
        cmd.extend(jvm.modules_jar());
        cmd.push("org.jboss.as.process-controller".to_string());
        cmd.extend([
            "-jboss-home".to_string(),
            jvm.home(),
            "-jvm".to_string(),
            java.clone(),
            "-mp".to_string(),
            jvm.module_path(),
            "--".to_string(),
        ]);

        // Host controller JVM
        cmd.extend(jvm.boot_arguments("domain", "host-controller.log"));
        cmd.extend(jvm.java_options.iter().cloned());
        cmd.extend(["--".to_string(), "-default-jvm".to_string(), java]);

        if let Some(config) = &self.domain_config {
            cmd.push(format!("--domain-config={}", config));
        }
        if let Some(config) = &self.host_config {
            cmd.push(format!("--host-config={}", config));
        }
        cmd.extend(jvm.trailing_arguments());
        cmd
    }
}

/// Creates the builder for `server_type`, populated from `config`.
pub fn command_builder(server_type: ServerType, config: &LaunchConfig) -> Box<dyn CommandBuilder> {
    let mut builder: Box<dyn CommandBuilder> = match server_type {
        ServerType::Standalone => {
            let mut builder = StandaloneCommandBuilder::new(&config.install_location);
            builder.set_debug(config.debug.clone());
            builder.set_server_configuration(config.server_config.clone());
            Box::new(builder)
        }
        ServerType::Domain => {
            let mut builder = DomainCommandBuilder::new(&config.install_location);
            builder.set_domain_configuration(config.domain_config.clone());
            builder.set_host_configuration(config.host_config.clone());
            Box::new(builder)
        }
    };

    builder.set_java_home(config.java_home.clone());
    builder.add_module_dirs(&config.module_dirs);
    builder.set_java_options(&config.java_opts);
    builder.set_module_options(&config.module_options);
    builder.set_properties_file(config.properties_file.clone());
    builder.add_server_arguments(&config.server_args);
    builder
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn launch_config() -> LaunchConfig {
        let mut config = LaunchConfig::new("/opt/wildfly");
        config.java_home = Some(PathBuf::from("/usr/lib/jvm/java-21"));
        config.set_java_opts("-Xms64m  -Xmx512m");
        config.module_dirs = vec![PathBuf::from("/opt/extra-modules")];
        config
    }

    #[test]
    fn test_standalone_command_line() {
        let mut config = launch_config();
        config.server_config = Some("standalone-full.xml".to_string());
        config.properties_file = Some(PathBuf::from("/tmp/server.properties"));
        config.server_args = vec!["-b=0.0.0.0".to_string()];

        let cmd = command_builder(ServerType::Standalone, &config).build();

        assert_eq!(
            cmd,
            vec![
                "/usr/lib/jvm/java-21/bin/java",
                "-D[Standalone]",
                "-Xms64m",
                "-Xmx512m",
                "-Djboss.home.dir=/opt/wildfly",
                "-Dorg.jboss.boot.log.file=/opt/wildfly/standalone/log/server.log",
                "-Dlogging.configuration=file:/opt/wildfly/standalone/configuration/logging.properties",
                "-jar",
                "/opt/wildfly/jboss-modules.jar",
                "-mp",
                "/opt/wildfly/modules:/opt/extra-modules",
                "org.jboss.as.standalone",
                "-Djboss.home.dir=/opt/wildfly",
                "-Djboss.server.base.dir=/opt/wildfly/standalone",
                "-c=standalone-full.xml",
                "-P=/tmp/server.properties",
                "-b=0.0.0.0",
            ]
        );
    }

    #[test]
    fn test_standalone_debug_agent() {
        let mut config = launch_config();
        config.debug.enabled = true;
        config.debug.suspend = true;

        let cmd = command_builder(ServerType::Standalone, &config).build();

        assert_eq!(
            cmd[4],
            "-agentlib:jdwp=transport=dt_socket,server=y,suspend=y,address=*:8787"
        );
    }

    #[test]
    fn test_domain_command_line() {
        let mut config = launch_config();
        config.domain_config = Some("domain.xml".to_string());
        config.host_config = Some("host-primary.xml".to_string());
        config.debug.enabled = true;

        let cmd = command_builder(ServerType::Domain, &config).build();
        let java = "/usr/lib/jvm/java-21/bin/java".to_string();

        assert_eq!(cmd[0], java);
        assert_eq!(cmd[1], "-D[Process Controller]");
        assert!(!cmd.iter().any(|a| a.starts_with("-agentlib")));

        let pc = cmd
            .iter()
            .position(|a| a == "org.jboss.as.process-controller")
            .unwrap();
        assert_eq!(
            &cmd[pc + 1..pc + 8],
            &[
                "-jboss-home".to_string(),
                "/opt/wildfly".to_string(),
                "-jvm".to_string(),
                java.clone(),
                "-mp".to_string(),
                "/opt/wildfly/modules:/opt/extra-modules".to_string(),
                "--".to_string(),
            ]
        );
        assert!(cmd.contains(
            &"-Dorg.jboss.boot.log.file=/opt/wildfly/domain/log/host-controller.log".to_string()
        ));
        assert_eq!(
            &cmd[cmd.len() - 5..],
            &[
                "--".to_string(),
                "-default-jvm".to_string(),
                java,
                "--domain-config=domain.xml".to_string(),
                "--host-config=host-primary.xml".to_string(),
            ]
        );
    }

    #[test]
    fn test_builder_capabilities_compose() {
        let mut builder = StandaloneCommandBuilder::new("/opt/wildfly");
        builder.set_java_home(Some(PathBuf::from("/jdk")));
        builder.set_java_options(&["-Xmx1g".to_string()]);
        builder.add_java_options(&["-Dfoo=bar".to_string()]);
        builder.set_module_options(&["-javaagent:agent.jar".to_string()]);

        let cmd = builder.build();

        assert_eq!(builder.install_location(), Path::new("/opt/wildfly"));
        assert_eq!(&cmd[2..4], &["-Xmx1g".to_string(), "-Dfoo=bar".to_string()]);
        let jar = cmd.iter().position(|a| a == "-jar").unwrap();
        assert_eq!(cmd[jar + 2], "-javaagent:agent.jar");
    }
}
