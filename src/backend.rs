use crate::config::PIP_BIN;
use crate::error::{Result, SnapeError};
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// How a new environment is materialized.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions<'a> {
    /// Wipe an existing environment at the target before creating it.
    pub clear: bool,
    /// Seed the environment with pip.
    pub with_pip: bool,
    /// Upgrade pip and setuptools right after creation.
    pub upgrade_deps: bool,
    /// Prompt shown by the activation script, defaults to the directory name.
    pub prompt: Option<&'a str>,
}

/// The tools snape drives to create environments and move packages between them.
#[allow(async_fn_in_trait)]
pub trait EnvBackend {
    /// Creates (or with `clear`, recreates) an environment at `path`.
    async fn create(&self, path: &Path, options: &CreateOptions<'_>) -> Result<()>;

    /// Lists the packages installed in `env` as `name==version` lines.
    async fn list_installed(&self, env: &Path) -> Result<Vec<String>>;

    /// Installs `packages` into `env`, returns whether all of them were installed.
    async fn install(&self, env: &Path, packages: &[String], quiet: bool) -> Result<bool>;

    /// Installs a requirements file into `env`, returns whether pip succeeded.
    async fn install_requirements(&self, env: &Path, requirements: &Path, quiet: bool)
    -> Result<bool>;
}

/// Creates environments with `python -m venv` and manages packages with each
/// environment's own pip.
pub struct PythonBackend {
    python: String,
}

impl PythonBackend {
    pub fn new(python: impl Into<String>) -> Self {
        PythonBackend {
            python: python.into(),
        }
    }

    async fn check_python_available(&self) -> bool {
        // check if python is available by commanding `python --version`
        Command::new(&self.python)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Runs pip, either attached to the terminal or with its output captured and logged.
    async fn run_pip(
        env: &Path,
        args: &[&str],
        packages: &[String],
        quiet: bool,
    ) -> io::Result<bool> {
        let mut command = Command::new(env.join(PIP_BIN));
        command.args(args).args(packages);
        debug!("$ {} {} {}", env.join(PIP_BIN).display(), args.join(" "), packages.join(" "));

        if !quiet {
            return Ok(command.status().await?.success());
        }

        let output = command.output().await?;
        log_output(&output);
        Ok(output.status.success())
    }
}

impl EnvBackend for PythonBackend {
    async fn create(&self, path: &Path, options: &CreateOptions<'_>) -> Result<()> {
        if !self.check_python_available().await {
            return Err(SnapeError::InterpreterMissing(self.python.clone()));
        }

        let mut command = Command::new(&self.python);
        command.args(["-m", "venv"]);
        if options.clear {
            command.arg("--clear");
        }
        if !options.with_pip {
            command.arg("--without-pip");
        }
        if options.upgrade_deps {
            command.arg("--upgrade-deps");
        }
        if let Some(prompt) = options.prompt {
            command.args(["--prompt", prompt]);
        }
        command.arg(path);
        debug!("Running {:?}", command.as_std());

        let status = command.status().await.map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => SnapeError::InterpreterMissing(self.python.clone()),
            _ => SnapeError::Io(err),
        })?;
        if !status.success() {
            return Err(SnapeError::CreationFailed(path.to_path_buf()));
        }
        Ok(())
    }

    async fn list_installed(&self, env: &Path) -> Result<Vec<String>> {
        debug!("Reading package list from {}", env.display());
        let unreadable = |reason: String| SnapeError::PackageListUnreadable {
            env: env.to_path_buf(),
            reason,
        };

        let output = Command::new(env.join(PIP_BIN))
            .arg("freeze")
            .output()
            .await
            .map_err(|err| unreadable(err.to_string()))?;

        if !output.status.success() {
            if !output.stderr.is_empty() {
                debug!("{}", String::from_utf8_lossy(&output.stderr));
            }
            return Err(unreadable(format!(
                "'pip freeze' terminated with {}",
                output.status
            )));
        }

        let packages = parse_freeze(&String::from_utf8_lossy(&output.stdout));
        debug!("Packages: {}", packages.join(", "));
        Ok(packages)
    }

    async fn install(&self, env: &Path, packages: &[String], quiet: bool) -> Result<bool> {
        if packages.is_empty() {
            debug!("No packages to install");
            return Ok(true);
        }
        Ok(Self::run_pip(env, &["install"], packages, quiet).await?)
    }

    async fn install_requirements(
        &self,
        env: &Path,
        requirements: &Path,
        quiet: bool,
    ) -> Result<bool> {
        info!("Installing requirements from {}", requirements.display());
        let requirements = requirements.to_string_lossy();
        Ok(Self::run_pip(env, &["install", "-r", requirements.as_ref()], &[], quiet).await?)
    }
}

fn log_output(output: &Output) {
    if !output.stdout.is_empty() {
        debug!("{}", String::from_utf8_lossy(&output.stdout));
    }
    if !output.status.success() && !output.stderr.is_empty() {
        debug!("ERRORS: {}", String::from_utf8_lossy(&output.stderr));
    }
}

/// Splits `pip freeze` output into one requirement per non-empty line.
fn parse_freeze(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_freeze_skips_blank_lines() {
        let packages = parse_freeze("requests==2.32.3\n\nurllib3==2.2.2\r\n  \n");
        assert_eq!(packages, vec!["requests==2.32.3", "urllib3==2.2.2"]);
    }

    #[tokio::test]
    async fn test_missing_interpreter_fails_loudly() {
        let temp_dir = TempDir::new().unwrap();
        let backend = PythonBackend::new("snape-test-no-such-python");

        let result = backend
            .create(&temp_dir.path().join("env"), &CreateOptions::default())
            .await;
        assert!(matches!(result, Err(SnapeError::InterpreterMissing(_))));
        assert!(!temp_dir.path().join("env").exists());
    }

    #[tokio::test]
    async fn test_list_installed_without_pip_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let backend = PythonBackend::new("python3");

        let result = backend.list_installed(temp_dir.path()).await;
        assert!(matches!(result, Err(SnapeError::PackageListUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_install_nothing_succeeds_without_pip() {
        let temp_dir = TempDir::new().unwrap();
        let backend = PythonBackend::new("python3");

        assert!(backend.install(temp_dir.path(), &[], true).await.unwrap());
    }
}
