use crate::envs::EnvVars;
use crate::error::{Result, SnapeError};
use crate::paths::{absolute_from, expand_home};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULT_ROOT: &str = "~/.snape";
const DEFAULT_LOCAL_VENV: &str = ".venv";
const DEFAULT_PYTHON: &str = "python3";

/// Interpreter location inside every environment, independent of the shell.
pub const PYTHON_BIN: &str = "bin/python";
/// Package manager location inside every environment.
pub const PIP_BIN: &str = "bin/pip";

/// Shells snape knows how to activate environments for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    pub fn name(self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        }
    }

    /// Activation script relative to an environment root.
    pub fn activate_file(self) -> &'static str {
        match self {
            Shell::Bash | Shell::Zsh => "bin/activate",
            Shell::Fish => "bin/activate.fish",
        }
    }

    /// Init file relative to the user's home directory.
    pub fn init_file(self) -> &'static str {
        match self {
            Shell::Bash => ".bashrc",
            Shell::Zsh => ".zshrc",
            Shell::Fish => ".config/fish/config.fish",
        }
    }

    /// The line registering `script` in the shell's init file.
    pub fn source_alias(self, script: &Path) -> String {
        // bash, zsh and fish all understand `source`
        format!("source '{}'", script.display())
    }

    /// The shell-side wrapper script shipped next to the binary.
    pub fn script_name(self) -> String {
        format!("snape.{}", self.name())
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shell {
    type Err = SnapeError;

    /// Accepts a bare name or a full path such as the value of `$SHELL`.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.rsplit('/').next().unwrap_or(s);
        match name {
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            "fish" => Ok(Shell::Fish),
            _ => Err(SnapeError::UnsupportedShell(name.to_string())),
        }
    }
}

/// Names no environment may carry, to keep `snape <name>` unambiguous with
/// command dispatch.
#[derive(Debug, Clone, Default)]
pub struct ForbiddenNames(BTreeSet<String>);

impl ForbiddenNames {
    /// The local activation keywords.
    pub fn seeded() -> Self {
        Self(["here", "--here"].into_iter().map(String::from).collect())
    }

    /// Adds every subcommand, alias and flag token reachable from `command`, including
    /// the `--help` and `--version` flags clap generates.
    pub fn extend_from_command(&mut self, mut command: clap::Command) {
        command.build();
        let mut pending = vec![&command];
        while let Some(command) = pending.pop() {
            for arg in command.get_arguments() {
                if let Some(long) = arg.get_long() {
                    self.0.insert(format!("--{long}"));
                }
                if let Some(aliases) = arg.get_all_aliases() {
                    self.0.extend(aliases.into_iter().map(|alias| format!("--{alias}")));
                }
                if let Some(short) = arg.get_short() {
                    self.0.insert(format!("-{short}"));
                }
            }
            for subcommand in command.get_subcommands() {
                self.0.insert(subcommand.get_name().to_string());
                self.0.extend(subcommand.get_all_aliases().map(str::to_string));
                pending.push(subcommand);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

/// Process-wide settings, read once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding all global environments, absolute and symlink-free.
    pub root: PathBuf,
    /// Directory name of local environments.
    pub local_name: String,
    pub shell: Shell,
    /// The active environment, if any.
    pub active_env: Option<PathBuf>,
    /// Working directory at startup; relative paths resolve against it.
    pub working_dir: PathBuf,
    /// Interpreter used to create environments.
    pub python: String,
    pub forbidden: ForbiddenNames,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// `shell_override` replaces `$SHELL` (the `--shell` flag).
    pub fn from_env(shell_override: Option<Shell>, forbidden: ForbiddenNames) -> Result<Self> {
        let shell = match shell_override {
            Some(shell) => shell,
            None => std::env::var(EnvVars::SHELL)
                .map_err(|_| SnapeError::UnsupportedShell(String::new()))?
                .parse()?,
        };
        let working_dir = std::env::current_dir()?;
        let root = non_empty_var(EnvVars::SNAPE_ROOT).unwrap_or_else(|| DEFAULT_ROOT.to_string());
        let local_name =
            non_empty_var(EnvVars::SNAPE_VENV).unwrap_or_else(|| DEFAULT_LOCAL_VENV.to_string());
        let active_env = non_empty_var(EnvVars::VIRTUAL_ENV)
            .map(|env| absolute_from(&working_dir, expand_home(&env)));
        let python =
            non_empty_var(EnvVars::SNAPE_PYTHON).unwrap_or_else(|| DEFAULT_PYTHON.to_string());

        Self::new(
            absolute_from(&working_dir, expand_home(&root)),
            local_name,
            shell,
            active_env,
            working_dir,
            python,
            forbidden,
        )
    }

    pub fn new(
        root: PathBuf,
        local_name: String,
        shell: Shell,
        active_env: Option<PathBuf>,
        working_dir: PathBuf,
        python: String,
        forbidden: ForbiddenNames,
    ) -> Result<Self> {
        if local_name.is_empty() || local_name.contains('/') || local_name == ".." {
            return Err(SnapeError::InvalidConfig(format!(
                "'{local_name}' is not a valid local environment name"
            )));
        }
        if root.file_name().and_then(|name| name.to_str()) == Some(local_name.as_str()) {
            return Err(SnapeError::InvalidConfig(format!(
                "the snape root {} must not be named like local environments ('{local_name}')",
                root.display()
            )));
        }

        Ok(Config {
            root,
            local_name,
            shell,
            active_env,
            working_dir,
            python,
            forbidden,
        })
    }

    /// Fails unless the global root exists as a directory.
    pub fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(SnapeError::RootMissing(self.root.clone()))
        }
    }

    /// Directory containing the `snape.<shell>` scripts.
    pub fn script_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = non_empty_var(EnvVars::SNAPE_SH_DIR) {
            return Ok(absolute_from(&self.working_dir, expand_home(&dir)));
        }
        let exe = std::env::current_exe()?;
        let exe_dir = exe.parent().unwrap_or(Path::new("/"));
        Ok(exe_dir.join("sh"))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
