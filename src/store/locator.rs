//! Resolves environment names to paths and decides what a path is.

use crate::config::{Config, PYTHON_BIN};
use crate::error::{Result, SnapeError};
use crate::paths::absolute_from;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// An absolute path verified to be a virtual environment.
///
/// Only [`EnvLocator::ensure_environment`] and a successful create hand these out,
/// so destructive operations cannot be pointed at arbitrary directories.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualEnv(PathBuf);

impl VirtualEnv {
    pub(crate) fn verified(path: PathBuf) -> Self {
        VirtualEnv(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for VirtualEnv {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for VirtualEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    Global,
    Local,
    Neither,
}

impl Locality {
    pub fn as_str(self) -> &'static str {
        match self {
            Locality::Global => "global",
            Locality::Local => "local",
            Locality::Neither => "unmanaged",
        }
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy)]
pub struct EnvLocator<'a> {
    config: &'a Config,
}

impl<'a> EnvLocator<'a> {
    pub fn new(config: &'a Config) -> Self {
        EnvLocator { config }
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    pub fn root(&self) -> &'a Path {
        &self.config.root
    }

    /// Absolute, symlink-free form of `path`, relative paths taken from the working directory.
    pub fn absolute(&self, path: impl AsRef<Path>) -> PathBuf {
        absolute_from(&self.config.working_dir, path)
    }

    /// Computes where the environment `name` lives, without touching it.
    ///
    /// Local environments take no name; global ones require a legal one.
    pub fn resolve_path(&self, name: Option<&str>, local: bool) -> Result<PathBuf> {
        if let Some(name) = name {
            if self.config.forbidden.contains(name) {
                return Err(SnapeError::IllegalName(name.to_string()));
            }
        }

        if local {
            if let Some(name) = name {
                return Err(SnapeError::InvalidArgument(format!(
                    "Cannot provide an environment name ('{name}') for a local environment"
                )));
            }
            return Ok(self.absolute(&self.config.local_name));
        }

        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(SnapeError::InvalidArgument(
                    "No environment name provided for global snape environment".to_string(),
                ));
            }
        };
        let escapes_root = Path::new(name)
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        let path = self.absolute(self.root().join(name));
        if escapes_root || !self.is_below_root(&path) {
            return Err(SnapeError::IllegalName(name.to_string()));
        }
        Ok(path)
    }

    fn is_below_root(&self, path: &Path) -> bool {
        path != self.root() && path.starts_with(self.root())
    }

    /// Global if the root is a strict ancestor (and, with `check_exists`, the path is a
    /// directory); otherwise local if the last segment is the local environment name.
    pub fn classify(&self, path: impl AsRef<Path>, check_exists: bool) -> Locality {
        let path = self.absolute(path);
        if self.is_below_root(&path) && (!check_exists || path.is_dir()) {
            Locality::Global
        } else if path.file_name().and_then(|name| name.to_str())
            == Some(self.config.local_name.as_str())
        {
            Locality::Local
        } else {
            Locality::Neither
        }
    }

    /// A directory holding both the shell's activation script and a python binary.
    pub fn is_valid_environment(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        path.is_dir()
            && path.join(self.config.shell.activate_file()).is_file()
            && path.join(PYTHON_BIN).is_file()
    }

    /// The checked entry point for anything that treats `path` as an environment.
    pub fn ensure_environment(&self, path: impl AsRef<Path>) -> Result<VirtualEnv> {
        let path = self.absolute(path);
        if !path.is_dir() {
            return Err(SnapeError::NotADirectory(path));
        }
        if !self.is_valid_environment(&path) {
            return Err(SnapeError::InvalidEnvironment(path));
        }
        Ok(VirtualEnv::verified(path))
    }

    pub fn is_active(&self, path: impl AsRef<Path>) -> bool {
        self.config
            .active_env
            .as_ref()
            .is_some_and(|active| self.absolute(active) == self.absolute(path))
    }

    /// The name snape addresses an environment by: the slash-joined components below
    /// the root for global environments, the local name for local ones.
    pub fn canonical_name(&self, path: impl AsRef<Path>) -> Option<String> {
        let path = self.absolute(path);
        match self.classify(&path, false) {
            Locality::Global => {
                let relative = path.strip_prefix(self.root()).ok()?;
                let components = relative
                    .components()
                    .map(|component| component.as_os_str().to_str())
                    .collect::<Option<Vec<_>>>()?;
                Some(components.join("/"))
            }
            Locality::Local => Some(self.config.local_name.clone()),
            Locality::Neither => None,
        }
    }

    /// All valid environments below `root`, sorted by path. Valid environments are not
    /// descended into.
    pub fn enumerate(&self, root: &Path) -> Result<Vec<VirtualEnv>> {
        let mut found = Vec::new();
        if !root.is_dir() {
            return Ok(found);
        }

        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs_err::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let file_type = entry.file_type()?;
                if file_type.is_symlink() {
                    // links resolve to their target, which is listed under its own name if managed
                    debug!("Skipping symlink {}", path.display());
                    continue;
                }
                if self.is_valid_environment(&path) {
                    found.push(VirtualEnv::verified(path));
                } else if file_type.is_dir() {
                    pending.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }

    pub fn enumerate_global(&self) -> Result<Vec<VirtualEnv>> {
        self.enumerate(self.root())
    }

    /// Local environments in `start` and each of its ancestors, nearest first.
    pub fn local_chain(&self, start: impl AsRef<Path>) -> impl Iterator<Item = VirtualEnv> + '_ {
        let start = self.absolute(start);
        std::iter::successors(Some(start), |dir| dir.parent().map(Path::to_path_buf))
            .map(move |dir| dir.join(&self.config.local_name))
            .filter(move |candidate| self.is_valid_environment(candidate))
            .map(VirtualEnv::verified)
    }
}
