//! Creating, deleting and copying environments on top of the locator.

use crate::backend::{CreateOptions, EnvBackend};
use crate::error::{Result, SnapeError};
use crate::prompt::Prompt;
use crate::store::locator::{EnvLocator, Locality, VirtualEnv};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Removes an environment directory tree.
type RemoveDir = fn(&Path) -> io::Result<()>;

/// What to do when the target of a create is already an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Clear and recreate it.
    Force,
    /// Ask the operator; a "no" keeps the existing environment.
    Ask,
    /// Fail with [`SnapeError::EnvironmentExists`].
    Refuse,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Confirm with the operator before deleting.
    pub ask: bool,
    /// Delete even if the environment is the active one.
    pub ignore_active: bool,
}

#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub overwrite: OverwritePolicy,
    pub auto_upgrade: bool,
    /// Hide pip output while installing into the copy.
    pub quiet: bool,
    /// Asked (default yes) right before the copy is created.
    pub confirm: Option<String>,
    /// Remove the source once everything has been installed.
    pub delete_source: Option<DeleteOptions>,
}

pub struct Lifecycle<'a, B, P> {
    locator: EnvLocator<'a>,
    backend: &'a B,
    prompt: &'a P,
    remove_dir: RemoveDir,
}

impl<'a, B: EnvBackend, P: Prompt> Lifecycle<'a, B, P> {
    pub fn new(locator: EnvLocator<'a>, backend: &'a B, prompt: &'a P) -> Self {
        Lifecycle {
            locator,
            backend,
            prompt,
            remove_dir: remove_dir_all,
        }
    }

    #[cfg(test)]
    pub fn with_remove_dir(self, remove_dir: RemoveDir) -> Self {
        Lifecycle { remove_dir, ..self }
    }

    /// The canonical name of `path`, or the path itself for unmanaged environments.
    fn label(&self, path: &Path) -> String {
        self.locator
            .canonical_name(path)
            .unwrap_or_else(|| path.display().to_string())
    }

    fn placement(&self, path: &Path) -> &'static str {
        match self.locator.classify(path, false) {
            Locality::Global => "global",
            Locality::Local | Locality::Neither => "local",
        }
    }

    /// Creates an environment at `path`.
    ///
    /// Returns `None` if the target already is an environment and the operator chose
    /// to keep it. Existing files and non-environment directories are never touched.
    pub async fn create(
        &self,
        path: &Path,
        overwrite: OverwritePolicy,
        auto_upgrade: bool,
        display_name: Option<&str>,
    ) -> Result<Option<VirtualEnv>> {
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            if self.locator.config().forbidden.contains(name) {
                return Err(SnapeError::IllegalName(name.to_string()));
            }
        }

        let path = self.locator.absolute(path);
        let label = self.label(&path);
        if path.is_file() {
            return Err(SnapeError::NotADirectory(path));
        }

        let mut clear = false;
        if path.is_dir() {
            if !self.locator.is_valid_environment(&path) {
                return Err(SnapeError::PathOccupied(path));
            }
            if self.locator.is_active(&path) {
                return Err(SnapeError::EnvironmentActive(label));
            }
            match overwrite {
                OverwritePolicy::Force => {}
                OverwritePolicy::Ask => {
                    let question = format!("Environment '{label}' does already exist. Overwrite?");
                    if !self.prompt.ask(&question, Some(false))? {
                        debug!("Keeping existing environment {}", path.display());
                        return Ok(None);
                    }
                }
                OverwritePolicy::Refuse => return Err(SnapeError::EnvironmentExists(label)),
            }
            clear = true;
        }

        info!("Creating {} snape environment: {label}", self.placement(&path));
        debug!("Creating virtual environment at {}", path.display());
        let options = CreateOptions {
            clear,
            with_pip: true,
            upgrade_deps: auto_upgrade,
            prompt: display_name,
        };
        self.backend.create(&path, &options).await?;

        if !self.locator.is_valid_environment(&path) {
            return Err(SnapeError::InvalidEnvironment(path));
        }
        write_gitignore(&path)?;
        Ok(Some(VirtualEnv::verified(path)))
    }

    /// Deletes `env` recursively.
    ///
    /// Fails with [`SnapeError::Cancelled`] if the operator declines.
    pub fn delete(&self, env: &VirtualEnv, options: DeleteOptions) -> Result<()> {
        let label = self.label(env.path());
        if !options.ignore_active && self.locator.is_active(env) {
            return Err(SnapeError::EnvironmentActive(label));
        }

        let placement = self.placement(env.path());
        if options.ask {
            let question =
                format!("Are you sure you want to delete the {placement} environment '{label}'?");
            if !self.prompt.ask(&question, Some(false))? {
                return Err(SnapeError::Cancelled);
            }
        }

        let removal = (self.remove_dir)(env.path());
        if env.path().is_dir() {
            return Err(SnapeError::DeletionIncomplete {
                path: env.path().to_path_buf(),
                reason: removal.err().map(|err| err.to_string()),
            });
        }
        if let Err(err) = removal {
            warn!("{err}");
        }

        info!("Deleted {placement} snape environment {label}");
        Ok(())
    }

    /// Creates `destination` with the same packages as `source`.
    ///
    /// Returns `None` if both point to the same environment. Declining any
    /// confirmation midway fails with [`SnapeError::Cancelled`] so the source is kept.
    pub async fn copy_package_set(
        &self,
        source: &VirtualEnv,
        destination: &Path,
        options: &CopyOptions,
    ) -> Result<Option<VirtualEnv>> {
        let packages = self.backend.list_installed(source.path()).await?;
        if packages.is_empty() {
            info!(
                "Note: No additional packages were installed in '{}'",
                self.label(source.path())
            );
        }

        let destination = self.locator.absolute(destination);
        debug!("New environment path: {}", destination.display());
        if destination == source.path() {
            debug!("New environment points to old environment");
            info!("Nothing to do");
            return Ok(None);
        }

        if let Some(question) = &options.confirm {
            if !self.prompt.ask(question, Some(true))? {
                return Err(SnapeError::Cancelled);
            }
        }

        let Some(copy) = self
            .create(&destination, options.overwrite, options.auto_upgrade, None)
            .await?
        else {
            return Err(SnapeError::Cancelled);
        };

        if !packages.is_empty()
            && !self
                .backend
                .install(copy.path(), &packages, options.quiet)
                .await?
        {
            return Err(SnapeError::PackageInstallIncomplete(copy.path().to_path_buf()));
        }

        if let Some(delete) = options.delete_source {
            self.delete(source, delete)?;
        }
        Ok(Some(copy))
    }
}

fn remove_dir_all(path: &Path) -> io::Result<()> {
    fs_err::remove_dir_all(path)
}

/// Keeps environments out of version control, local ones live inside projects.
fn write_gitignore(env: &Path) -> io::Result<()> {
    match fs_err::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(env.join(".gitignore"))
    {
        Ok(mut file) => file.write_all(b"*"),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err),
    }
}
