use crate::cli::args::SetupRemoveArgs;
use crate::config::{Config, Shell};
use crate::prompt::Prompt;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

struct ShellSetup {
    shell: Shell,
    init_file: PathBuf,
    source_line: String,
}

impl ShellSetup {
    fn detect(config: &Config) -> Result<Self> {
        let home = etcetera::home_dir().context("Failed to determine the home directory")?;
        Ok(Self::new(config.shell, &home, &config.script_dir()?))
    }

    fn new(shell: Shell, home: &Path, script_dir: &Path) -> Self {
        let script = script_dir.join(shell.script_name());
        let setup = ShellSetup {
            shell,
            init_file: home.join(shell.init_file()),
            source_line: shell.source_alias(&script),
        };
        debug!("Shell:           {}", setup.shell);
        debug!("Shell init file: {}", setup.init_file.display());
        debug!("Snape command:   {}", setup.source_line);
        setup
    }

    fn is_registered(&self, content: &str) -> bool {
        content.lines().any(|line| line == self.source_line)
    }

    /// Appends the source line unless present; returns whether the file changed.
    fn register(&self) -> Result<bool> {
        let content = if self.init_file.is_file() {
            fs_err::read_to_string(&self.init_file)?
        } else {
            String::new()
        };
        if self.is_registered(&content) {
            return Ok(false);
        }

        if let Some(parent) = self.init_file.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let mut file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.init_file)?;
        if !content.is_empty() && !content.ends_with('\n') {
            writeln!(file)?;
        }
        writeln!(file, "{}", self.source_line)?;
        Ok(true)
    }

    /// Drops every source line; returns whether the file changed.
    fn unregister(&self) -> Result<bool> {
        if !self.init_file.is_file() {
            return Ok(false);
        }
        let content = fs_err::read_to_string(&self.init_file)?;
        if !self.is_registered(&content) {
            return Ok(false);
        }

        let kept: String = content
            .lines()
            .filter(|line| *line != self.source_line)
            .map(|line| format!("{line}\n"))
            .collect();

        // write next to the init file, then swap it in
        let dir = self.init_file.parent().unwrap_or(Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(kept.as_bytes())?;
        if let Ok(metadata) = fs_err::metadata(&self.init_file) {
            temp.as_file().set_permissions(metadata.permissions())?;
        }
        temp.persist(&self.init_file)
            .with_context(|| format!("Failed to write {}", self.init_file.display()))?;
        Ok(true)
    }
}

pub fn init(config: &Config) -> Result<()> {
    if !config.root.is_dir() {
        fs_err::create_dir_all(&config.root).context("Failed to create the snape root")?;
        info!("Created snape root at {}", config.root.display());
    }

    let setup = ShellSetup::detect(config)?;
    let script = config.script_dir()?.join(setup.shell.script_name());
    if !script.is_file() {
        anyhow::bail!("Snape shell script not found: {}", script.display());
    }

    if setup.register()? {
        info!(
            "Initialized snape for {} at {}",
            setup.shell,
            setup.init_file.display()
        );
    } else {
        info!(
            "Snape has already been initialized for the {} shell, nothing changed",
            setup.shell
        );
    }
    Ok(())
}

pub fn remove(args: SetupRemoveArgs, config: &Config, prompt: &impl Prompt) -> Result<()> {
    let remove_init = args.all || args.init;
    let remove_root = args.all || args.root;
    if !remove_init && !remove_root {
        debug!("No arguments given");
        info!("Nothing to do");
        return Ok(());
    }

    if remove_root {
        debug!("Attempting to remove {}", config.root.display());
        let question = "Are you sure you want to remove all global environments?";
        if prompt.ask(question, Some(false))? {
            let removal = fs_err::remove_dir_all(&config.root);
            if config.root.is_dir() {
                removal.with_context(|| format!("Could not remove {}", config.root.display()))?;
                anyhow::bail!("Could not remove {}", config.root.display());
            }
            info!("Successfully removed all global environments");
        }
    }

    if remove_init {
        let setup = ShellSetup::detect(config)?;
        if setup.unregister()? {
            info!("Successfully removed snape from {}", setup.shell);
        } else {
            info!("Snape has not yet been initialized for {}", setup.shell);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_in(home: &Path) -> ShellSetup {
        ShellSetup::new(Shell::Zsh, home, Path::new("/opt/snape/sh"))
    }

    #[test]
    fn test_register_is_idempotent() {
        let home = TempDir::new().unwrap();
        let setup = setup_in(home.path());
        fs_err::write(&setup.init_file, "export EDITOR=vim").unwrap();

        assert!(setup.register().unwrap());
        assert!(!setup.register().unwrap());

        let content = fs_err::read_to_string(&setup.init_file).unwrap();
        assert_eq!(
            content,
            "export EDITOR=vim\nsource '/opt/snape/sh/snape.zsh'\n"
        );
    }

    #[test]
    fn test_register_creates_missing_init_file() {
        let home = TempDir::new().unwrap();
        let setup = ShellSetup::new(Shell::Fish, home.path(), Path::new("/sh"));

        assert!(setup.register().unwrap());
        assert!(home.path().join(".config/fish/config.fish").is_file());
    }

    #[test]
    fn test_unregister_keeps_other_lines() {
        let home = TempDir::new().unwrap();
        let setup = setup_in(home.path());
        assert!(!setup.unregister().unwrap());

        fs_err::write(
            &setup.init_file,
            "alias ll='ls -l'\nsource '/opt/snape/sh/snape.zsh'\nexport A=1\n",
        )
        .unwrap();
        assert!(setup.unregister().unwrap());
        assert_eq!(
            fs_err::read_to_string(&setup.init_file).unwrap(),
            "alias ll='ls -l'\nexport A=1\n"
        );
        assert!(!setup.unregister().unwrap());
    }
}
