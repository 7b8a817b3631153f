//! Fabricated configurations, a fake backend and scripted prompts for tests.

use crate::backend::{CreateOptions, EnvBackend};
use crate::config::{Config, ForbiddenNames, PYTHON_BIN, Shell};
use crate::error::{Result, SnapeError};
use crate::prompt::Prompt;
use crate::store::locator::EnvLocator;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes the files that make `path` a valid environment for `shell`.
pub fn make_env(path: &Path, shell: Shell) {
    fs_err::create_dir_all(path.join("bin")).unwrap();
    fs_err::write(path.join(PYTHON_BIN), "#!/bin/sh\n").unwrap();
    fs_err::write(path.join(shell.activate_file()), "# activate\n").unwrap();
}

/// A temporary directory holding a global root and a working directory.
pub struct Sandbox {
    _temp_dir: TempDir,
    config: Config,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_shell(Shell::Bash)
    }

    pub fn with_shell(shell: Shell) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().canonicalize().unwrap();
        let root = base.join("snape-root");
        let work = base.join("work");
        fs_err::create_dir(&root).unwrap();
        fs_err::create_dir(&work).unwrap();

        let config = Config::new(
            root,
            ".venv".to_string(),
            shell,
            None,
            work,
            "python3".to_string(),
            ForbiddenNames::seeded(),
        )
        .unwrap();
        Sandbox {
            _temp_dir: temp_dir,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn work(&self) -> &Path {
        &self.config.working_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_with_active(&self, active_env: Option<PathBuf>) -> Config {
        Config {
            active_env,
            ..self.config.clone()
        }
    }

    pub fn locator(&self) -> EnvLocator<'_> {
        EnvLocator::new(&self.config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    pub path: PathBuf,
    pub clear: bool,
    pub upgrade_deps: bool,
    pub prompt: Option<String>,
}

/// Materializes environments on disk and serves package lists from memory.
pub struct FakeBackend {
    shell: Shell,
    pub packages: RefCell<HashMap<PathBuf, Vec<String>>>,
    pub unreadable: RefCell<Vec<PathBuf>>,
    pub failing_packages: Vec<String>,
    /// Report success from `create` without writing anything.
    pub hollow: bool,
    pub creates: RefCell<Vec<CreateCall>>,
    pub installs: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl FakeBackend {
    pub fn new(shell: Shell) -> Self {
        FakeBackend {
            shell,
            packages: RefCell::default(),
            unreadable: RefCell::default(),
            failing_packages: Vec::new(),
            hollow: false,
            creates: RefCell::default(),
            installs: RefCell::default(),
        }
    }

    pub fn with_packages(self, env: &Path, packages: &[&str]) -> Self {
        self.packages.borrow_mut().insert(
            env.to_path_buf(),
            packages.iter().map(|package| package.to_string()).collect(),
        );
        self
    }
}

impl EnvBackend for FakeBackend {
    async fn create(&self, path: &Path, options: &CreateOptions<'_>) -> Result<()> {
        self.creates.borrow_mut().push(CreateCall {
            path: path.to_path_buf(),
            clear: options.clear,
            upgrade_deps: options.upgrade_deps,
            prompt: options.prompt.map(str::to_string),
        });
        if self.hollow {
            return Ok(());
        }
        if options.clear && path.exists() {
            fs_err::remove_dir_all(path)?;
        }
        make_env(path, self.shell);
        Ok(())
    }

    async fn list_installed(&self, env: &Path) -> Result<Vec<String>> {
        if self.unreadable.borrow().iter().any(|path| path == env) {
            return Err(SnapeError::PackageListUnreadable {
                env: env.to_path_buf(),
                reason: "pip exited with 1".to_string(),
            });
        }
        Ok(self.packages.borrow().get(env).cloned().unwrap_or_default())
    }

    async fn install(&self, env: &Path, packages: &[String], _quiet: bool) -> Result<bool> {
        if packages.is_empty() {
            return Ok(true);
        }
        self.installs
            .borrow_mut()
            .push((env.to_path_buf(), packages.to_vec()));
        self.packages
            .borrow_mut()
            .entry(env.to_path_buf())
            .or_default()
            .extend(packages.iter().cloned());
        Ok(!packages
            .iter()
            .any(|package| self.failing_packages.contains(package)))
    }

    async fn install_requirements(
        &self,
        env: &Path,
        requirements: &Path,
        quiet: bool,
    ) -> Result<bool> {
        let content = fs_err::read_to_string(requirements)?;
        let packages: Vec<String> = content.lines().map(str::to_string).collect();
        self.install(env, &packages, quiet).await
    }
}

/// Answers questions from a queue and remembers what was asked.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: RefCell<VecDeque<bool>>,
    pub questions: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn answering(answers: &[bool]) -> Self {
        ScriptedPrompt {
            answers: RefCell::new(answers.iter().copied().collect()),
            questions: RefCell::default(),
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&self, question: &str, _default: Option<bool>) -> Result<bool> {
        self.questions.borrow_mut().push(question.to_string());
        match self.answers.borrow_mut().pop_front() {
            Some(answer) => Ok(answer),
            None => panic!("unexpected question: {question}"),
        }
    }
}
