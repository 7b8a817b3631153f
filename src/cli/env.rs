use crate::backend::EnvBackend;
use crate::cli::args::{CleanArgs, DeleteArgs, EnvArgs, NewArgs, StatusArgs};
use crate::config::Config;
use crate::error::SnapeError;
use crate::paths::dir_size;
use crate::prompt::Prompt;
use crate::store::{DeleteOptions, EnvLocator, Lifecycle, Locality, OverwritePolicy, VirtualEnv};
use anstream::println;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the packages of a new environment come from.
enum RequirementsSource {
    File(PathBuf),
    Environment(VirtualEnv),
}

impl RequirementsSource {
    fn locate(locator: &EnvLocator<'_>, source: &Path) -> Result<Self> {
        let source = locator.absolute(source);
        if source.is_file() {
            return Ok(RequirementsSource::File(source));
        }
        if locator.is_valid_environment(&source) {
            return Ok(RequirementsSource::Environment(locator.ensure_environment(&source)?));
        }
        anyhow::bail!("Requirements file or environment not found: {}", source.display())
    }
}

pub async fn new(
    args: NewArgs,
    config: &Config,
    backend: &impl EnvBackend,
    prompt: &impl Prompt,
) -> Result<()> {
    let locator = EnvLocator::new(config);
    let path = locator.resolve_path(args.env.as_deref(), args.local)?;
    debug!("Directory for new venv: {}", path.display());

    // Check the requirements before anything is created
    let requirements = args
        .requirements
        .as_deref()
        .map(|source| RequirementsSource::locate(&locator, source))
        .transpose()?;
    let copied = match &requirements {
        Some(RequirementsSource::Environment(source)) => {
            let packages = backend.list_installed(source.path()).await?;
            if packages.is_empty() {
                info!("Note: No additional packages were installed in '{source}'");
            }
            packages
        }
        _ => Vec::new(),
    };

    let overwrite = if args.overwrite {
        OverwritePolicy::Force
    } else {
        OverwritePolicy::Ask
    };
    let name = locator.canonical_name(&path);
    let display_name = args.prompt.as_deref().or(name.as_deref());
    let lifecycle = Lifecycle::new(locator, backend, prompt);
    let Some(env) = lifecycle
        .create(&path, overwrite, !args.no_update, display_name)
        .await?
    else {
        return Ok(());
    };

    let installed = match &requirements {
        Some(RequirementsSource::File(file)) => {
            debug!("Requirements file: {}", file.display());
            backend
                .install_requirements(env.path(), file, args.quiet)
                .await?
        }
        Some(RequirementsSource::Environment(_)) => {
            backend.install(env.path(), &copied, args.quiet).await?
        }
        None => true,
    };
    if !installed {
        return Err(SnapeError::PackageInstallIncomplete(env.path().to_path_buf()).into());
    }

    if !args.install.is_empty() {
        info!("Installing additional packages: {}", args.install.join(", "));
        if !backend.install(env.path(), &args.install, args.quiet).await? {
            return Err(SnapeError::PackageInstallIncomplete(env.path().to_path_buf()).into());
        }
    }

    println!(
        "Environment '{}' created at {}",
        name.unwrap_or_default().green(),
        env.blue()
    );
    Ok(())
}

pub fn delete(
    args: DeleteArgs,
    config: &Config,
    backend: &impl EnvBackend,
    prompt: &impl Prompt,
) -> Result<()> {
    let locator = EnvLocator::new(config);
    let path = locator.resolve_path(args.env.as_deref(), args.local)?;
    debug!("Directory of old venv: {}", path.display());

    let env = match locator.ensure_environment(&path) {
        Ok(env) => env,
        Err(SnapeError::NotADirectory(_)) if args.ignore_not_exists => {
            debug!("{} does not exist, nothing to delete", path.display());
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let options = DeleteOptions {
        ask: !args.no_ask,
        ignore_active: args.ignore_active,
    };
    Lifecycle::new(locator, backend, prompt).delete(&env, options)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct GlobalEnvStatus {
    name: Option<String>,
    path: PathBuf,
    active: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    shell: String,
    python_venv: Option<PathBuf>,
    snape_env: Option<String>,
    snape_root: PathBuf,
    snape_envs: Vec<GlobalEnvStatus>,
    local_default: String,
    local_venv: PathBuf,
    local_exists: bool,
    local_active: bool,
    local_chain: Vec<PathBuf>,
}

fn collect_status(config: &Config) -> Result<StatusReport> {
    let locator = EnvLocator::new(config);
    let local_venv = locator.resolve_path(None, true)?;
    let local_exists = locator.is_valid_environment(&local_venv);

    let snape_envs = locator
        .enumerate_global()
        .context("Failed to read the snape root")?
        .into_iter()
        .map(|env| GlobalEnvStatus {
            name: locator.canonical_name(&env),
            active: locator.is_active(&env),
            path: env.path().to_path_buf(),
        })
        .collect();

    Ok(StatusReport {
        shell: config.shell.to_string(),
        python_venv: config.active_env.clone(),
        snape_env: config
            .active_env
            .as_ref()
            .and_then(|env| locator.canonical_name(env)),
        snape_root: config.root.clone(),
        snape_envs,
        local_default: config.local_name.clone(),
        local_active: local_exists && locator.is_active(&local_venv),
        local_venv,
        local_exists,
        local_chain: locator
            .local_chain(&config.working_dir)
            .map(|env| env.path().to_path_buf())
            .collect(),
    })
}

pub fn status(args: StatusArgs, config: &Config) -> Result<()> {
    let status = collect_status(config)?;
    debug!("{status:?}");

    if args.raw {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let or_none = |value: Option<String>| value.unwrap_or_else(|| "None".to_string());
    println!("Python venv:");
    println!(
        "    Current:       {}",
        or_none(status.python_venv.map(|env| env.display().to_string()))
    );
    println!("    Snape name:    {}", or_none(status.snape_env));
    println!();
    println!("Global snape environments:");
    println!("    Snape root:    {}", status.snape_root.display().blue());
    println!("    Available environments:");
    for env in &status.snape_envs {
        let name = env
            .name
            .clone()
            .unwrap_or_else(|| env.path.display().to_string());
        if env.active {
            println!("        {} {}", "*".green(), name.green().bold());
        } else {
            println!("        * {name}");
        }
    }
    println!();
    println!("Local snape environments:");
    println!("    Directory:     {}", status.local_default);
    let local_status = match (status.local_exists, status.local_active) {
        (false, _) => "not found",
        (true, true) => "active",
        (true, false) => "inactive",
    };
    println!("    Status:        {local_status}");
    for env in &status.local_chain {
        println!("    Reachable:     {}", env.display().blue());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct EnvReport {
    name: Option<String>,
    global: bool,
    path: PathBuf,
    active: bool,
    activate_command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    packages: Option<Vec<String>>,
}

pub async fn env_info(args: EnvArgs, config: &Config, backend: &impl EnvBackend) -> Result<()> {
    let locator = EnvLocator::new(config);
    let path = if args.env.is_none() && !args.local {
        match &config.active_env {
            Some(active) if locator.is_valid_environment(active) => active.clone(),
            _ => {
                return Err(SnapeError::InvalidArgument(
                    "No environment specified and no active environment found".to_string(),
                )
                .into());
            }
        }
    } else {
        locator.resolve_path(args.env.as_deref(), args.local)?
    };
    let env = locator.ensure_environment(&path)?;

    let locality = locator.classify(&env, true);
    let name = locator.canonical_name(&env);
    let activate_command = match (locality, &name) {
        (Locality::Global, Some(name)) => format!("snape {name}"),
        (Locality::Local, _) => "snape".to_string(),
        _ => format!("source '{}'", env.path().join(config.shell.activate_file()).display()),
    };

    let size_mb = if args.all || args.size {
        debug!("Collecting size");
        let kilobytes = dir_size(env.path())? >> 10;
        Some((kilobytes as f64 / 1024.0 * 1000.0).round() / 1000.0)
    } else {
        None
    };
    let packages = if args.all || args.packages {
        Some(backend.list_installed(env.path()).await?)
    } else {
        None
    };

    let report = EnvReport {
        name,
        global: locality == Locality::Global,
        active: locator.is_active(&env),
        path: env.path().to_path_buf(),
        activate_command,
        size_mb,
        packages,
    };

    if args.raw {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let yes_no = |value: bool| if value { "Yes" } else { "No" };
    println!("{:<12} {}", "Name:", report.name.as_deref().unwrap_or("None"));
    println!(
        "{:<12} {}",
        "Placement:",
        if report.global { "global" } else { "local" }
    );
    println!("{:<12} {}", "Path:", report.path.display().blue());
    println!("{:<12} {}", "Active:", yes_no(report.active));
    println!("{:<12} {}", "Command:", report.activate_command);
    if let Some(size) = report.size_mb {
        println!("{:<12} {size}", "Size (MB):");
    }
    if let Some(packages) = &report.packages {
        println!("Installed packages:");
        for package in packages {
            println!("\t{package}");
        }
    }
    Ok(())
}

pub fn clean(args: CleanArgs, config: &Config, prompt: &impl Prompt) -> Result<()> {
    let locator = EnvLocator::new(config);

    if args.local {
        let local = locator.resolve_path(None, true)?;
        debug!("Checking local environment at {}", local.display());
        if !local.is_dir() {
            info!("No local environment found");
        } else if locator.is_valid_environment(&local) {
            info!("Nothing to do");
        } else if args.no_ask || prompt.ask("Remove broken local environment?", Some(true))? {
            debug!("Removing directory {}", local.display());
            fs_err::remove_dir_all(&local)?;
            info!("Removed broken local environment");
        }
        return Ok(());
    }

    debug!("Collecting unknown files at {}", config.root.display());
    let envs = locator.enumerate_global()?;
    let mut unknown = Vec::new();
    for entry in fs_err::read_dir(&config.root)? {
        let path = entry?.path();
        // directories holding nested environments are namespaces, not garbage
        if !envs.iter().any(|env| env.path().starts_with(&path)) {
            unknown.push(path);
        }
    }
    unknown.sort();
    debug!("Unknown files: {unknown:?}");

    if unknown.is_empty() {
        info!("Nothing to do");
        return Ok(());
    }

    println!("Global environments:");
    for env in &envs {
        println!("   * {}", locator.canonical_name(env).unwrap_or_default());
    }
    println!("Other files:");
    for path in &unknown {
        let kind = if path.is_dir() { "[dir]" } else { "[file]" };
        let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
        println!("   > {} {kind}", name.red());
    }

    let question = "Do you want to delete all files that are no valid global environments?";
    if !args.no_ask && !prompt.ask(question, Some(true))? {
        return Ok(());
    }
    for path in &unknown {
        let metadata = fs_err::symlink_metadata(path)?;
        if metadata.is_dir() {
            debug!("Removing directory {}", path.display());
            fs_err::remove_dir_all(path)?;
        } else {
            debug!("Removing file {}", path.display());
            fs_err::remove_file(path)?;
        }
    }
    info!("Snape cleanup done");
    Ok(())
}
