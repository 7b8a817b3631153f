use crate::cli::args::ExecArgs;
use crate::config::{Config, PYTHON_BIN};
use crate::error::SnapeError;
use crate::store::EnvLocator;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Encloses `part` in `quote`, escaping `quote` inside it with a backslash.
fn quote_part(part: &str, quote: &str) -> String {
    if quote.is_empty() {
        return part.to_string();
    }
    format!("{quote}{}{quote}", part.replace(quote, &format!("\\{quote}")))
}

fn quote_command(cmd: &[String], quote: &str) -> String {
    cmd.iter()
        .map(|part| quote_part(part, quote))
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn exec(args: ExecArgs, config: &Config) -> Result<()> {
    let locator = EnvLocator::new(config);
    let path = locator.resolve_path(args.env.as_deref(), args.local)?;
    let env = locator.ensure_environment(&path)?;
    debug!("Using snape environment: {env}");

    let working_dir = match &args.working_dir {
        Some(dir) => {
            let dir = locator.absolute(dir);
            if !dir.is_dir() {
                return Err(SnapeError::NotADirectory(dir).into());
            }
            dir
        }
        None => config.working_dir.clone(),
    };
    let python = env.path().join(PYTHON_BIN);

    let status = if args.python {
        let statements = args.cmd.join(";");
        info!("$ {}", args.cmd.join("\n$ "));
        debug!("$ {} -c {statements}", python.display());
        Command::new(&python)
            .args(["-c", &statements])
            .current_dir(&working_dir)
            .status()
            .await
            .with_context(|| format!("Failed to run {}", python.display()))?
    } else {
        let activate = env.path().join(config.shell.activate_file());
        let activate_line = format!("source {}", quote_part(&activate.to_string_lossy(), "'"));
        let mut command_line = quote_command(&args.cmd, &args.quote);
        if args.script {
            debug!("Running script with {}", python.display());
            command_line = format!(
                "{} {command_line}",
                quote_part(&python.to_string_lossy(), &args.quote)
            );
        }
        run_in_shell(config, &working_dir, &activate_line, &command_line).await?
    };

    if !status.success() {
        return Err(SnapeError::CommandFailed {
            code: status.code().unwrap_or(-1),
        }
        .into());
    }
    Ok(())
}

/// Feeds the activation and the command to a sub-shell over stdin.
async fn run_in_shell(
    config: &Config,
    working_dir: &Path,
    activate_line: &str,
    command_line: &str,
) -> Result<std::process::ExitStatus> {
    debug!("Using {} in sub-shell", config.shell);
    let mut child = Command::new(config.shell.name())
        .stdin(Stdio::piped())
        .current_dir(working_dir)
        .spawn()
        .with_context(|| format!("Failed to start {}", config.shell))?;

    info!("$ {activate_line}");
    info!("$ {command_line}");
    let mut stdin = child
        .stdin
        .take()
        .context("Failed to open the sub-shell's stdin")?;
    stdin
        .write_all(format!("{activate_line}\n{command_line}\n").as_bytes())
        .await?;
    drop(stdin);

    let status = child.wait().await?;
    info!("$ deactivate");
    Ok(status)
}
