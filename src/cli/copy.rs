use crate::backend::EnvBackend;
use crate::cli::args::{AttachArgs, DetachArgs};
use crate::config::Config;
use crate::error::SnapeError;
use crate::prompt::Prompt;
use crate::store::{CopyOptions, DeleteOptions, EnvLocator, Lifecycle, Locality, OverwritePolicy};
use anstream::println;
use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::{debug, info};

fn overwrite_policy(overwrite: bool) -> OverwritePolicy {
    if overwrite {
        OverwritePolicy::Force
    } else {
        OverwritePolicy::Ask
    }
}

/// Copies an arbitrary environment into a snape-managed one.
pub async fn attach(
    args: AttachArgs,
    config: &Config,
    backend: &impl EnvBackend,
    prompt: &impl Prompt,
) -> Result<()> {
    let locator = EnvLocator::new(config);
    let source = locator.ensure_environment(&args.env)?;
    debug!("Old venv found: {source}");

    if !args.local
        && args.global_name.is_none()
        && locator.classify(&source, true) == Locality::Global
    {
        debug!("Old environment is already known to snape");
        info!("Nothing to do");
        return Ok(());
    }

    let destination = if args.local {
        locator.resolve_path(None, true)?
    } else {
        let name = match args.global_name {
            Some(name) => name,
            None => source
                .path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| SnapeError::IllegalName(source.to_string()))?,
        };
        locator.resolve_path(Some(&name), false)?
    };

    let placement = if args.local { "local" } else { "global" };
    let question = format!(
        "Do you want to create a new {placement} environment named '{}' with the requirements of '{}'?",
        locator.canonical_name(&destination).unwrap_or_default(),
        args.env.display()
    );
    let options = CopyOptions {
        overwrite: overwrite_policy(args.overwrite),
        auto_upgrade: !args.no_update,
        quiet: args.quiet,
        confirm: (!args.no_ask).then_some(question),
        delete_source: args.delete_old.then_some(DeleteOptions {
            ask: !args.no_ask,
            ignore_active: args.ignore_active,
        }),
    };

    let lifecycle = Lifecycle::new(locator, backend, prompt);
    if let Some(copy) = lifecycle.copy_package_set(&source, &destination, &options).await? {
        println!(
            "Attached '{}' as {}",
            source.blue(),
            locator.canonical_name(&copy).unwrap_or_default().green()
        );
    }
    Ok(())
}

/// Copies a snape-managed environment to an arbitrary path.
pub async fn detach(
    args: DetachArgs,
    config: &Config,
    backend: &impl EnvBackend,
    prompt: &impl Prompt,
) -> Result<()> {
    let locator = EnvLocator::new(config);
    let source_path = locator.resolve_path(args.global_name.as_deref(), args.local)?;
    let source = locator.ensure_environment(&source_path)?;
    debug!("Old environment path: {source}");

    let destination = locator.absolute(&args.path);
    let placement = if args.local { "local" } else { "global" };
    let question = format!(
        "Do you want to create a new environment named '{}' with the requirements of the {placement} snape environment '{}'?",
        destination
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default(),
        locator.canonical_name(&source).unwrap_or_default()
    );
    let options = CopyOptions {
        overwrite: overwrite_policy(args.overwrite),
        auto_upgrade: !args.no_update,
        quiet: args.quiet,
        confirm: (!args.no_ask).then_some(question),
        delete_source: args.delete_old.then_some(DeleteOptions {
            ask: !args.no_ask,
            ignore_active: args.ignore_active,
        }),
    };

    let lifecycle = Lifecycle::new(locator, backend, prompt);
    if let Some(copy) = lifecycle.copy_package_set(&source, &destination, &options).await? {
        println!(
            "Detached '{}' to {}",
            locator.canonical_name(&source).unwrap_or_default().green(),
            copy.blue()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Shell;
    use crate::store::testing::{FakeBackend, Sandbox, ScriptedPrompt, make_env};
    use std::path::PathBuf;

    fn attach_args(env: PathBuf) -> AttachArgs {
        AttachArgs {
            env,
            local: false,
            global_name: None,
            ignore_active: false,
            overwrite: false,
            no_ask: true,
            quiet: true,
            no_update: true,
            delete_old: false,
        }
    }

    fn detach_args(path: &str) -> DetachArgs {
        DetachArgs {
            path: PathBuf::from(path),
            local: false,
            global_name: Some("demo".to_string()),
            overwrite: false,
            no_update: true,
            quiet: true,
            delete_old: false,
            ignore_active: false,
            no_ask: false,
        }
    }

    #[tokio::test]
    async fn test_attach_uses_source_directory_name() {
        let sandbox = Sandbox::new();
        let source = sandbox.work().join("legacy");
        make_env(&source, Shell::Bash);
        let backend = FakeBackend::new(Shell::Bash).with_packages(&source, &["rich==13.7.1"]);
        let prompt = ScriptedPrompt::default();

        attach(attach_args(PathBuf::from("legacy")), sandbox.config(), &backend, &prompt)
            .await
            .unwrap();

        let copy = sandbox.root().join("legacy");
        assert!(sandbox.locator().is_valid_environment(&copy));
        assert_eq!(backend.installs.borrow()[0].0, copy);
        assert!(source.is_dir());
    }

    #[tokio::test]
    async fn test_attach_asks_and_deletes_old_environment() {
        let sandbox = Sandbox::new();
        let source = sandbox.work().join("legacy");
        make_env(&source, Shell::Bash);
        let backend = FakeBackend::new(Shell::Bash);
        let prompt = ScriptedPrompt::answering(&[true, true]);
        let args = AttachArgs {
            global_name: Some("team/renamed".to_string()),
            no_ask: false,
            delete_old: true,
            ..attach_args(source.clone())
        };

        attach(args, sandbox.config(), &backend, &prompt).await.unwrap();

        assert!(sandbox.locator().is_valid_environment(sandbox.root().join("team/renamed")));
        assert!(!source.exists());
        let questions = prompt.questions.borrow();
        assert!(questions[0].starts_with(
            "Do you want to create a new global environment named 'team/renamed'"
        ));
        assert!(questions[1].starts_with("Are you sure you want to delete"));
    }

    #[tokio::test]
    async fn test_attach_global_environment_is_a_no_op() {
        let sandbox = Sandbox::new();
        let source = sandbox.root().join("demo");
        make_env(&source, Shell::Bash);
        let backend = FakeBackend::new(Shell::Bash);
        let prompt = ScriptedPrompt::default();

        attach(attach_args(source), sandbox.config(), &backend, &prompt)
            .await
            .unwrap();
        assert!(backend.creates.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_attach_declined_is_cancelled() {
        let sandbox = Sandbox::new();
        let source = sandbox.work().join("legacy");
        make_env(&source, Shell::Bash);
        let backend = FakeBackend::new(Shell::Bash);
        let prompt = ScriptedPrompt::answering(&[false]);
        let args = AttachArgs {
            no_ask: false,
            delete_old: true,
            ..attach_args(source.clone())
        };

        let err = attach(args, sandbox.config(), &backend, &prompt)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapeError>(),
            Some(SnapeError::Cancelled)
        ));
        assert!(source.is_dir());
        assert!(backend.creates.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_detach_local_to_same_path_is_a_no_op() {
        let sandbox = Sandbox::new();
        make_env(&sandbox.work().join(".venv"), Shell::Bash);
        let backend = FakeBackend::new(Shell::Bash);
        let prompt = ScriptedPrompt::default();
        let args = DetachArgs {
            path: PathBuf::from(".venv"),
            local: true,
            global_name: None,
            overwrite: false,
            no_update: true,
            quiet: true,
            delete_old: true,
            ignore_active: false,
            no_ask: true,
        };

        detach(args, sandbox.config(), &backend, &prompt).await.unwrap();
        assert!(backend.creates.borrow().is_empty());
        assert!(sandbox.work().join(".venv").is_dir());
    }

    #[tokio::test]
    async fn test_detach_global_environment() {
        let sandbox = Sandbox::new();
        let source = sandbox.root().join("demo");
        make_env(&source, Shell::Bash);
        let backend =
            FakeBackend::new(Shell::Bash).with_packages(&source, &["numpy==2.0.0", "rich==13.7.1"]);
        let prompt = ScriptedPrompt::answering(&[true]);

        detach(detach_args("exported"), sandbox.config(), &backend, &prompt)
            .await
            .unwrap();
        let exported = sandbox.work().join("exported");
        assert!(sandbox.locator().is_valid_environment(&exported));
        assert_eq!(backend.installs.borrow()[0].1.len(), 2);
        assert!(source.is_dir());
        assert_eq!(
            prompt.questions.borrow().as_slice(),
            ["Do you want to create a new environment named 'exported' with the requirements \
              of the global snape environment 'demo'?"]
        );
    }

    #[tokio::test]
    async fn test_detach_declined_is_cancelled() {
        let sandbox = Sandbox::new();
        let source = sandbox.root().join("demo");
        make_env(&source, Shell::Bash);
        let backend = FakeBackend::new(Shell::Bash);
        let prompt = ScriptedPrompt::answering(&[false]);
        let args = DetachArgs {
            delete_old: true,
            ..detach_args("exported")
        };

        let err = detach(args, sandbox.config(), &backend, &prompt)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapeError>(),
            Some(SnapeError::Cancelled)
        ));
        assert!(backend.creates.borrow().is_empty());
        assert!(!sandbox.work().join("exported").exists());
        assert!(source.is_dir());
    }

    #[tokio::test]
    async fn test_detach_without_asking() {
        let sandbox = Sandbox::new();
        make_env(&sandbox.root().join("demo"), Shell::Bash);
        let backend = FakeBackend::new(Shell::Bash);
        let prompt = ScriptedPrompt::default();
        let args = DetachArgs {
            no_ask: true,
            ..detach_args("exported")
        };

        detach(args, sandbox.config(), &backend, &prompt).await.unwrap();
        assert!(prompt.questions.borrow().is_empty());
        assert_eq!(backend.creates.borrow().len(), 1);
    }
}
