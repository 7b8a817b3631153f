use crate::config::Shell;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const ABOUT: &str = "Snape is a wrapper around Python's venv. It (de)activates virtual environments for you and manages them.";

const LONG_ABOUT: &str = "\
Snape is a wrapper around Python's venv. It (de)activates virtual environments for you and manages them.

activate:
  Call snape without any arguments to activate an environment inside the current working directory
  or any of its parent directories. To activate a global environment named \"my-venv\", call
  \"snape my-venv\". Activation is done by the shell function installed with \"snape setup init\".

global environments:
  Environments which can be activated from anywhere. They live below $SNAPE_ROOT (default: ~/.snape)
  and may be nested, e.g. \"team/project\".

local environments:
  Environments inside a working directory, named $SNAPE_VENV (default: .venv). Each directory can
  only contain a single local environment. Most commands accept --local to work with it.";

#[derive(Parser, Debug)]
#[command(
    name = "snape",
    version,
    about = ABOUT,
    long_about = LONG_ABOUT,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Select a specific shell, especially useful for snape setup
    #[arg(short, long, value_enum, value_name = "SHELL")]
    pub shell: Option<Shell>,

    /// Disable informational output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new environment
    #[command(visible_alias = "touch")]
    New(NewArgs),
    /// Delete an existing environment
    #[command(visible_alias = "rm")]
    Delete(DeleteArgs),
    /// Copy any environment to a snape-managed environment
    #[command(visible_alias = "possess")]
    Attach(AttachArgs),
    /// Copy a snape-managed environment to a new environment
    Detach(DetachArgs),
    /// List information on the current status of snape
    Status(StatusArgs),
    /// List information on a snape environment
    Env(EnvArgs),
    /// Delete unclassified global environments
    Clean(CleanArgs),
    /// Manage the snape installation
    Setup(SetupArgs),
    /// Execute a command using a specific snape environment
    Exec(ExecArgs),
    /// Print this help and exit
    Help,
}

impl Commands {
    /// Whether the command may run before the global root exists.
    pub fn allows_missing_root(&self) -> bool {
        matches!(
            self,
            Commands::Help
                | Commands::Setup(SetupArgs {
                    command: None | Some(SetupCommand::Init),
                })
        )
    }
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// The name of the new environment
    pub env: Option<String>,

    /// Overwrite existing environments without prompting first
    #[arg(short, long)]
    pub overwrite: bool,

    /// Do not update pip after initializing the environment
    #[arg(short, long)]
    pub no_update: bool,

    /// Prompt shown while the environment is active
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Install the packages of a requirements file or another environment
    #[arg(short, long, value_name = "SOURCE")]
    pub requirements: Option<PathBuf>,

    /// Install a package into the new environment, may be given multiple times
    #[arg(short, long, value_name = "PACKAGE")]
    pub install: Vec<String>,

    /// Hide output from pip when installing packages
    #[arg(short, long)]
    pub quiet: bool,

    /// Create a snape environment in the current directory, not allowed with ENV
    #[arg(short, long, visible_alias = "here", conflicts_with = "env")]
    pub local: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// The name of the environment to delete
    pub env: Option<String>,

    /// Do not ask before deleting the environment
    #[arg(short = 'f', long)]
    pub no_ask: bool,

    /// Do not fail if the environment does not exist
    #[arg(short = 'e', long)]
    pub ignore_not_exists: bool,

    /// Remove the snape environment from the current directory, not allowed with ENV
    #[arg(short, long, visible_alias = "here", conflicts_with = "env")]
    pub local: bool,

    /// Do not fail if the environment is currently active
    #[arg(short = 'r', long)]
    pub ignore_active: bool,
}

#[derive(Args, Debug)]
pub struct AttachArgs {
    /// The path to the environment to make available to snape
    pub env: PathBuf,

    /// Make the new environment local, not global
    #[arg(short, long, visible_alias = "here")]
    pub local: bool,

    /// Give the new environment another name than the old one
    #[arg(short, long, value_name = "NAME", conflicts_with = "local")]
    pub global_name: Option<String>,

    /// Do not fail if the old environment is currently active (with -d)
    #[arg(short, long)]
    pub ignore_active: bool,

    /// Overwrite an existing environment having the new name
    #[arg(short, long)]
    pub overwrite: bool,

    /// Do not prompt before creating the new environment
    #[arg(short = 'a', long)]
    pub no_ask: bool,

    /// Hide output from pip when installing packages
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not update pip after initializing the new environment
    #[arg(short, long)]
    pub no_update: bool,

    /// Delete the old environment after it has been copied successfully
    #[arg(short, long)]
    pub delete_old: bool,
}

#[derive(Args, Debug)]
pub struct DetachArgs {
    /// The path to the new environment
    #[arg(value_name = "NEW_ENV_PATH")]
    pub path: PathBuf,

    /// Detach the local environment, not allowed with -g
    #[arg(short, long, visible_alias = "here", conflicts_with = "global_name")]
    pub local: bool,

    /// The name of the global environment to detach
    #[arg(short, long, value_name = "ENV")]
    pub global_name: Option<String>,

    /// Overwrite an existing environment at the new path
    #[arg(short, long)]
    pub overwrite: bool,

    /// Do not update pip after initializing the new environment
    #[arg(short, long)]
    pub no_update: bool,

    /// Hide output from pip when installing packages
    #[arg(short, long)]
    pub quiet: bool,

    /// Delete the old environment after it has been copied successfully
    #[arg(short, long)]
    pub delete_old: bool,

    /// Do not fail if the old environment is currently active (with -d)
    #[arg(short, long, requires = "delete_old")]
    pub ignore_active: bool,

    /// Do not prompt before creating the new environment or deleting the old one
    #[arg(short = 'a', long)]
    pub no_ask: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print all information as JSON
    #[arg(short, long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct EnvArgs {
    /// The global environment to list information on, defaults to the active environment
    pub env: Option<String>,

    /// List information on the local environment
    #[arg(short, long, visible_alias = "here", conflicts_with = "env")]
    pub local: bool,

    /// Format all output as a single JSON object
    #[arg(short, long)]
    pub raw: bool,

    /// List all information, same as -p -s
    #[arg(short, long)]
    pub all: bool,

    /// List installed packages with version information
    #[arg(short, long)]
    pub packages: bool,

    /// Print the size of the environment
    #[arg(short, long)]
    pub size: bool,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Check for a broken local environment
    #[arg(short, long, visible_alias = "here")]
    pub local: bool,

    /// Do not ask before deleting unclassified files
    #[arg(short, long)]
    pub no_ask: bool,
}

#[derive(Args, Debug)]
pub struct SetupArgs {
    #[command(subcommand)]
    pub command: Option<SetupCommand>,
}

#[derive(Subcommand, Debug)]
pub enum SetupCommand {
    /// Initialize the snape installation
    Init,
    /// Remove the snape installation
    Remove(SetupRemoveArgs),
}

#[derive(Args, Debug)]
pub struct SetupRemoveArgs {
    /// Remove everything snape changed for the current shell
    #[arg(short, long)]
    pub all: bool,

    /// Undo the effects of snape setup init
    #[arg(short, long)]
    pub init: bool,

    /// Remove the snape root directory containing all global environments
    #[arg(short, long)]
    pub root: bool,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// The global environment to execute the command in
    #[arg(short, long, visible_alias = "inside", value_name = "ENV")]
    pub env: Option<String>,

    /// Use the local environment instead of a global one
    #[arg(short, long, visible_alias = "here", conflicts_with = "env")]
    pub local: bool,

    /// The working directory of the command, defaults to the current one
    #[arg(short = 'd', long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Symbol to enclose each part of the command with; escaped inside each part with a backslash
    #[arg(short, long, value_name = "SYMBOL", default_value = "'")]
    pub quote: String,

    /// Run a python script; CMD is the script's path followed by its arguments
    #[arg(short, long)]
    pub script: bool,

    /// Run CMD as a series of python statements instead of shell commands
    #[arg(short, long, conflicts_with = "script")]
    pub python: bool,

    /// The command to execute
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub cmd: Vec<String>,
}
