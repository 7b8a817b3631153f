/// Names of the environment variables read by snape.
pub struct EnvVars;

impl EnvVars {
    /// The shell snape runs in; only the basename is used (`/usr/bin/zsh` -> `zsh`).
    pub const SHELL: &'static str = "SHELL";

    /// The currently active Python environment, set by the activation script.
    pub const VIRTUAL_ENV: &'static str = "VIRTUAL_ENV";

    /// The directory holding all global snape environments.
    pub const SNAPE_ROOT: &'static str = "SNAPE_ROOT";

    /// The directory name of local snape environments.
    pub const SNAPE_VENV: &'static str = "SNAPE_VENV";

    /// The interpreter used to create new environments.
    pub const SNAPE_PYTHON: &'static str = "SNAPE_PYTHON";

    /// The directory containing the `snape.<shell>` activation scripts.
    pub const SNAPE_SH_DIR: &'static str = "SNAPE_SH_DIR";

    /// Overrides the log filter, e.g. `SNAPE_LOG=debug`.
    pub const SNAPE_LOG: &'static str = "SNAPE_LOG";
}
