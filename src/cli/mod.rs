pub mod args;
pub mod copy;
pub mod env;
pub mod exec;
pub mod setup;
