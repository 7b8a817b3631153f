pub mod lifecycle;
pub mod locator;
#[cfg(test)]
pub mod testing;

pub use lifecycle::{CopyOptions, DeleteOptions, Lifecycle, OverwritePolicy};
pub use locator::{EnvLocator, Locality, VirtualEnv};
