//! Configuration loading, CLI merging, and validation into a [`RunConfig`].
mod apply;
mod loader;
pub mod types;
mod validate;

#[cfg(test)]
mod test_support;

pub use apply::apply_config;
pub(crate) use loader::DEFAULT_CONFIG_FILES;
pub use loader::load_config;
pub use types::{ConfigFile, RunConfig};
pub use validate::build_run_config;
