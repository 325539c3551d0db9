//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;

pub use cli::SurgeArgs;
pub use types::{ByteUnits, FormField, HttpMethod, HttpVersion, PositiveU64, PositiveUsize};

pub(crate) use defaults::{DEFAULT_LOG_SAMPLING, DEFAULT_USER_AGENT, MEMORY_PER_CONNECTION_BYTES};
pub(crate) use parsers::{parse_form_field, parse_header};
