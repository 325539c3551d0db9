pub(crate) const DEFAULT_USER_AGENT: &str = concat!("surge/", env!("CARGO_PKG_VERSION"));

pub(crate) const DEFAULT_STATUS_CODE: u16 = 200;
pub(crate) const DEFAULT_LOG_SAMPLING: f64 = 1.0;
/// Open-file limit and RAM checks assume this much kernel/user memory per connection.
pub(crate) const MEMORY_PER_CONNECTION_BYTES: u64 = 128 * 1024;
