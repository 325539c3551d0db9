use clap::Parser;

use crate::error::{AppError, AppResult};

use super::SurgeArgs;

pub(crate) fn parse_test_args<I, T>(args: I) -> AppResult<SurgeArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    SurgeArgs::try_parse_from(args).map_err(AppError::from)
}
