use std::path::Path;

use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::args::SurgeArgs;
use crate::error::{AppError, AppResult};

use super::loader;
use super::types::ConfigFile;

pub(crate) fn load_config_file(path: &Path) -> AppResult<ConfigFile> {
    loader::load_config_file(path)
}

pub(crate) fn parse_with_matches(raw: &[&str]) -> AppResult<(SurgeArgs, ArgMatches)> {
    let matches = SurgeArgs::command()
        .try_get_matches_from(raw)
        .map_err(AppError::from)?;
    let args = SurgeArgs::from_arg_matches(&matches).map_err(AppError::from)?;
    Ok((args, matches))
}
