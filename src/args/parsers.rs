use std::path::PathBuf;

use super::types::{FormField, PositiveU64, PositiveUsize};
use crate::error::{AppError, AppResult, ValidationError};

pub(crate) fn parse_header(s: &str) -> Result<(String, String), ValidationError> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        Some(_) | None => Err(ValidationError::InvalidHeaderFormat {
            value: s.to_owned(),
        }),
    }
}

/// Parses `name=value` into a text part and `@name=path` into a file part.
pub(crate) fn parse_form_field(s: &str) -> Result<FormField, ValidationError> {
    let invalid = || ValidationError::InvalidFormFieldFormat {
        value: s.to_owned(),
    };
    let (name, value) = s.split_once('=').ok_or_else(invalid)?;
    let name = name.trim();
    if let Some(file_name) = name.strip_prefix('@') {
        if file_name.is_empty() || value.trim().is_empty() {
            return Err(invalid());
        }
        return Ok(FormField::File {
            name: file_name.to_owned(),
            path: PathBuf::from(value.trim()),
        });
    }
    if name.is_empty() {
        return Err(invalid());
    }
    Ok(FormField::Text {
        name: name.to_owned(),
        value: value.to_owned(),
    })
}

pub(super) fn parse_positive_u64(s: &str) -> AppResult<PositiveU64> {
    s.parse::<PositiveU64>().map_err(AppError::from)
}

pub(super) fn parse_positive_usize(s: &str) -> AppResult<PositiveUsize> {
    s.parse::<PositiveUsize>().map_err(AppError::from)
}

/// Accepts any finite float; the (0, 1] range is enforced when the run config is built.
pub(super) fn parse_sampling(s: &str) -> AppResult<f64> {
    s.trim().parse::<f64>().map_err(|err| {
        AppError::validation(ValidationError::InvalidProbability {
            value: s.to_owned(),
            source: err,
        })
    })
}
