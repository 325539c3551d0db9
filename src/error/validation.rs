use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid header format: '{value}'. Expected 'Key: Value'")]
    InvalidHeaderFormat { value: String },
    #[error("Invalid form field: '{value}'. Expected 'name=value' or '@name=path'")]
    InvalidFormFieldFormat { value: String },
    #[error("Invalid HTTP version '{value}'. Use 1.1 or 2.")]
    InvalidHttpVersion { value: String },
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid probability '{value}': {source}")]
    InvalidProbability {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("Missing URL (set --url or provide req.url in config).")]
    MissingUrl,
    #[error("URL '{url}' must use http or https.")]
    UnsupportedScheme { url: String },
    #[error("URL '{url}' has no host.")]
    MissingHost { url: String },
    #[error("Ramp of {ramp_secs}s does not fit twice into a {duration_secs}s run.")]
    RampTooLong { ramp_secs: u64, duration_secs: u64 },
    #[error("Content type multipart/form-data requires at least one form field.")]
    MultipartWithoutForm,
    #[error("Concurrency {value} exceeds the supported maximum of {max}.")]
    ConcurrencyTooLarge { value: usize, max: usize },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
