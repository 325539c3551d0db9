use std::path::Path;
use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Request, Url};

use crate::args::{FormField, HttpMethod};
use crate::error::{AppError, AppResult, ConfigError, HttpError, ValidationError};

const URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A multipart part with file contents already loaded.
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        bytes: Arc<[u8]>,
    },
}

#[derive(Debug, Clone, Default)]
pub enum TemplateBody {
    #[default]
    Empty,
    Text(String),
    UrlEncoded(String),
    /// Rebuilt on every materialisation: each request gets a fresh boundary.
    Multipart(Arc<[FormPart]>),
}

impl TemplateBody {
    #[must_use]
    pub fn text(data: &str) -> Self {
        if data.is_empty() {
            TemplateBody::Empty
        } else {
            TemplateBody::Text(data.to_owned())
        }
    }

    /// Encodes form fields as `application/x-www-form-urlencoded`; file fields
    /// contribute their contents as the value.
    ///
    /// # Errors
    ///
    /// Returns an error when a referenced file cannot be read.
    pub fn url_encoded(fields: &[FormField]) -> AppResult<Self> {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for field in fields {
            match field {
                FormField::Text { name, value } => {
                    serializer.append_pair(name, value);
                }
                FormField::File { name, path } => {
                    let bytes = read_form_file(path)?;
                    serializer.append_pair(name, &String::from_utf8_lossy(&bytes));
                }
            }
        }
        Ok(TemplateBody::UrlEncoded(serializer.finish()))
    }

    /// Loads every file part once so workers never touch the filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error when a referenced file cannot be read.
    pub fn multipart(fields: &[FormField]) -> AppResult<Self> {
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            match field {
                FormField::Text { name, value } => parts.push(FormPart::Text {
                    name: name.clone(),
                    value: value.clone(),
                }),
                FormField::File { name, path } => {
                    let bytes = read_form_file(path)?;
                    let file_name = path
                        .file_name()
                        .and_then(|value| value.to_str())
                        .unwrap_or("file")
                        .to_owned();
                    parts.push(FormPart::File {
                        name: name.clone(),
                        file_name,
                        bytes: Arc::from(bytes),
                    });
                }
            }
        }
        Ok(TemplateBody::Multipart(Arc::from(parts)))
    }
}

/// Read-only request description shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: HttpMethod,
    url: Url,
    headers: HeaderMap,
    body: TemplateBody,
}

impl RequestTemplate {
    /// Builds a template, validating header names and values up front.
    ///
    /// `content_type` is applied as a header except for multipart bodies,
    /// whose content type carries the per-request boundary.
    ///
    /// # Errors
    ///
    /// Returns an error when a header name or value is not valid HTTP.
    pub fn new(
        method: HttpMethod,
        url: Url,
        headers: &[(String, String)],
        content_type: Option<&str>,
        body: TemplateBody,
    ) -> AppResult<Self> {
        let mut map = HeaderMap::with_capacity(headers.len().saturating_add(1));
        for (key, value) in headers {
            let invalid = || {
                AppError::config(ConfigError::InvalidHeader {
                    source: ValidationError::InvalidHeaderFormat {
                        value: format!("{}: {}", key, value),
                    },
                })
            };
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_err| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_err| invalid())?;
            map.append(name, value);
        }

        let content_type = match (&body, content_type) {
            (TemplateBody::Multipart(_), _) => None,
            (TemplateBody::UrlEncoded(_), None) => Some(URLENCODED_CONTENT_TYPE),
            (_, declared) => declared,
        };
        if let Some(content_type) = content_type
            && !map.contains_key(CONTENT_TYPE)
        {
            let value = HeaderValue::from_str(content_type).map_err(|_err| {
                AppError::config(ConfigError::InvalidHeader {
                    source: ValidationError::InvalidHeaderFormat {
                        value: format!("Content-Type: {}", content_type),
                    },
                })
            })?;
            map.insert(CONTENT_TYPE, value);
        }

        Ok(Self {
            method,
            url,
            headers: map,
            body,
        })
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub const fn body(&self) -> &TemplateBody {
        &self.body
    }

    /// Builds one fresh request. `client` is only used as a request builder;
    /// execution happens through an [`crate::http::HttpExecutor`].
    ///
    /// # Errors
    ///
    /// Returns an error when reqwest rejects the request.
    pub fn materialize(&self, client: &Client) -> AppResult<Request> {
        let builder = client
            .request(self.method.to_reqwest(), self.url.clone())
            .headers(self.headers.clone());
        let builder = match &self.body {
            TemplateBody::Empty => builder,
            TemplateBody::Text(body) | TemplateBody::UrlEncoded(body) => builder.body(body.clone()),
            TemplateBody::Multipart(parts) => builder.multipart(build_multipart(parts)),
        };
        builder
            .build()
            .map_err(|err| AppError::http(HttpError::BuildRequestFailed { source: err }))
    }
}

fn build_multipart(parts: &[FormPart]) -> reqwest::multipart::Form {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        match part {
            FormPart::Text { name, value } => {
                form = form.text(name.clone(), value.clone());
            }
            FormPart::File {
                name,
                file_name,
                bytes,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(file_name.clone());
                form = form.part(name.clone(), part);
            }
        }
    }
    form
}

fn read_form_file(path: &Path) -> AppResult<Vec<u8>> {
    std::fs::read(path).map_err(|err| {
        AppError::http(HttpError::ReadFormFile {
            path: path.to_path_buf(),
            source: err,
        })
    })
}
