// ABOUTME: Per-issuance request state and the builders that populate it from HTTP inputs
// ABOUTME: Extracts configured header, parameter, and path-variable values before claim building
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! Request decoding.
//!
//! Request builders run before the claim pipeline and resolve every
//! HTTP-derived configured value directly into [`Request::claims`] or
//! [`Request::metadata`]. The claim pipeline then treats those entries as
//! caller-supplied baseline values; it never touches the HTTP request itself.

use crate::claims::ClaimMap;
use crate::config::Options;
use crate::errors::{AppError, AppResult};
use http::HeaderMap;
use std::collections::HashMap;

/// Per-issuance input assembled by the request builders.
///
/// Created fresh for each HTTP request and read-only once building finishes.
#[derive(Debug, Default)]
pub struct Request {
    /// Caller-supplied claim overrides, merged into the claim set first so
    /// later pipeline stages can still override them
    pub claims: ClaimMap,
    /// Non-claim context, consumed only by remote claim lookups
    pub metadata: ClaimMap,
}

impl Request {
    /// Create an empty request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Raw HTTP inputs the builders read from.
///
/// The hosting handler parses the form before building, so `parameters`
/// already holds the merged query and form values.
#[derive(Debug, Default)]
pub struct HttpInputs {
    /// Request headers
    pub headers: HeaderMap,
    /// Merged query and form parameters
    pub parameters: HashMap<String, String>,
    /// Path variables bound by the route
    pub variables: HashMap<String, String>,
}

/// Which request field a builder writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Claims,
    Metadata,
}

/// One strategy for extracting a value from the inbound HTTP request
#[derive(Debug)]
enum RequestBuilder {
    /// Header first, then query/form parameter. Optional values that are
    /// absent or empty are silently omitted; a zero value is never written.
    HeaderParameter {
        key: String,
        header: Option<String>,
        parameter: Option<String>,
        required: bool,
        target: Target,
    },
    /// URI path variable. A missing required variable is a route
    /// misconfiguration, not bad client input.
    Variable {
        key: String,
        variable: String,
        required: bool,
        target: Target,
    },
}

impl RequestBuilder {
    fn build(&self, inputs: &HttpInputs, request: &mut Request) -> AppResult<()> {
        match self {
            Self::HeaderParameter {
                key,
                header,
                parameter,
                required,
                target,
            } => {
                let from_header = header.as_deref().and_then(|name| {
                    inputs
                        .headers
                        .get(name)
                        .and_then(|value| value.to_str().ok())
                        .filter(|value| !value.is_empty())
                });
                let found = from_header.or_else(|| {
                    parameter.as_deref().and_then(|name| {
                        inputs
                            .parameters
                            .get(name)
                            .map(String::as_str)
                            .filter(|value| !value.is_empty())
                    })
                });

                match found {
                    Some(value) => {
                        insert(request, *target, key, value);
                        Ok(())
                    }
                    None if *required => {
                        let name = header.as_deref().or(parameter.as_deref()).unwrap_or(key);
                        Err(AppError::missing_value(name))
                    }
                    None => Ok(()),
                }
            }
            Self::Variable {
                key,
                variable,
                required,
                target,
            } => match inputs.variables.get(variable).filter(|value| !value.is_empty()) {
                Some(value) => {
                    insert(request, *target, key, value);
                    Ok(())
                }
                None if *required => Err(AppError::missing_variable(variable)),
                None => Ok(()),
            },
        }
    }
}

fn insert(request: &mut Request, target: Target, key: &str, value: &str) {
    let map = match target {
        Target::Claims => &mut request.claims,
        Target::Metadata => &mut request.metadata,
    };
    map.insert(key.to_owned(), serde_json::Value::String(value.to_owned()));
}

/// Ordered request builders constructed once from configuration
#[derive(Debug, Default)]
pub struct RequestBuilders {
    builders: Vec<RequestBuilder>,
}

impl RequestBuilders {
    /// Build the ordered list from the configured claim and metadata values.
    ///
    /// Only HTTP-derived values produce builders; static values are handled
    /// by the claim pipeline.
    ///
    /// # Errors
    /// Returns an error for any value that fails source-exclusivity
    /// validation
    pub fn new(options: &Options) -> AppResult<Self> {
        let mut builders = Vec::new();

        for (values, target) in [
            (&options.claims, Target::Claims),
            (&options.metadata, Target::Metadata),
        ] {
            for value in values.iter() {
                value.validate()?;
                if !value.is_http_derived() {
                    continue;
                }

                if let Some(variable) = value.variable() {
                    builders.push(RequestBuilder::Variable {
                        key: value.key.clone(),
                        variable: variable.to_owned(),
                        required: value.required,
                        target,
                    });
                } else {
                    builders.push(RequestBuilder::HeaderParameter {
                        key: value.key.clone(),
                        header: value.header().map(str::to_owned),
                        parameter: value.parameter().map(str::to_owned),
                        required: value.required,
                        target,
                    });
                }
            }
        }

        Ok(Self { builders })
    }

    /// Run every builder, in order, against a fresh request.
    ///
    /// # Errors
    ///
    /// Stops at the first failing builder; the partially built request is
    /// discarded.
    pub fn build_request(&self, inputs: &HttpInputs) -> AppResult<Request> {
        let mut request = Request::new();
        for builder in &self.builders {
            builder.build(inputs, &mut request)?;
        }
        Ok(request)
    }
}
