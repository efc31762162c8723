// ABOUTME: Ordered claim-building pipeline composing static, nonce, time, and remote claims
// ABOUTME: Merges claim sources into one map with deterministic later-wins ordering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! The claim-building pipeline.
//!
//! Builders are a closed set of strategies behind one "apply to map"
//! contract, composed once from configuration into an immutable ordered list:
//!
//! 1. request copy — caller-supplied claims form the baseline
//! 2. remote claims — when an external endpoint is configured
//! 3. static claims — configured literals
//! 4. nonce — the `jti` claim, when enabled
//! 5. time — `iat`, `exp`, `nbf`, unless disabled
//!
//! Later builders win on key collision. The first error aborts the pipeline;
//! a partially filled target map is never treated as a valid claim set.

/// Remote claims endpoint integration
pub mod remote;

pub use remote::RemoteClaims;

use crate::config::Options;
use crate::errors::AppResult;
use crate::noncer::Noncer;
use crate::request::Request;
use chrono::Utc;
use std::sync::Arc;

/// The in-progress claim set builders write into
pub type ClaimMap = serde_json::Map<String, serde_json::Value>;

/// JWT ID claim written by the nonce builder
pub const JTI: &str = "jti";
/// Issued-at claim
pub const IAT: &str = "iat";
/// Expiration claim
pub const EXP: &str = "exp";
/// Not-before claim
pub const NBF: &str = "nbf";

/// Time-based claims configuration
#[derive(Debug, Clone, Default)]
pub struct TimeClaims {
    /// Token lifetime in seconds; `exp` is written only when positive
    pub duration: i64,
    /// Skip the `nbf` claim
    pub disable_not_before: bool,
    /// Offset from `iat` to `nbf`; may be zero or negative
    pub not_before_delta: i64,
}

impl TimeClaims {
    fn add_claims(&self, target: &mut ClaimMap) {
        let now = Utc::now().timestamp();
        target.insert(IAT.to_owned(), now.into());
        if self.duration > 0 {
            target.insert(EXP.to_owned(), (now + self.duration).into());
        }
        if !self.disable_not_before {
            target.insert(NBF.to_owned(), (now + self.not_before_delta).into());
        }
    }
}

/// One claim-building strategy
enum ClaimBuilder {
    /// Copy every caller-supplied claim into the target verbatim
    RequestCopy,
    /// Merge claims fetched from the configured external endpoint
    Remote(RemoteClaims),
    /// Merge the statically configured claims
    Static(ClaimMap),
    /// Write a fresh `jti`
    Nonce(Arc<dyn Noncer>),
    /// Write the time-based claims
    Time(TimeClaims),
}

impl ClaimBuilder {
    async fn add_claims(&self, request: &Request, target: &mut ClaimMap) -> AppResult<()> {
        match self {
            Self::RequestCopy => {
                for (key, value) in &request.claims {
                    target.insert(key.clone(), value.clone());
                }
                Ok(())
            }
            Self::Remote(remote) => remote.add_claims(request, target).await,
            Self::Static(claims) => {
                for (key, value) in claims {
                    target.insert(key.clone(), value.clone());
                }
                Ok(())
            }
            Self::Nonce(noncer) => {
                let nonce = noncer.nonce()?;
                target.insert(JTI.to_owned(), serde_json::Value::String(nonce));
                Ok(())
            }
            Self::Time(time) => {
                time.add_claims(target);
                Ok(())
            }
        }
    }
}

/// The composed, immutable claim pipeline
pub struct ClaimBuilders {
    builders: Vec<ClaimBuilder>,
}

impl ClaimBuilders {
    /// Compose the pipeline from configuration.
    ///
    /// Static claims and static metadata are computed here, once; only the
    /// per-request stages run at issuance time.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configured value, or for a remote
    /// configuration whose URL is empty or unparseable.
    pub fn new(
        options: &Options,
        noncer: Arc<dyn Noncer>,
        client: reqwest::Client,
    ) -> AppResult<Self> {
        let mut builders = vec![ClaimBuilder::RequestCopy];

        if let Some(remote) = &options.remote {
            let base_metadata = static_values(&options.metadata)?;
            builders.push(ClaimBuilder::Remote(RemoteClaims::new(
                client,
                remote,
                base_metadata,
            )?));
        }

        builders.push(ClaimBuilder::Static(static_values(&options.claims)?));

        if options.nonce {
            builders.push(ClaimBuilder::Nonce(noncer));
        }

        if !options.disable_time {
            let duration = options
                .duration
                .and_then(|d| i64::try_from(d.as_secs()).ok())
                .unwrap_or(0);
            builders.push(ClaimBuilder::Time(TimeClaims {
                duration,
                disable_not_before: options.disable_not_before,
                not_before_delta: options.not_before_delta.seconds(),
            }));
        }

        Ok(Self { builders })
    }

    /// Run every builder, in order, against the target map.
    ///
    /// # Errors
    ///
    /// Stops at the first failing builder. Claims already written by earlier
    /// builders remain in the target, so callers must discard it on error.
    pub async fn add_claims(&self, request: &Request, target: &mut ClaimMap) -> AppResult<()> {
        for builder in &self.builders {
            builder.add_claims(request, target).await?;
        }
        Ok(())
    }
}

/// Collect the static entries of a configured value list into a map
fn static_values(values: &[crate::config::Value]) -> AppResult<ClaimMap> {
    let mut map = ClaimMap::new();
    for value in values {
        value.validate()?;
        if value.is_http_derived() {
            continue;
        }
        map.insert(value.key.clone(), value.static_value()?);
    }
    Ok(map)
}
