//! Protected route declarations.
//!
//! Every protected route states three things before it can serve a request:
//! the action and resource (string literals fixed by the backend) and the
//! extractor that derives the untrusted target from the request.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use careportal_core::SubjectId;

use crate::context::{AuthorizationContext, RequestView, TargetRef};
use crate::identity::Identity;

/// Target extractor could not derive a usable target from the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BadTarget {
    #[error("missing {location} parameter '{name}'")]
    Missing {
        location: &'static str,
        name: &'static str,
    },

    #[error("malformed {location} parameter '{name}'")]
    Malformed {
        location: &'static str,
        name: &'static str,
    },
}

pub type TargetExtractor =
    Arc<dyn for<'a> Fn(&RequestView<'a>) -> Result<TargetRef, BadTarget> + Send + Sync>;

#[derive(Clone)]
pub struct ProtectedRoute {
    action: &'static str,
    resource: &'static str,
    extractor: TargetExtractor,
}

impl ProtectedRoute {
    /// Declare a route guarded by `action` on `resource`, with no target.
    pub fn new(action: &'static str, resource: &'static str) -> Self {
        Self {
            action,
            resource,
            extractor: Arc::new(|_: &RequestView<'_>| Ok(TargetRef::None)),
        }
    }

    pub fn target<F>(mut self, extractor: F) -> Self
    where
        F: for<'a> Fn(&RequestView<'a>) -> Result<TargetRef, BadTarget> + Send + Sync + 'static,
    {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    /// Combine a verified identity with this route's metadata and the target
    /// extracted from `request`.
    ///
    /// Taking `Identity` by value is what makes "no context without a verified
    /// identity" hold: the only way to get one is a successful verification.
    pub fn build_context(
        &self,
        identity: Identity,
        request: &RequestView<'_>,
    ) -> Result<AuthorizationContext, BadTarget> {
        let target = (self.extractor)(request)?;
        Ok(AuthorizationContext::new(
            identity,
            self.action,
            self.resource,
            target,
        ))
    }
}

impl core::fmt::Debug for ProtectedRoute {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProtectedRoute")
            .field("action", &self.action)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// `{key: <path param>}`, where the parameter must be a subject identifier.
pub fn path_subject(
    param: &'static str,
    key: &'static str,
) -> impl for<'a> Fn(&RequestView<'a>) -> Result<TargetRef, BadTarget> + Send + Sync + 'static {
    move |req: &RequestView<'_>| {
        let raw = req.path_param(param).ok_or(BadTarget::Missing {
            location: "path",
            name: param,
        })?;
        subject_target(raw, "path", param, key)
    }
}

/// `{key: <query param>}`, where the parameter must be a subject identifier.
pub fn query_subject(
    param: &'static str,
    key: &'static str,
) -> impl for<'a> Fn(&RequestView<'a>) -> Result<TargetRef, BadTarget> + Send + Sync + 'static {
    move |req: &RequestView<'_>| {
        let raw = req.query_param(param).ok_or(BadTarget::Missing {
            location: "query",
            name: param,
        })?;
        subject_target(raw, "query", param, key)
    }
}

/// `{field: <body field>}`, where the JSON body field must be a subject identifier.
pub fn body_subject(
    field: &'static str,
) -> impl for<'a> Fn(&RequestView<'a>) -> Result<TargetRef, BadTarget> + Send + Sync + 'static {
    move |req: &RequestView<'_>| {
        let value = req
            .body()
            .and_then(|b| b.get(field))
            .filter(|v| !v.is_null())
            .ok_or(BadTarget::Missing {
                location: "body",
                name: field,
            })?;
        let raw = match value {
            Value::String(s) => s.as_str(),
            _ => {
                return Err(BadTarget::Malformed {
                    location: "body",
                    name: field,
                });
            }
        };
        subject_target(raw, "body", field, field)
    }
}

fn subject_target(
    raw: &str,
    location: &'static str,
    name: &'static str,
    key: &'static str,
) -> Result<TargetRef, BadTarget> {
    let subject = SubjectId::parse(raw).map_err(|_| BadTarget::Malformed { location, name })?;
    Ok(TargetRef::object(key, subject.as_str()))
}
