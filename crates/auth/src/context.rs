use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::identity::Identity;

/// The resource instance a request is about.
///
/// Produced from request data by a route's target extractor, so consumers
/// (route handlers, the policy decision point) must treat it as untrusted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TargetRef {
    /// No specific target (e.g. listing routes). Serializes as `null`.
    None,
    /// A scalar identifier.
    Id(String),
    /// A structured identifier, e.g. `{"userId": "..."}`.
    Object(Map<String, Value>),
}

impl TargetRef {
    pub fn is_none(&self) -> bool {
        matches!(self, TargetRef::None)
    }

    /// String field of an `Object` target.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            TargetRef::Object(map) => map.get(name).and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn object(key: &str, value: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(key.to_string(), Value::String(value.into()));
        TargetRef::Object(map)
    }
}

/// Structured decision request handed to the policy decision point.
///
/// `action` and `resource` are `&'static str` by construction: they come from
/// the route declaration, never from the request. `target` is untrusted.
/// There is no public constructor; see [`crate::ProtectedRoute::build_context`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationContext {
    identity: Identity,
    action: &'static str,
    resource: &'static str,
    target: TargetRef,
}

impl AuthorizationContext {
    pub(crate) fn new(
        identity: Identity,
        action: &'static str,
        resource: &'static str,
        target: TargetRef,
    ) -> Self {
        Self {
            identity,
            action,
            resource,
            target,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }
}

/// Framework-agnostic view of the parts of a live request that target
/// extractors may read.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    path: &'a HashMap<String, String>,
    query: &'a HashMap<String, String>,
    body: Option<&'a Value>,
}

impl<'a> RequestView<'a> {
    pub fn new(
        path: &'a HashMap<String, String>,
        query: &'a HashMap<String, String>,
        body: Option<&'a Value>,
    ) -> Self {
        Self { path, query, body }
    }

    pub fn path_param(&self, name: &str) -> Option<&'a str> {
        self.path.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&'a str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self) -> Option<&'a Value> {
        self.body
    }
}
