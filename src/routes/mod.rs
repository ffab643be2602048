pub mod table;

use std::collections::HashMap;

use axum::http::Method;
use futures::future::BoxFuture;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, ApiResponse};
use crate::filter::FilterSet;
use crate::pipeline::RequestContext;

pub type Handler =
    for<'a> fn(&'a RequestContext) -> BoxFuture<'a, Result<ApiResponse, ApiError>>;

/// Body/query shape check. Built from serde deserialization of the
/// route's typed request structs via [`validate_as`].
pub type Validator = fn(&Value) -> Result<(), String>;

pub fn validate_as<T: DeserializeOwned>(value: &Value) -> Result<(), String> {
    serde_json::from_value::<T>(value.clone())
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Post-success event publication descriptor. `patrol` additionally
/// targets every patrol-compatible force room.
pub struct BroadcastSpec {
    pub event: &'static str,
    pub patrol: bool,
    pub body: fn(&RequestContext, &ApiResponse) -> Value,
}

/// Everything the pipeline needs to know about one (pattern, method)
/// endpoint before dispatching to its handler.
pub struct RouteDescriptor {
    pub requires_force: bool,
    pub requires_session: bool,
    /// Permission names, ANDed.
    pub intents: &'static [&'static str],
    pub body: Option<Validator>,
    pub query_params: Option<Validator>,
    pub filters: FilterSet,
    pub broadcast: Option<BroadcastSpec>,
    pub handler: Handler,
}

impl RouteDescriptor {
    pub fn new(handler: Handler) -> Self {
        Self {
            requires_force: false,
            requires_session: false,
            intents: &[],
            body: None,
            query_params: None,
            filters: FilterSet::new(),
            broadcast: None,
            handler,
        }
    }

    pub fn requires_force(mut self) -> Self {
        self.requires_force = true;
        self
    }

    /// Sessions live in a force database, so requiring a session
    /// implies requiring the force header too.
    pub fn requires_session(mut self) -> Self {
        self.requires_force = true;
        self.requires_session = true;
        self
    }

    pub fn intents(mut self, intents: &'static [&'static str]) -> Self {
        self.intents = intents;
        self
    }

    pub fn body(mut self, validator: Validator) -> Self {
        self.body = Some(validator);
        self
    }

    pub fn query_params(mut self, validator: Validator) -> Self {
        self.query_params = Some(validator);
        self
    }

    pub fn filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn broadcast(mut self, spec: BroadcastSpec) -> Self {
        self.broadcast = Some(spec);
        self
    }
}

#[derive(Debug, PartialEq)]
pub enum RouteResolveError {
    RouteNotFound,
    MethodNotAllowed,
}

pub struct RouteMatch<'a> {
    pub descriptor: &'a RouteDescriptor,
    /// Path captures in pattern order, e.g. the nif in `/officers/(\d+)`.
    pub captures: Vec<String>,
}

impl std::fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("captures", &self.captures)
            .finish_non_exhaustive()
    }
}

/// Ordered (pattern, per-method descriptor) registry. Resolution is
/// first-match-wins in declaration order: the first pattern matching
/// the path decides, and only then is the method looked up.
pub struct RouteTable {
    entries: Vec<(Regex, HashMap<Method, RouteDescriptor>)>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder { entries: vec![] }
    }

    pub fn resolve(&self, path: &str, method: &Method) -> Result<RouteMatch<'_>, RouteResolveError> {
        for (pattern, methods) in &self.entries {
            if let Some(caps) = pattern.captures(path) {
                let descriptor = methods
                    .get(method)
                    .ok_or(RouteResolveError::MethodNotAllowed)?;
                let captures = caps
                    .iter()
                    .skip(1)
                    .map(|c| c.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Ok(RouteMatch { descriptor, captures });
            }
        }
        Err(RouteResolveError::RouteNotFound)
    }
}

pub struct RouteTableBuilder {
    entries: Vec<(String, HashMap<Method, RouteDescriptor>)>,
}

impl RouteTableBuilder {
    /// Register a descriptor under an unanchored pattern; the builder
    /// anchors it as `^pattern$`. Declaring the same pattern again adds
    /// a method to the existing entry, keeping declaration order.
    pub fn route(mut self, pattern: &str, method: Method, descriptor: RouteDescriptor) -> Self {
        if let Some((_, methods)) = self.entries.iter_mut().find(|(p, _)| p == pattern) {
            methods.insert(method, descriptor);
        } else {
            let mut methods = HashMap::new();
            methods.insert(method, descriptor);
            self.entries.push((pattern.to_string(), methods));
        }
        self
    }

    pub fn build(self) -> Result<RouteTable, regex::Error> {
        let mut entries = vec![];
        for (pattern, methods) in self.entries {
            let anchored = format!("^{}$", pattern);
            entries.push((Regex::new(&anchored)?, methods));
        }
        Ok(RouteTable { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> RouteDescriptor {
        RouteDescriptor::new(|_| Box::pin(async { Ok(ApiResponse::ok("ok")) }))
    }

    fn table() -> RouteTable {
        RouteTable::builder()
            .route(r"/officers/active", Method::GET, noop())
            .route(r"/officers/(\d+)", Method::GET, noop())
            .route(r"/officers/(\d+)", Method::PATCH, noop())
            .route(r"/officers", Method::GET, noop())
            .build()
            .unwrap()
    }

    #[test]
    fn first_matching_pattern_wins() {
        let table = table();
        // "/officers/active" matches the first entry, not the capture one
        let resolved = table.resolve("/officers/active", &Method::GET).unwrap();
        assert!(resolved.captures.is_empty());
    }

    #[test]
    fn captures_are_returned_in_order() {
        let table = table();
        let resolved = table.resolve("/officers/123456789", &Method::GET).unwrap();
        assert_eq!(resolved.captures, vec!["123456789".to_string()]);
    }

    #[test]
    fn unmatched_path_is_route_not_found() {
        let table = table();
        let err = table.resolve("/nothing/here", &Method::GET).unwrap_err();
        assert_eq!(err, RouteResolveError::RouteNotFound);
    }

    #[test]
    fn matched_path_with_wrong_method_is_method_not_allowed() {
        let table = table();
        let err = table.resolve("/officers", &Method::DELETE).unwrap_err();
        assert_eq!(err, RouteResolveError::MethodNotAllowed);
    }

    #[test]
    fn patterns_are_anchored() {
        let table = table();
        let err = table.resolve("/officers/123/extra", &Method::GET).unwrap_err();
        assert_eq!(err, RouteResolveError::RouteNotFound);
    }

    #[test]
    fn validator_reports_serde_detail() {
        #[derive(serde::Deserialize)]
        struct Body {
            #[allow(dead_code)]
            nif: i64,
        }
        let validator: Validator = validate_as::<Body>;
        assert!(validator(&json!({"nif": 1})).is_ok());
        let err = validator(&json!({})).unwrap_err();
        assert!(err.contains("nif"));
    }
}
