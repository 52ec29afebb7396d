//! Ordered route table.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::app::Handler;
use crate::request::Method;
use crate::routing::error::RoutingFailure;
use crate::routing::pattern::RoutePattern;

/// A registered route: pattern, allowed methods and handler.
pub struct Route {
    pattern: RoutePattern,
    /// Allowed methods. Empty means any method.
    methods: BTreeSet<Method>,
    handler: Handler,
}

impl Route {
    pub fn new(pattern: RoutePattern, methods: impl IntoIterator<Item = Method>, handler: Handler) -> Self {
        Self {
            pattern,
            methods: methods.into_iter().collect(),
            handler,
        }
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn methods(&self) -> &BTreeSet<Method> {
        &self.methods
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Whether this route accepts `method`.
    pub fn allows(&self, method: Method) -> bool {
        self.methods.is_empty() || self.methods.contains(&method)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("flavor", &self.handler.flavor())
            .finish()
    }
}

/// A successful lookup: the route plus the named captures from its pattern.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub captures: HashMap<String, String>,
}

/// The route table.
///
/// Routes are tried in registration order and the first route accepting both
/// path and method wins. The table is never reordered.
#[derive(Debug, Default, Clone)]
pub struct Router {
    routes: Vec<Arc<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. It has lower priority than every route added before it.
    pub fn push(&mut self, route: Route) {
        self.routes.push(Arc::new(route));
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route for `path` and `method`.
    ///
    /// A route that accepts the path but not the method does not stop the
    /// scan; its methods are collected so that, if nothing else matches, the
    /// 405 reports every method the path supports.
    pub fn find(&self, path: &str, method: Method) -> Result<RouteMatch, RoutingFailure> {
        let mut rejected: BTreeSet<Method> = BTreeSet::new();

        for route in &self.routes {
            let Some(captures) = route.pattern.captures(path) else {
                continue;
            };
            if !route.allows(method) {
                rejected.extend(route.methods.iter().copied());
                continue;
            }
            debug!("{method} {path} matched route `{spec}`", spec = route.pattern.spec());
            return Ok(RouteMatch {
                route: Arc::clone(route),
                captures,
            });
        }

        if rejected.is_empty() {
            Err(RoutingFailure::NotFound)
        } else {
            Err(RoutingFailure::MethodNotAllowed(rejected))
        }
    }
}
