//! The request pipeline: routing, handling, error handling and finalization.

use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info, warn};

use crate::app::config::AppConfig;
use crate::app::error::Error;
use crate::app::handler::{Handler, IntoReply};
use crate::app::http_error::{HttpError, PanicError};
use crate::app::resolver::{ErrorHandlers, ErrorKey};
use crate::app::response::{Flavor, Response, WireResponse};
use crate::app::status::reason_phrase;
use crate::request::{Method, Request};
use crate::routing::{Route, RoutePattern, Router};

/// Collects routes and error handlers, then freezes them into an [`App`].
#[derive(Debug, Default)]
pub struct AppBuilder {
    config: AppConfig,
    router: Router,
    error_handlers: ErrorHandlers,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            error_handlers: ErrorHandlers::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Add a route whose handler gets a response of the configured default flavor.
    ///
    /// An empty `methods` list accepts any method.
    pub fn add_route<F, R>(
        &mut self,
        spec: &str,
        methods: impl IntoIterator<Item = Method>,
        handler: F,
    ) -> Result<&mut Self, Error>
    where
        F: Fn(&Request, &mut Response) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        let flavor = self.config.default_flavor;
        self.add_route_with(spec, methods, flavor, handler)
    }

    /// Add a route whose handler gets a response of `flavor`.
    pub fn add_route_with<F, R>(
        &mut self,
        spec: &str,
        methods: impl IntoIterator<Item = Method>,
        flavor: Flavor,
        handler: F,
    ) -> Result<&mut Self, Error>
    where
        F: Fn(&Request, &mut Response) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        let pattern = RoutePattern::compile(spec)?;
        Ok(self.add_handler(Route::new(pattern, methods, Handler::new(flavor, handler))))
    }

    /// Add a pre-built route.
    pub fn add_handler(&mut self, route: Route) -> &mut Self {
        self.router.push(route);
        self
    }

    /// Register an error handler that gets a response of the default flavor.
    pub fn set_error_handler<F, R>(&mut self, key: impl Into<ErrorKey>, handler: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        let flavor = self.config.default_flavor;
        self.set_error_handler_with(key, flavor, handler)
    }

    pub fn set_error_handler_with<F, R>(&mut self, key: impl Into<ErrorKey>, flavor: Flavor, handler: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        self.error_handlers.insert(key.into(), Handler::new(flavor, handler));
        self
    }

    pub fn build(self) -> App {
        info!(
            "Built app with {routes} route(s) and {handlers} error handler(s)",
            routes = self.router.len(),
            handlers = self.error_handlers.len()
        );
        for route in self.router.routes() {
            debug!("  {:?} {}", route.methods(), route.pattern().spec());
        }
        App {
            config: self.config,
            router: self.router,
            error_handlers: self.error_handlers,
        }
    }
}

/// An immutable routing and error-handling table.
///
/// `App` is `Send + Sync`; share it between workers behind an `Arc`, or
/// behind a [`SharedApp`](crate::SharedApp) to swap it at runtime.
#[derive(Debug)]
pub struct App {
    config: AppConfig,
    router: Router,
    error_handlers: ErrorHandlers,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn error_handlers(&self) -> &ErrorHandlers {
        &self.error_handlers
    }

    /// Turn a request into a finalized response. Never fails.
    pub fn handle(&self, request: &Request) -> WireResponse {
        let mut response = self.respond(request);
        if let Some(server) = &self.config.server_header {
            response.headers_mut().set_default("Server", server.as_str());
        }
        response.into_wire(request)
    }

    /// Produce the response for `request` without finalizing it.
    pub fn respond(&self, request: &Request) -> Response {
        let mut routed = request.clone();
        let outcome = guarded(|| {
            let route_match = self.router.find(request.path(), request.method())?;
            let handler = route_match.route.handler().clone();
            routed = request.with_route(route_match);
            handler.handle_request(&routed)
        });
        match outcome {
            Ok(response) => response,
            Err(http_error) => self.handle_error(&routed, http_error),
        }
    }

    fn handle_error(&self, request: &Request, http_error: HttpError) -> Response {
        self.log_fault(&http_error);
        let errored = request.with_error(http_error.clone());

        let Some(handler) = self.error_handlers.resolve(&http_error) else {
            warn!(
                "No error handler for {http_error} on {} {}",
                request.method(),
                request.path()
            );
            return self.fallback(&errored);
        };

        match guarded(|| handler.handle_request(&errored)) {
            Ok(response) => response,
            Err(nested) => {
                warn!("Error handler for {http_error} failed with {nested}");
                self.log_fault(&nested);
                self.fallback(&errored.with_error(nested))
            }
        }
    }

    /// Built-in page, degrading to plain text if even that fails.
    fn fallback(&self, request: &Request) -> Response {
        match guarded(|| self.default_error_page(request)) {
            Ok(response) => response,
            Err(nested) => {
                error!("Default error page failed with {nested}");
                last_resort(request)
            }
        }
    }

    /// Render the built-in HTML page for the errors attached to `request`.
    ///
    /// The most recent error sets the status; earlier errors are listed below it.
    pub fn default_error_page(&self, request: &Request) -> Result<Response, HttpError> {
        let Some((http_error, earlier)) = request.http_errors().split_first() else {
            return Err(HttpError::new(500)
                .with_short("Error handler called with no error")
                .with_desc("The error page was requested for a request with no error attached."));
        };

        let mut response = Response::new(Flavor::Text).with_error(http_error.clone());
        let code = response.code();
        let mut lines = vec![format!("<h2>HTTP {code} - {}</h2>", reason_phrase(code))];
        if let Some(short) = http_error.short() {
            lines.push(format!("<h3>{}</h3>", escape_html(short)));
        }
        match http_error.desc() {
            Some(desc) => lines.push(format!("<div>{}</div>", escape_html(desc))),
            None => lines.push(format!("<pre>{}</pre>", escape_html(&http_error.to_string()))),
        }
        if self.config.expose_traces {
            if let Some(diagnostic) = http_error.diagnostic() {
                lines.push(format!("<pre>{}</pre>", escape_html(&diagnostic.to_string())));
            }
        }
        lines.extend(
            earlier
                .iter()
                .map(|prior| format!("<h4>While handling: HTTP {} - {}</h4>", prior.code(), reason_phrase(prior.code()))),
        );
        let mut page = lines.join("\n");
        page.push('\n');
        response.write(&page)?;
        Ok(response)
    }

    fn log_fault(&self, http_error: &HttpError) {
        let Some(diagnostic) = http_error.diagnostic() else {
            return;
        };
        if self.config.log_traces {
            error!("{http_error} caused by {diagnostic}");
        } else {
            error!(
                "{http_error} caused by {}: {}",
                diagnostic.type_name, diagnostic.message
            );
        }
    }
}

/// Run `f`, turning a panic into a 500 carrying the panic message.
fn guarded<T>(f: impl FnOnce() -> Result<T, HttpError>) -> Result<T, HttpError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let panic_error = PanicError::from_payload(payload);
            error!("Recovered from panic: {}", panic_error.message());
            Err(HttpError::internal(panic_error))
        }
    }
}

/// The response of last resort. Built without anything that can fail.
fn last_resort(request: &Request) -> Response {
    let original = request.http_errors().last();
    let code = original.map_or(500, HttpError::code);
    let short = original.and_then(HttpError::short).unwrap_or("None");
    let mut response = Response::text(format!(
        "The server encountered the following error:\n\
         HTTP({code}): {short}\n\n\
         During the handling another error was encountered.\n"
    ))
    .with_content_type("text/plain");
    match original {
        Some(http_error) => response = response.with_error(http_error.clone()),
        None => response.set_code(code),
    }
    response
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
