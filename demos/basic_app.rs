//! A basic application demonstrating routes, error handlers and hot replacement.
//!
//! There is no socket here: requests are built by hand, the way a transport
//! would build them after parsing, and the finalized responses are printed.

use log::info;
use serde_json::json;
use tinydispatch::{
    App, AppBuilder, AppConfig, ErrorKey, Flavor, Headers, HttpError, Method, Request, Response, ResultExt,
    SharedApp, WireResponse, METHOD_NOT_ALLOWED,
};

fn build_app(greeting: &'static str) -> Result<App, Box<dyn std::error::Error>> {
    let mut builder = AppBuilder::new(AppConfig {
        expose_traces: true,
        ..AppConfig::default()
    });

    // A plain text route with a named capture
    builder.add_route("/hello/<name>", [Method::GET, Method::HEAD], move |req: &Request, _: &mut Response| {
        format!("{greeting}, {}!", req.route_var("name").unwrap_or("World"))
    })?;

    // A JSON route reading a query parameter
    builder.add_route_with("/sum/<a:\\d+>", [Method::GET], Flavor::Json, |req: &Request, _: &mut Response| -> Result<serde_json::Value, HttpError> {
        let a = req.route_var("a").unwrap_or("0").parse::<u64>().wrap_internal()?;
        let b = req
            .query_vars()
            .get("b")
            .map(String::as_str)
            .unwrap_or("0")
            .parse::<u64>()
            .wrap_with(HttpError::new(400).with_short("`b` must be a number"))?;
        let sum = a
            .checked_add(b)
            .ok_or_else(|| HttpError::new(400).with_short("the sum does not fit in 64 bits"))?;
        Ok(json!({"a": a, "b": b, "sum": sum}))
    })?;

    // Errors raised on purpose
    builder.add_route("/teapot", [], |_: &Request, _: &mut Response| {
        Err::<(), _>(HttpError::new(418).with_short("I'm a teapot").with_desc("Try the coffee machine."))
    })?;
    builder.add_route("/old", [Method::GET], |_: &Request, _: &mut Response| {
        Err::<(), _>(HttpError::redirect("/hello/again"))
    })?;

    // Error handlers
    builder.set_error_handler(404u16, |req: &Request, _: &mut Response| {
        format!("<p>Nothing lives at {}</p>", req.path())
    });
    builder.set_error_handler_with(&METHOD_NOT_ALLOWED, Flavor::Json, |req: &Request, _: &mut Response| {
        let allowed = req
            .http_error()
            .and_then(HttpError::allowed_methods)
            .map(|methods| methods.iter().map(|m| m.as_str()).collect::<Vec<_>>())
            .unwrap_or_default();
        json!({"error": "method not allowed", "allowed": allowed})
    });
    builder.set_error_handler(ErrorKey::Default, |req: &Request, _: &mut Response| {
        let code = req.http_error().map_or(500, HttpError::code);
        format!("<p>Something went wrong ({code})</p>")
    });

    Ok(builder.build())
}

fn print_response(label: &str, response: WireResponse) {
    info!("{label} -> {}", response.status);
    for (name, value) in &response.headers {
        info!("    {name}: {value}");
    }
    if let Some(diagnostic) = &response.diagnostic {
        info!("    (diagnostic) {}: {}", diagnostic.type_name, diagnostic.message);
    }
    let body = response.body.into_bytes();
    info!("    {}", String::from_utf8_lossy(&body));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = SharedApp::new(build_app("Hello")?);

    let requests = [
        (Method::GET, "/hello/world"),
        (Method::HEAD, "/hello/world"),
        (Method::GET, "/sum/40?b=2"),
        (Method::GET, "/sum/40?b=two"),
        (Method::GET, "/sum/18446744073709551615?b=1"),
        (Method::POST, "/sum/40"),
        (Method::GET, "/teapot"),
        (Method::GET, "/old"),
        (Method::GET, "/missing"),
    ];
    for (method, target) in requests {
        let request = Request::new(method, target, Headers::new()).with_transport_param("REMOTE_ADDR", "127.0.0.1");
        print_response(&format!("{method} {target}"), app.handle(&request));
    }

    // Swap in a new table; later requests see it
    app.replace(build_app("Howdy")?);
    let request = Request::new(Method::GET, "/hello/again", Headers::new());
    print_response("GET /hello/again", app.handle(&request));

    Ok(())
}
