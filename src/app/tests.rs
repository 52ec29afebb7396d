//! Tests for error resolution, response finalization and the request pipeline.

#[cfg(test)]
mod app_tests {
    use std::error::Error as StdError;
    use std::fmt;
    use std::num::ParseIntError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use crate::app::{
        reason_phrase, App, AppBuilder, AppConfig, Body, Error, ErrorHandlers, ErrorKey, ErrorKind, Flavor, Handler,
        HttpError, PanicError, Response, ResultExt, SharedApp, StatusCode, StatusLine, Tier, WireBody, WireResponse,
        HTTP_ERROR, MAX_CAUSES, METHOD_NOT_ALLOWED, UNKNOWN_PHRASE,
    };
    use crate::request::{Headers, Method, Request};

    static NOT_READY: ErrorKind = ErrorKind::new("NotReady", &HTTP_ERROR);
    static STILL_NOT_READY: ErrorKind = ErrorKind::new("StillNotReady", &NOT_READY);
    static CONFLICT: ErrorKind = ErrorKind::new("Conflict", &HTTP_ERROR);

    /// An error whose `source()` chain can loop back on itself.
    #[derive(Debug)]
    struct Node {
        name: &'static str,
        next: Option<&'static Node>,
    }

    impl fmt::Display for Node {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "node {}", self.name)
        }
    }

    impl StdError for Node {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.next.map(|next| next as &(dyn StdError + 'static))
        }
    }

    /// A wrapper whose source is its only field, at offset zero.
    #[derive(Debug)]
    struct LoadError<E> {
        source: E,
    }

    impl<E> fmt::Display for LoadError<E> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("failed to load")
        }
    }

    impl<E: StdError + 'static> StdError for LoadError<E> {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.source)
        }
    }

    static PING: Node = Node {
        name: "ping",
        next: Some(&PONG),
    };
    static PONG: Node = Node {
        name: "pong",
        next: Some(&PING),
    };

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn get(path: &str) -> Request {
        Request::new(Method::GET, path, Headers::new())
    }

    fn body_text(response: WireResponse) -> String {
        String::from_utf8(response.body.into_bytes()).unwrap()
    }

    fn handler(reply: &'static str) -> Handler {
        Handler::new(Flavor::Text, move |_: &Request, _: &mut Response| reply)
    }

    fn reply_of(handlers: &ErrorHandlers, error: &HttpError) -> Option<(Tier, String)> {
        let (tier, found) = handlers.resolve_with_tier(error)?;
        let request = get("/").with_error(error.clone());
        let response = found.handle_request(&request).unwrap();
        Some((tier, String::from_utf8(response.into_wire(&request).body.into_bytes()).unwrap()))
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(405), "Method Not Allowed");
        assert_eq!(reason_phrase(567), UNKNOWN_PHRASE);
        assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
        assert_eq!(StatusLine::new(599).to_string(), "599 StatusPhraseUnknown");
    }

    #[test]
    fn test_error_kind_ancestry() {
        assert!(STILL_NOT_READY.is(&NOT_READY));
        assert!(STILL_NOT_READY.is(&HTTP_ERROR));
        assert!(!NOT_READY.is(&STILL_NOT_READY));
        let names: Vec<&str> = STILL_NOT_READY.ancestry().map(ErrorKind::name).collect();
        assert_eq!(names, vec!["StillNotReady", "NotReady", "HttpError"]);
    }

    #[test]
    fn test_resolver_tier_order() {
        let error = HttpError::new(503)
            .with_kind(&STILL_NOT_READY)
            .with_cause("x".parse::<u32>().unwrap_err());

        let mut handlers = ErrorHandlers::new();
        handlers.insert(ErrorKey::Default, handler("default"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Default, "default".to_string())));

        handlers.insert(ErrorKey::Status(503), handler("status"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Status, "status".to_string())));

        handlers.insert(ErrorKey::cause::<ParseIntError>(), handler("cause"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Cause, "cause".to_string())));

        handlers.insert(ErrorKey::Kind(&NOT_READY), handler("ancestor kind"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Kind, "ancestor kind".to_string())));

        handlers.insert(ErrorKey::Kind(&STILL_NOT_READY), handler("kind"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Kind, "kind".to_string())));
    }

    #[test]
    fn test_resolver_without_match() {
        let mut handlers = ErrorHandlers::new();
        handlers.insert(ErrorKey::Status(404), handler("missing"));
        assert!(handlers.resolve(&HttpError::new(500)).is_none());
        assert!(handlers.resolve(&HttpError::new(404)).is_some());
    }

    #[test]
    fn test_resolver_checks_kinds_of_wrapped_http_errors() {
        let mut handlers = ErrorHandlers::new();
        handlers.insert(ErrorKey::Kind(&CONFLICT), handler("conflict"));
        handlers.insert(ErrorKey::Status(500), handler("500"));

        let inner = HttpError::new(409).with_kind(&CONFLICT);
        let outer = HttpError::new(500).with_cause(inner);
        assert_eq!(reply_of(&handlers, &outer), Some((Tier::Cause, "conflict".to_string())));
    }

    #[test]
    fn test_causes_stop_at_cycles() {
        let error = HttpError::internal(Node {
            name: "start",
            next: Some(&PING),
        });
        let names: Vec<String> = error.causes().map(|cause| cause.to_string()).collect();
        assert_eq!(names, vec!["node start", "node ping", "node pong"]);

        let mut handlers = ErrorHandlers::new();
        handlers.insert(ErrorKey::cause::<ParseIntError>(), handler("never"));
        handlers.insert(ErrorKey::Status(500), handler("status"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Status, "status".to_string())));

        handlers.insert(ErrorKey::cause::<Node>(), handler("node"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Cause, "node".to_string())));
    }

    #[test]
    fn test_cause_handler_found_inside_cycle() {
        let error = HttpError::new(502).with_cause(LoadError {
            source: Node {
                name: "entry",
                next: Some(&PING),
            },
        });

        let mut handlers = ErrorHandlers::new();
        handlers.insert(ErrorKey::Status(502), handler("status"));
        handlers.insert(ErrorKey::cause::<Node>(), handler("node"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Cause, "node".to_string())));
        assert_eq!(error.causes().count(), 4);
    }

    #[test]
    fn test_causes_follow_sources_stored_at_offset_zero() {
        let error = HttpError::internal(LoadError {
            source: "x".parse::<u8>().unwrap_err(),
        });
        let names: Vec<String> = error.causes().map(|cause| cause.to_string()).collect();
        assert_eq!(names, vec!["failed to load", "invalid digit found in string"]);

        let mut handlers = ErrorHandlers::new();
        handlers.insert(ErrorKey::Status(500), handler("status"));
        handlers.insert(ErrorKey::cause::<ParseIntError>(), handler("parse"));
        assert_eq!(reply_of(&handlers, &error), Some((Tier::Cause, "parse".to_string())));
    }

    #[test]
    fn test_causes_are_bounded() {
        #[derive(Debug)]
        struct Deep(u32);

        impl fmt::Display for Deep {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "depth {}", self.0)
            }
        }

        impl StdError for Deep {}

        // Each level of a long chain is a distinct error; the walk still stops.
        let mut error = HttpError::internal(Deep(0));
        for depth in 1..(MAX_CAUSES as u32 + 10) {
            error = HttpError::new(500).with_cause(error).with_short(format!("level {depth}"));
        }
        assert_eq!(error.causes().count(), MAX_CAUSES);
    }

    #[test]
    fn test_result_ext_wraps_foreign_errors() {
        let wrapped = "seven".parse::<i32>().wrap_internal().unwrap_err();
        assert_eq!(wrapped.code(), 500);
        assert!(wrapped.has_cause());
        assert_eq!(wrapped.cause().unwrap().type_name(), std::any::type_name::<ParseIntError>());

        let diagnostic = wrapped.diagnostic().unwrap();
        assert_eq!(diagnostic.message, "invalid digit found in string");

        let templated = "seven"
            .parse::<i32>()
            .wrap_with(HttpError::new(422).with_short("Not a number"))
            .unwrap_err();
        assert_eq!(templated.code(), 422);
        assert_eq!(templated.short(), Some("Not a number"));
    }

    #[test]
    fn test_result_ext_passes_http_errors_through() {
        let result: Result<(), HttpError> = Err(HttpError::new(418).with_short("teapot"));
        let passed = result.wrap_internal().unwrap_err();
        assert_eq!(passed.code(), 418);
        assert!(!passed.has_cause());
        assert!(passed.diagnostic().is_none());
    }

    #[test]
    fn test_panic_payloads() {
        assert_eq!(PanicError::from_payload(Box::new("static")).message(), "static");
        assert_eq!(PanicError::from_payload(Box::new(String::from("owned"))).message(), "owned");
        assert_eq!(PanicError::from_payload(Box::new(7_u8)).message(), "non-string panic payload");
    }

    #[test]
    fn test_finalize_is_idempotent_and_explicit_headers_win() {
        let request = get("/");
        let mut response = Response::text("hi")
            .with_error(HttpError::method_not_allowed([Method::GET, Method::PUT]))
            .with_header("allow", "PUT");

        response.finalize(&request);
        let first = response.headers().clone();
        response.finalize(&request);

        assert!(response.is_finalized());
        assert_eq!(response.code(), 405);
        assert_eq!(response.headers(), &first);
        assert_eq!(response.headers().get("Allow"), Some("PUT"));
        assert_eq!(response.headers().get_all("content-type").count(), 1);
        assert_eq!(response.headers().get("Content-Type"), Some("text/html;charset=utf-8"));

        let wire = response.into_wire(&request);
        assert_eq!(wire.body.into_bytes(), b"hi");
    }

    #[test]
    fn test_error_headers_fill_gaps() {
        let request = get("/");
        let error = HttpError::redirect("/new").with_header("Cache-Control", "no-store");
        let wire = Response::new(Flavor::Text).with_error(error).into_wire(&request);
        assert_eq!(wire.status.code, 302);
        assert_eq!(wire.header("Location"), Some("/new"));
        assert_eq!(wire.header("Cache-Control"), Some("no-store"));
    }

    #[test]
    fn test_content_mismatch_is_rejected() {
        let mut response = Response::new(Flavor::Raw);
        let err = response.set_content(Body::Text("nope".to_string())).unwrap_err();
        assert_eq!(err.code(), 500);
        assert_eq!(err.short(), Some("Unsupported response content"));

        let mut response = Response::new(Flavor::Json);
        assert!(response.write("text").is_err());
    }

    #[test]
    fn test_error_handlers_by_status() {
        init_logger();
        let mut builder = App::builder();
        builder
            .add_route("/other", [Method::GET], |_: &Request, _: &mut Response| {
                Err::<(), _>(HttpError::new(567))
            })
            .unwrap();
        builder.set_error_handler(404u16, |_: &Request, _: &mut Response| "NOT OK");
        builder.set_error_handler(567u16, |_: &Request, _: &mut Response| "OTHER");
        let app = builder.build();

        let missing = app.handle(&get("/nowhere"));
        assert_eq!(missing.status.code, 404);
        assert_eq!(body_text(missing), "NOT OK");

        let other = app.handle(&get("/other"));
        assert_eq!(other.status.code, 567);
        assert_eq!(other.status.phrase, "StatusPhraseUnknown");
        assert_eq!(body_text(other), "OTHER");
    }

    #[test]
    fn test_method_not_allowed_lists_methods() {
        init_logger();
        let mut builder = App::builder();
        builder.add_route("/", [Method::GET], |_: &Request, _: &mut Response| "get").unwrap();
        builder.add_route("/", [Method::POST], |_: &Request, _: &mut Response| "post").unwrap();
        let app = builder.build();

        let response = app.handle(&Request::new(Method::OPTIONS, "/", Headers::new()));
        assert_eq!(response.status.code, 405);
        assert_eq!(response.header("Allow"), Some("GET,POST"));
        assert!(body_text(response).starts_with("<h2>HTTP 405 - Method Not Allowed</h2>\n"));

        let post = app.handle(&Request::new(Method::POST, "/", Headers::new()));
        assert_eq!(body_text(post), "post");
    }

    #[test]
    fn test_sum_overflow_is_a_client_error() {
        let mut builder = App::builder();
        builder
            .add_route_with("/sum/<a:\\d+>", [Method::GET], Flavor::Json, |req: &Request, _: &mut Response| -> Result<serde_json::Value, HttpError> {
                let a = req.route_var("a").unwrap_or("0").parse::<u64>().wrap_internal()?;
                let b = req.query_vars().get("b").map_or(Ok(0), |b| b.parse::<u64>()).wrap_with(HttpError::new(400))?;
                let sum = a
                    .checked_add(b)
                    .ok_or_else(|| HttpError::new(400).with_short("the sum does not fit in 64 bits"))?;
                Ok(json!({ "sum": sum }))
            })
            .unwrap();
        let app = builder.build();

        assert_eq!(body_text(app.handle(&get("/sum/40?b=2"))), r#"{"sum":42}"#);

        let response = app.handle(&get("/sum/18446744073709551615?b=1"));
        assert_eq!(response.status.code, 400);
        assert!(body_text(response).contains("<h3>the sum does not fit in 64 bits</h3>"));
    }

    #[test]
    fn test_extension_methods_are_routed() {
        let propfind: Method = "PROPFIND".parse().unwrap();
        let mut builder = App::builder();
        builder.add_route("/files", [Method::GET], |_: &Request, _: &mut Response| "list").unwrap();
        builder.add_route("/dav", [propfind], |_: &Request, _: &mut Response| "props").unwrap();
        let app = builder.build();

        let rejected = app.handle(&Request::from_parts("PROPFIND", "/files", Headers::new()).unwrap());
        assert_eq!(rejected.status.code, 405);
        assert_eq!(rejected.header("Allow"), Some("GET"));

        let accepted = app.handle(&Request::from_parts("PROPFIND", "/dav", Headers::new()).unwrap());
        assert_eq!(accepted.status.code, 200);
        assert_eq!(body_text(accepted), "props");

        let listed = app.handle(&get("/dav"));
        assert_eq!(listed.header("Allow"), Some("PROPFIND"));
    }

    #[test]
    fn test_replacement_response_inherits_error() {
        let mut builder = App::builder();
        builder.add_route("/", [Method::GET], |_: &Request, _: &mut Response| ()).unwrap();
        builder.set_error_handler(&METHOD_NOT_ALLOWED, |_: &Request, _: &mut Response| {
            Response::text("custom")
        });
        let app = builder.build();

        let response = app.handle(&Request::new(Method::DELETE, "/", Headers::new()));
        assert_eq!(response.status.code, 200);
        assert_eq!(response.header("Allow"), Some("GET"));
        assert_eq!(body_text(response), "custom");
    }

    #[test]
    fn test_kind_handler_catches_derived_kinds() {
        let mut builder = App::builder();
        builder
            .add_route("/boot", [], |_: &Request, _: &mut Response| {
                Err::<(), _>(HttpError::new(503).with_kind(&STILL_NOT_READY))
            })
            .unwrap();
        builder.set_error_handler(&NOT_READY, |req: &Request, res: &mut Response| {
            res.headers_mut().set("Retry-After", "5");
            format!("not ready: {}", req.http_error().map_or(0, HttpError::code))
        });
        let app = builder.build();

        let response = app.handle(&get("/boot"));
        assert_eq!(response.status.code, 503);
        assert_eq!(response.header("Retry-After"), Some("5"));
        assert_eq!(body_text(response), "not ready: 503");
    }

    #[test]
    fn test_cause_handler() {
        let mut builder = App::builder();
        builder
            .add_route("/n/<n>", [Method::GET], |req: &Request, _: &mut Response| -> Result<String, HttpError> {
                let n = req.route_var("n").unwrap_or("").parse::<u32>().wrap_internal()?;
                Ok(format!("{}", n * 2))
            })
            .unwrap();
        builder.set_error_handler(ErrorKey::cause::<ParseIntError>(), |_: &Request, res: &mut Response| {
            res.set_code(400);
            "bad number"
        });
        let app = builder.build();

        assert_eq!(body_text(app.handle(&get("/n/21"))), "42");

        let bad = app.handle(&get("/n/abc"));
        assert_eq!(bad.status.code, 400);
        assert!(bad.diagnostic.as_ref().unwrap().type_name.ends_with("ParseIntError"));
        assert_eq!(body_text(bad), "bad number");
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        init_logger();
        let mut builder = App::builder();
        builder
            .add_route("/boom", [Method::GET], |_: &Request, _: &mut Response| -> &'static str {
                panic!("boom")
            })
            .unwrap();
        let app = builder.build();

        let response = app.handle(&get("/boom"));
        assert_eq!(response.status.code, 500);
        let diagnostic = response.diagnostic.clone().unwrap();
        assert!(diagnostic.type_name.ends_with("PanicError"));
        assert_eq!(diagnostic.message, "handler panicked: boom");
        assert!(body_text(response).starts_with("<h2>HTTP 500 - Internal Server Error</h2>\n"));
    }

    #[test]
    fn test_failing_error_handler_falls_back() {
        init_logger();
        let mut builder = App::builder();
        builder.set_error_handler(404u16, |_: &Request, _: &mut Response| -> &'static str {
            panic!("error handler broke")
        });
        let app = builder.build();

        let response = app.handle(&get("/missing"));
        assert_eq!(response.status.code, 500);
        let body = body_text(response);
        assert!(body.starts_with("<h2>HTTP 500 - Internal Server Error</h2>\n"));
        assert!(body.contains("<h4>While handling: HTTP 404 - Not Found</h4>"));
    }

    #[test]
    fn test_default_error_page_layout() {
        let mut builder = App::builder();
        builder
            .add_route("/gone", [Method::GET], |_: &Request, _: &mut Response| {
                Err::<(), _>(HttpError::new(410).with_short("<old>").with_desc("Moved & removed"))
            })
            .unwrap();
        builder
            .add_route("/short", [Method::GET], |_: &Request, _: &mut Response| {
                Err::<(), _>(HttpError::new(409).with_short("Taken"))
            })
            .unwrap();
        let app = builder.build();

        assert_eq!(
            body_text(app.handle(&get("/gone"))),
            "<h2>HTTP 410 - Gone</h2>\n<h3>&lt;old&gt;</h3>\n<div>Moved &amp; removed</div>\n"
        );
        assert_eq!(
            body_text(app.handle(&get("/short"))),
            "<h2>HTTP 409 - Conflict</h2>\n<h3>Taken</h3>\n<pre>HTTP 409 Conflict: Taken</pre>\n"
        );
    }

    #[test]
    fn test_default_error_page_requires_an_error() {
        let app = App::builder().build();
        let err = app.default_error_page(&get("/")).unwrap_err();
        assert_eq!(err.code(), 500);
        assert_eq!(err.short(), Some("Error handler called with no error"));
    }

    #[test]
    fn test_traces_exposed_only_when_configured() {
        fn build(expose_traces: bool) -> App {
            let mut builder = AppBuilder::new(AppConfig {
                expose_traces,
                ..AppConfig::default()
            });
            builder
                .add_route("/parse", [Method::GET], |_: &Request, _: &mut Response| {
                    "x".parse::<u8>().map(|n| n.to_string()).wrap_internal()
                })
                .unwrap();
            builder.build()
        }

        let hidden = body_text(build(false).handle(&get("/parse")));
        assert!(!hidden.contains("ParseIntError"));

        let shown = body_text(build(true).handle(&get("/parse")));
        assert!(shown.contains("ParseIntError: invalid digit found in string"));
    }

    #[test]
    fn test_json_flavor() {
        let mut builder = App::builder();
        builder
            .add_route_with("/pets/<id>", [Method::GET], Flavor::Json, |req: &Request, _: &mut Response| {
                json!({"id": req.route_var("id"), "query": req.vars().get("q")})
            })
            .unwrap();
        builder
            .add_route_with("/empty", [Method::GET], Flavor::Json, |_: &Request, _: &mut Response| ())
            .unwrap();
        let app = builder.build();

        let response = app.handle(&get("/pets/7?q=tail"));
        assert_eq!(response.header("Content-Type"), Some("application/json;charset=utf-8"));
        let value: serde_json::Value = serde_json::from_slice(&response.body.into_bytes()).unwrap();
        assert_eq!(value, json!({"id": "7", "query": "tail"}));

        assert_eq!(body_text(app.handle(&get("/empty"))), "[]");
    }

    #[test]
    fn test_default_flavor_from_config() {
        let config = AppConfig {
            default_flavor: Flavor::Json,
            ..AppConfig::default()
        };
        let mut builder = AppBuilder::new(config);
        builder.add_route("/", [], |_: &Request, _: &mut Response| "hello").unwrap();
        let app = builder.build();

        let response = app.handle(&get("/"));
        assert_eq!(response.header("Content-Type"), Some("application/json;charset=utf-8"));
        assert_eq!(body_text(response), "\"hello\"");
    }

    #[test]
    fn test_bytes_stream_and_raw_flavors() {
        let mut builder = App::builder();
        builder
            .add_route_with("/bytes", [Method::GET], Flavor::Bytes, |_: &Request, _: &mut Response| {
                vec![1_u8, 2, 3]
            })
            .unwrap();
        builder
            .add_route_with("/stream", [Method::GET], Flavor::Stream, |_: &Request, _: &mut Response| {
                Body::stream(vec![b"chunk-1 ".to_vec(), b"chunk-2".to_vec()])
            })
            .unwrap();
        builder
            .add_route_with("/raw", [Method::GET], Flavor::Raw, |_: &Request, res: &mut Response| {
                res.write_bytes(b"raw bytes")
            })
            .unwrap();
        builder
            .add_route_with("/raw-bad", [Method::GET], Flavor::Raw, |_: &Request, _: &mut Response| "text")
            .unwrap();
        let app = builder.build();

        let bytes = app.handle(&get("/bytes"));
        assert_eq!(bytes.header("Content-Type"), Some("application/octet-stream"));
        assert_eq!(bytes.body.into_bytes(), vec![1, 2, 3]);

        let stream = app.handle(&get("/stream"));
        assert!(matches!(stream.body, WireBody::Stream(_)));
        assert_eq!(stream.body.into_bytes(), b"chunk-1 chunk-2");

        let raw = app.handle(&get("/raw"));
        assert_eq!(raw.header("Content-Type"), None);
        assert_eq!(raw.body.into_bytes(), b"raw bytes");

        assert_eq!(app.handle(&get("/raw-bad")).status.code, 500);
    }

    #[test]
    fn test_head_requests_have_no_body() {
        let mut builder = App::builder();
        builder
            .add_route("/page", [Method::GET, Method::HEAD], |_: &Request, res: &mut Response| {
                res.headers_mut().set("ETag", "\"v1\"");
                "<p>page</p>"
            })
            .unwrap();
        let app = builder.build();

        let response = app.handle(&Request::new(Method::HEAD, "/page", Headers::new()));
        assert_eq!(response.status.code, 200);
        assert_eq!(response.header("ETag"), Some("\"v1\""));
        assert_eq!(response.header("Content-Type"), Some("text/html;charset=utf-8"));
        assert!(response.body.into_bytes().is_empty());
    }

    #[test]
    fn test_server_header() {
        let mut builder = App::builder();
        builder.add_route("/", [], |_: &Request, _: &mut Response| ()).unwrap();
        builder
            .add_route("/custom", [], |_: &Request, res: &mut Response| {
                res.headers_mut().set("Server", "custom");
            })
            .unwrap();
        let app = builder.build();

        let default_server = AppConfig::default().server_header.unwrap();
        assert_eq!(app.handle(&get("/")).header("Server"), Some(default_server.as_str()));
        assert_eq!(app.handle(&get("/custom")).header("Server"), Some("custom"));

        let quiet = AppBuilder::new(AppConfig {
            server_header: None,
            ..AppConfig::default()
        })
        .build();
        assert_eq!(quiet.handle(&get("/")).header("Server"), None);
    }

    #[test]
    fn test_invalid_route_is_rejected_at_registration() {
        let mut builder = App::builder();
        let result = builder.add_route("/<id:[>", [Method::GET], |_: &Request, _: &mut Response| ());
        assert!(matches!(result, Err(Error::Pattern(_))));
    }

    #[test]
    fn test_config_from_json() {
        let config = AppConfig::from_json_str(r#"{"expose_traces": true, "default_flavor": "json"}"#).unwrap();
        assert!(config.expose_traces);
        assert!(!config.log_traces);
        assert_eq!(config.default_flavor, Flavor::Json);
        assert_eq!(config.server_header, AppConfig::default().server_header);

        let config = AppConfig::from_json_str(r#"{"server_header": null}"#).unwrap();
        assert_eq!(config.server_header, None);

        assert!(matches!(AppConfig::from_json_str("{"), Err(Error::Config(_))));
        assert!(matches!(
            AppConfig::from_json_file("/nonexistent/tinydispatch.json"),
            Err(Error::Io(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_app() {
        init_logger();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let mut builder = App::builder();
        builder
            .add_route("/echo/<n:\\d+>", [Method::GET], move |req: &Request, _: &mut Response| {
                counter.fetch_add(1, Ordering::SeqCst);
                req.route_var("n").unwrap_or_default().to_string()
            })
            .unwrap();
        let app = Arc::new(builder.build());

        let mut tasks = Vec::new();
        for i in 0..64 {
            let app = Arc::clone(&app);
            tasks.push(tokio::task::spawn_blocking(move || {
                let response = app.handle(&get(&format!("/echo/{i}")));
                (i, body_text(response))
            }));
        }

        for task in tasks {
            let (i, body) = task.await.unwrap();
            assert_eq!(body, i.to_string());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shared_app_swap_keeps_snapshots() {
        init_logger();
        fn version(reply: &'static str) -> App {
            let mut builder = App::builder();
            builder.add_route("/version", [Method::GET], move |_: &Request, _: &mut Response| reply).unwrap();
            builder.build()
        }

        let shared = Arc::new(SharedApp::new(version("v1")));
        let snapshot = shared.load();

        let previous = shared.replace(version("v2"));
        assert!(Arc::ptr_eq(&previous, &snapshot));

        let worker = Arc::clone(&shared);
        let body = tokio::task::spawn_blocking(move || body_text(worker.handle(&get("/version"))))
            .await
            .unwrap();
        assert_eq!(body, "v2");
        assert_eq!(body_text(snapshot.handle(&get("/version"))), "v1");
    }
}
