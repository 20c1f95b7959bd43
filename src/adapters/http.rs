//! HTTP backends.
//!
//! Requests are staged into a [`BufferedExchange`] before the shared
//! handler runs and the response is written out afterwards. A configuration
//! page comfortably fits in RAM, and buffering keeps the handler identical
//! between the threaded device server and the host simulation.

use crate::error::Result;
use crate::ports::{HttpExchange, Method};

#[cfg(not(target_os = "espidf"))]
use crate::error::Error;
#[cfg(not(target_os = "espidf"))]
use crate::ports::{HttpServerPort, RequestHandler};

// ── Form decoding ──────────────────────────────────────────────

/// Decodes one `application/x-www-form-urlencoded` component: `+` becomes
/// a space, valid `%XX` escapes become their byte, broken escapes pass
/// through literally.
pub fn decode_component(text: &str) -> String {
    fn hex(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Splits a query string or form body into decoded name/value pairs, in
/// submission order.
pub fn parse_form(text: &str) -> Vec<(String, String)> {
    text.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect()
}

// ── Buffered exchange ──────────────────────────────────────────

/// In-memory [`HttpExchange`]: the request side is filled in up front, the
/// response side records whatever the handler produced.
pub struct BufferedExchange {
    method: Method,
    uri: String,
    host: Option<String>,
    args: Vec<(String, String)>,
    status: Option<u16>,
    content_type: String,
    body: String,
    redirect: Option<String>,
}

impl BufferedExchange {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            host: None,
            args: Vec::new(),
            status: None,
            content_type: String::new(),
            body: String::new(),
            redirect: None,
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::Get, uri)
    }

    pub fn post(uri: &str, args: &[(&str, &str)]) -> Self {
        let mut ex = Self::new(Method::Post, uri);
        for (name, value) in args {
            ex.add_arg((*name).to_owned(), (*value).to_owned());
        }
        ex
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::Delete, uri)
    }

    pub fn other(uri: &str) -> Self {
        Self::new(Method::Other, uri)
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_owned());
        self
    }

    pub fn add_arg(&mut self, name: String, value: String) {
        self.args.push((name, value));
    }

    // Response side, for assertions and for writing out on device.

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn redirect_target(&self) -> Option<&str> {
        self.redirect.as_deref()
    }
}

impl HttpExchange for BufferedExchange {
    fn method(&self) -> Method {
        self.method
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    fn arg_count(&self) -> usize {
        self.args.len()
    }

    fn arg(&self, index: usize) -> Option<(&str, &str)> {
        self.args
            .get(index)
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn send(&mut self, status: u16, content_type: &str, body: &str) -> Result<()> {
        self.status = Some(status);
        self.content_type = content_type.to_owned();
        self.body = body.to_owned();
        Ok(())
    }

    fn chunked_begin(&mut self, content_type: &str) -> Result<()> {
        self.status = Some(200);
        self.content_type = content_type.to_owned();
        Ok(())
    }

    fn chunk(&mut self, data: &str) -> Result<()> {
        self.body.push_str(data);
        Ok(())
    }

    fn chunked_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn redirect(&mut self, location: &str) -> Result<()> {
        self.status = Some(302);
        self.redirect = Some(location.to_owned());
        Ok(())
    }
}

// ── Simulation server ──────────────────────────────────────────

/// Records the installed handler and lets tests dispatch exchanges
/// through it by hand.
#[cfg(not(target_os = "espidf"))]
pub struct SimHttpServer {
    handler: Option<RequestHandler>,
    fail_start: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimHttpServer {
    pub fn new() -> Self {
        Self {
            handler: None,
            fail_start: false,
        }
    }

    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn running(&self) -> bool {
        self.handler.is_some()
    }

    /// Routes one exchange through the installed handler.
    pub fn dispatch(&self, exchange: &mut BufferedExchange) -> bool {
        match &self.handler {
            Some(handler) => {
                handler(exchange);
                true
            }
            None => false,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimHttpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpServerPort for SimHttpServer {
    fn start(&mut self, handler: RequestHandler) -> Result<()> {
        if self.fail_start {
            return Err(Error::Io("http start"));
        }
        self.handler = Some(handler);
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the handler releases its grip on the shared state.
        self.handler = None;
    }
}

// ── ESP-IDF server ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod espidf {
    use std::sync::Arc;

    use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
    use esp_idf_svc::http::Method as EspMethod;
    use esp_idf_svc::io::{Read, Write};

    use super::{parse_form, BufferedExchange};
    use crate::error::{Error, Result};
    use crate::ports::{HttpServerPort, Method, RequestHandler};

    /// Portal HTTP server over the ESP-IDF httpd. Requests run on the
    /// server's own threads, so [`HttpServerPort::poll`] has nothing to do.
    pub struct EspHttpPortal {
        server: Option<EspHttpServer<'static>>,
    }

    impl EspHttpPortal {
        pub fn new() -> Self {
            Self { server: None }
        }
    }

    impl Default for EspHttpPortal {
        fn default() -> Self {
            Self::new()
        }
    }

    fn bridge(
        method: Method,
        handler: &RequestHandler,
        mut req: Request<&mut EspHttpConnection<'_>>,
    ) -> anyhow::Result<()> {
        let uri = req.uri().to_owned();
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p.to_owned(), q.to_owned()),
            None => (uri, String::new()),
        };
        let host = req.header("Host").map(str::to_owned);

        let mut exchange = BufferedExchange::new(method, path);
        if let Some(host) = &host {
            exchange = exchange.with_host(host);
        }
        for (name, value) in parse_form(&query) {
            exchange.add_arg(name, value);
        }
        if method == Method::Post {
            let mut body = Vec::new();
            let mut buf = [0u8; 256];
            loop {
                let n = req.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&buf[..n]);
            }
            for (name, value) in parse_form(&String::from_utf8_lossy(&body)) {
                exchange.add_arg(name, value);
            }
        }

        handler(&mut exchange);

        if let Some(target) = exchange.redirect_target() {
            req.into_response(302, None, &[("Location", target)])?;
            return Ok(());
        }
        let status = exchange.status().unwrap_or(404);
        let content_type = exchange.content_type().to_owned();
        let mut response =
            req.into_response(status, None, &[("Content-Type", &content_type)])?;
        response.write_all(exchange.body().as_bytes())?;
        Ok(())
    }

    impl HttpServerPort for EspHttpPortal {
        fn start(&mut self, handler: RequestHandler) -> Result<()> {
            let config = Configuration {
                uri_match_wildcard: true,
                ..Configuration::default()
            };
            let mut server =
                EspHttpServer::new(&config).map_err(|_| Error::Io("http server"))?;
            let methods = [
                (EspMethod::Get, Method::Get),
                (EspMethod::Post, Method::Post),
                (EspMethod::Delete, Method::Delete),
            ];
            for (esp_method, method) in methods {
                let handler = Arc::clone(&handler);
                server
                    .fn_handler::<anyhow::Error, _>("/*", esp_method, move |req| {
                        bridge(method, &handler, req)
                    })
                    .map_err(|_| Error::Io("http route"))?;
            }
            self.server = Some(server);
            Ok(())
        }

        fn poll(&mut self) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) {
            self.server = None;
        }
    }
}

#[cfg(target_os = "espidf")]
pub use espidf::EspHttpPortal;

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn decodes_escapes_plus_and_broken_sequences() {
        assert_eq!(decode_component("a+b"), "a b");
        assert_eq!(decode_component("caf%C3%A9"), "café");
        assert_eq!(decode_component("50%25"), "50%");
        assert_eq!(decode_component("bad%G1"), "bad%G1");
        assert_eq!(decode_component("tail%2"), "tail%2");
    }

    #[test]
    fn parses_pairs_in_order() {
        let args = parse_form("ssid=my+net&port=1883&flag");
        assert_eq!(
            args,
            vec![
                ("ssid".to_owned(), "my net".to_owned()),
                ("port".to_owned(), "1883".to_owned()),
                ("flag".to_owned(), String::new()),
            ]
        );
        assert!(parse_form("").is_empty());
    }

    #[test]
    fn exchange_records_responses() {
        let mut ex = BufferedExchange::get("/x");
        ex.chunked_begin("text/html").unwrap();
        ex.chunk("<p>").unwrap();
        ex.chunk("hi</p>").unwrap();
        ex.chunked_end().unwrap();
        assert_eq!(ex.status(), Some(200));
        assert_eq!(ex.body(), "<p>hi</p>");

        let mut ex = BufferedExchange::get("/y");
        ex.redirect("http://192.168.4.1/").unwrap();
        assert_eq!(ex.status(), Some(302));
        assert_eq!(ex.redirect_target(), Some("http://192.168.4.1/"));
    }

    #[test]
    fn arg_lookup_finds_first_match() {
        let ex = BufferedExchange::post("/", &[("a", "1"), ("a", "2"), ("b", "3")]);
        use crate::ports::HttpExchange;
        assert_eq!(ex.arg_by_name("a"), Some("1"));
        assert_eq!(ex.arg_by_name("b"), Some("3"));
        assert_eq!(ex.arg_by_name("c"), None);
    }

    #[test]
    fn server_dispatches_through_installed_handler() {
        use crate::ports::HttpExchange;
        let mut server = SimHttpServer::new();
        assert!(!server.dispatch(&mut BufferedExchange::get("/")));
        server
            .start(std::sync::Arc::new(|ex: &mut dyn HttpExchange| {
                let _ = ex.send(200, "text/plain", "pong");
            }))
            .unwrap();
        let mut ex = BufferedExchange::get("/ping");
        assert!(server.dispatch(&mut ex));
        assert_eq!(ex.body(), "pong");
        server.stop();
        assert!(!server.running());
    }
}
