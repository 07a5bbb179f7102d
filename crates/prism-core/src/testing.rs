//! Loopback HTTP stub used by the client, health, and supervisor tests.
//!
//! Serves canned responses per path over a real socket so that timeouts,
//! refused connections, and multipart bodies behave as they do in production.

use std::collections::HashMap;
use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

/// A canned response for one path.
#[derive(Debug, Clone)]
pub(crate) struct StubResponse {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
    delay: Duration,
}

impl StubResponse {
    pub(crate) fn json(status: u16, value: serde_json::Value) -> Self {
        Self::raw(status, "application/json", &value.to_string())
    }

    pub(crate) fn text(status: u16, body: &str) -> Self {
        Self::raw(status, "text/plain; charset=utf-8", body)
    }

    /// A body with an explicit (possibly misleading) content type.
    pub(crate) fn raw(status: u16, content_type: &str, body: &str) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            body: body.as_bytes().to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    /// Hold the response back for `delay` after the request is read.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as seen by the stub.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercased
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// `tiny_http` server on an ephemeral port, stopped on drop.
pub(crate) struct StubServer {
    addr: SocketAddr,
    server: Arc<Server>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    /// Start serving `routes` on an ephemeral loopback port.
    pub(crate) fn start(routes: Vec<(&str, StubResponse)>) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let routes: Arc<HashMap<String, StubResponse>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, resp)| (path.to_string(), resp))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let accept = server.clone();
        let recorded = requests.clone();
        std::thread::spawn(move || {
            for request in accept.incoming_requests() {
                let routes = routes.clone();
                let recorded = recorded.clone();
                // One thread per request so a delayed route never blocks the others
                std::thread::spawn(move || serve(request, &routes, &recorded));
            }
        });

        Self {
            addr,
            server,
            requests,
        }
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn port(&self) -> u16 {
        self.addr.port()
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

fn serve(
    mut request: Request,
    routes: &HashMap<String, StubResponse>,
    recorded: &Mutex<Vec<RecordedRequest>>,
) {
    let mut body = Vec::new();
    let _ = request.as_reader().read_to_end(&mut body);
    let path = request.url().to_string();
    recorded.lock().unwrap().push(RecordedRequest {
        method: request.method().to_string(),
        path: path.clone(),
        headers: request
            .headers()
            .iter()
            .map(|h| {
                (
                    h.field.as_str().as_str().to_ascii_lowercase(),
                    h.value.as_str().to_string(),
                )
            })
            .collect(),
        body,
    });

    let stub = routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| StubResponse::empty(404));
    if !stub.delay.is_zero() {
        std::thread::sleep(stub.delay);
    }

    let mut response = Response::from_data(stub.body).with_status_code(stub.status);
    if let Some(content_type) = &stub.content_type {
        response.add_header(Header::from_bytes("Content-Type", content_type.as_bytes()).unwrap());
    }
    // The client may have given up already (timeout tests)
    let _ = request.respond(response);
}

/// A loopback URL nothing is listening on.
pub(crate) fn closed_port_url() -> String {
    format!("http://127.0.0.1:{}", free_port())
}

/// A loopback port nothing is listening on.
pub(crate) fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
