//! A local HTTP endpoint for exercising the network clients in tests.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

/// A request received by [`MockHttp`].
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path including the query string.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

type Handler = dyn Fn(&Request) -> (u16, Value) + Send + Sync;

#[derive(Clone)]
struct Shared {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<Request>>>,
}

/// Answers every request through a handler and records what it received.
pub struct MockHttp {
    address: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
    handle: JoinHandle<()>,
}

impl MockHttp {
    pub async fn start(handler: impl Fn(&Request) -> (u16, Value) + Send + Sync + 'static) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(respond).with_state(Shared {
            handler: Arc::new(handler),
            requests: requests.clone(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self {
            address,
            requests,
            handle,
        }
    }

    /// A JSON-RPC node answering each call with `handler(method, params)`.
    pub async fn json_rpc(handler: impl Fn(&str, &Value) -> Value + Send + Sync + 'static) -> Self {
        Self::start(move |request| {
            let call = request.json();
            let result = handler(call["method"].as_str().unwrap_or_default(), &call["params"]);
            (200, json!({"jsonrpc": "2.0", "id": call["id"], "result": result}))
        })
        .await
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.address)).unwrap()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockHttp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let request = Request {
        method,
        path: uri
            .path_and_query()
            .map(|path| path.to_string())
            .unwrap_or_default(),
        headers,
        body,
    };

    let (status, response) = (shared.handler)(&request);
    shared.requests.lock().unwrap().push(request);

    (
        StatusCode::from_u16(status).unwrap(),
        Json(response),
    )
}
