/// HTTP endpoint client on hyper
use crate::config::Config;
use crate::endpoint::{ApiRequest, Endpoint, Method, RawResponse};
use crate::error::{FeedError, Result};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::future::BoxFuture;
use http::{Method as HttpMethod, Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::io::Write;
use tokio::time::timeout;
use tracing::debug;

const USER_AGENT: &str = "threadline/0.1";

/// Plain-HTTP [`Endpoint`]. No signing or auth, the server side is trusted.
#[derive(Clone)]
pub struct HttpEndpoint {
    client: Client<HttpConnector, Full<Bytes>>,
    config: Config,
}

impl HttpEndpoint {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            config: config.clone(),
        }
    }

    async fn send(&self, request: ApiRequest) -> Result<RawResponse> {
        let url = self.config.url_for(&request.endpoint);
        let request_timeout = self.config.request_timeout;
        let encoded = encode_query(&request);

        let (method, uri, body) = match request.method {
            Method::Get if encoded.is_empty() => (HttpMethod::GET, url, Bytes::new()),
            Method::Get => (HttpMethod::GET, format!("{}?{}", url, encoded), Bytes::new()),
            Method::Post if request.gzip => (HttpMethod::POST, url, gzip(encoded.as_bytes())?),
            Method::Post => (HttpMethod::POST, url, Bytes::from(encoded)),
        };

        let mut builder = Request::builder()
            .method(method)
            .uri(uri.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json");
        if request.method == Method::Post {
            builder = builder.header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8");
            if request.gzip {
                builder = builder.header("Content-Encoding", "gzip");
            }
        }
        for (name, value) in &request.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let req = builder
            .body(Full::new(body))
            .map_err(|e| FeedError::Transport(format!("Invalid request for {}: {}", uri, e)))?;

        debug!("{} {}", req.method(), uri);

        let exchange = async {
            let resp: Response<Incoming> = self
                .client
                .request(req)
                .await
                .map_err(|e| FeedError::Transport(format!("{}: {}", uri, e)))?;
            let status = resp.status().as_u16();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| FeedError::Transport(format!("Failed to read body from {}: {}", uri, e)))?
                .to_bytes();
            Ok::<_, FeedError>(RawResponse { status, body })
        };

        timeout(request_timeout, exchange)
            .await
            .map_err(|_| FeedError::Timeout(format!("{} after {:?}", uri, request_timeout)))?
    }
}

impl Endpoint for HttpEndpoint {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<RawResponse>> {
        Box::pin(self.send(request))
    }
}

/// Form-encode the flat query map
fn encode_query(request: &ApiRequest) -> String {
    request
        .query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn gzip(data: &[u8]) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(Bytes::from(encoder.finish()?))
}
