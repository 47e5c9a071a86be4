/// Scripted in-memory endpoint for integration tests
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use threadline_core::{ApiRequest, Config, Endpoint, FeedError, PacingConfig, RawResponse, Result, Session};
use tokio::time::Instant;

#[allow(dead_code)]
pub enum Scripted {
    Json(Value),
    Raw(u16, &'static str),
    Fail(&'static str),
    /// Answer only after the delay has passed
    Delayed(Duration, Box<Scripted>),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub request: ApiRequest,
    pub at: Instant,
}

#[derive(Default)]
pub struct ScriptedEndpoint {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<Call>>,
}

#[allow(dead_code)]
impl ScriptedEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, endpoint: &str, response: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn push_json(&self, endpoint: &str, value: Value) {
        self.push(endpoint, Scripted::Json(value));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.request.endpoint == endpoint)
            .collect()
    }
}

impl Endpoint for ScriptedEndpoint {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<RawResponse>> {
        let scripted = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&request.endpoint)
            .and_then(VecDeque::pop_front);
        let missing = format!("no scripted response for {}", request.endpoint);
        self.calls.lock().unwrap().push(Call {
            request,
            at: Instant::now(),
        });

        let (delay, result) = match scripted {
            Some(scripted) => respond(scripted),
            None => (None, Err(FeedError::Transport(missing))),
        };
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

fn respond(scripted: Scripted) -> (Option<Duration>, Result<RawResponse>) {
    match scripted {
        Scripted::Json(value) => (None, Ok(RawResponse::ok(value.to_string()))),
        Scripted::Raw(status, body) => (
            None,
            Ok(RawResponse {
                status,
                body: body.into(),
            }),
        ),
        Scripted::Fail(msg) => (None, Err(FeedError::Transport(msg.to_string()))),
        Scripted::Delayed(delay, inner) => {
            let (_, result) = respond(*inner);
            (Some(delay), result)
        }
    }
}

/// Session over a scripted endpoint with default pacing
pub fn session(endpoint: &Arc<ScriptedEndpoint>) -> Session {
    session_with(endpoint, PacingConfig::default())
}

#[allow(dead_code)]
pub fn session_with(endpoint: &Arc<ScriptedEndpoint>, pacing: PacingConfig) -> Session {
    let config = Config {
        uuid: "device-uuid".to_string(),
        device_id: "android-device".to_string(),
        pacing,
        ..Default::default()
    };
    Session::new(config, endpoint.clone())
}
