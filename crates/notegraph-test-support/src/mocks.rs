//! Scripted transport and recording sleeper for pipeline tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use notegraph_core::{ApiRequest, ApiResponse, NoteResult, Sleeper, Transport};
use reqwest::Method;

/// Status returned when a request has no scripted response left.
pub const UNSCRIPTED_STATUS: u16 = 599;

/// A request observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Operation name supplied by the caller.
    pub operation: &'static str,
    /// HTTP method.
    pub method: Method,
    /// Full request URL.
    pub url: String,
    /// URL path component.
    pub path: String,
    /// Extra headers supplied by the caller.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl RecordedCall {
    /// Value of a caller-supplied header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as lossy UTF-8.
    #[must_use]
    pub fn body_text(&self) -> String {
        self.body
            .as_deref()
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .unwrap_or_default()
    }
}

struct Route {
    method: Method,
    path_suffix: String,
    responses: VecDeque<ApiResponse>,
}

/// [`Transport`] answering from per-route response queues and recording every call.
///
/// Routes match on method and URL path suffix; responses are consumed in order.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Empty transport; every request gets [`UNSCRIPTED_STATUS`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `response` for requests matching `method` and `path_suffix`.
    pub fn enqueue(&self, method: Method, path_suffix: &str, response: ApiResponse) {
        self.enqueue_all(method, path_suffix, [response]);
    }

    /// Queue several responses for one route, in order.
    pub fn enqueue_all(
        &self,
        method: Method,
        path_suffix: &str,
        responses: impl IntoIterator<Item = ApiResponse>,
    ) {
        let mut routes = lock(&self.routes);
        if let Some(route) = routes
            .iter_mut()
            .find(|route| route.method == method && route.path_suffix == path_suffix)
        {
            route.responses.extend(responses);
            return;
        }
        routes.push(Route {
            method,
            path_suffix: path_suffix.to_string(),
            responses: responses.into_iter().collect(),
        });
    }

    /// Every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Total number of calls observed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Calls matching `method` whose path ends with `path_suffix`.
    #[must_use]
    pub fn count(&self, method: &Method, path_suffix: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| &call.method == method && call.path.ends_with(path_suffix))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> NoteResult<ApiResponse> {
        let url = request.url.to_string();
        let path = request.url.path().to_string();
        lock(&self.calls).push(RecordedCall {
            operation: request.operation,
            method: request.method.clone(),
            url,
            path: path.clone(),
            headers: request.headers,
            body: request.body,
        });

        let mut routes = lock(&self.routes);
        let response = routes
            .iter_mut()
            .filter(|route| route.method == request.method && path.ends_with(&route.path_suffix))
            .find_map(|route| route.responses.pop_front());
        Ok(response.unwrap_or_else(|| {
            ApiResponse::new(
                UNSCRIPTED_STATUS,
                format!("no scripted response for {} {path}", request.method),
            )
        }))
    }
}

/// [`Sleeper`] that returns immediately and records requested pauses.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// New sleeper with no recorded pauses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses requested so far.
    #[must_use]
    pub fn pauses(&self) -> Vec<Duration> {
        lock(&self.pauses).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.pauses).push(duration);
    }
}
