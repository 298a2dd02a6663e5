//! Shared fixtures for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use gqlchain_core::{CacheKey, GraphqlResponse, Operation};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::{Value, json};

use crate::PipelineError;
use crate::cache::{NormalizedCache, Record};
use crate::context::ResponseContext;
use crate::error::CacheError;
use crate::interceptor::{BoxFuture, FnInterceptor, Interceptor};
use crate::result::GraphQLResult;
use crate::transport::Transport;

pub(crate) fn hero_query() -> Operation {
    Operation::query("Hero", "query Hero { hero { name } }")
}

pub(crate) fn value() -> Value {
    json!({"hero": {"name": "Luke"}})
}

pub(crate) fn http_response(status: u16, body: &str) -> ResponseContext {
    ResponseContext::new(
        StatusCode::from_u16(status).unwrap(),
        HeaderMap::new(),
        Bytes::from(body.to_owned()),
    )
}

/// A stage that attaches `parsed` to the response and proceeds.
pub(crate) fn parsed_stage(parsed: GraphQLResult) -> Box<dyn Interceptor> {
    Box::new(FnInterceptor::new("attach-result", move |chain, request, response| {
        let response = response
            .unwrap_or_else(|| http_response(200, "{}"))
            .with_parsed(parsed.clone());
        Box::pin(async move { chain.proceed(request, Some(response)) })
    }))
}

/// A stage that attaches a server result carrying `data` and proceeds.
pub(crate) fn result_stage(data: Value) -> Box<dyn Interceptor> {
    parsed_stage(GraphQLResult::from_server(GraphqlResponse {
        data: Some(data),
        ..Default::default()
    }))
}

/// What a [`MockTransport`] saw.
#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A transport answering from a script, recording every request.
#[derive(Default)]
pub(crate) struct MockTransport {
    script: Mutex<VecDeque<Result<http::Response<Bytes>, PipelineError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_json(&self, status: u16, body: &str) {
        let response = http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Bytes::from(body.to_owned()))
            .unwrap();
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub(crate) fn push_error(&self, error: PipelineError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, PipelineError>> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            self.requests.lock().unwrap().push(RecordedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(PipelineError::transport("no scripted response")))
        })
    }
}

/// A cache counting reads and recording writes.
#[derive(Default)]
pub(crate) struct RecordingCache {
    records: Mutex<HashMap<CacheKey, Record>>,
    reads: Mutex<usize>,
    writes: Mutex<Vec<(CacheKey, Record)>>,
    failing: bool,
}

impl RecordingCache {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_record(key: CacheKey, record: Record) -> Arc<Self> {
        let cache = Self::default();
        cache.records.lock().unwrap().insert(key, record);
        Arc::new(cache)
    }

    /// A cache whose reads and writes all fail.
    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Default::default()
        })
    }

    pub(crate) fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }

    pub(crate) fn writes(&self) -> Vec<(CacheKey, Record)> {
        self.writes.lock().unwrap().clone()
    }
}

impl NormalizedCache for RecordingCache {
    fn read<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<Option<Record>, CacheError>> {
        Box::pin(async move {
            *self.reads.lock().unwrap() += 1;
            if self.failing {
                return Err(CacheError::Read("unavailable".into()));
            }
            Ok(self.records.lock().unwrap().get(key).cloned())
        })
    }

    fn write(&self, key: CacheKey, record: Record) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            if self.failing {
                return Err(CacheError::Write("unavailable".into()));
            }
            self.writes.lock().unwrap().push((key.clone(), record.clone()));
            self.records.lock().unwrap().insert(key, record);
            Ok(())
        })
    }
}
