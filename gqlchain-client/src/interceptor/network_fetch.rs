//! Network-fetch stage.

use std::sync::Arc;

use bytes::Bytes;
use gqlchain_core::{HttpMethod, OperationKind, WireOptions, WireRequest, encode_request};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Uri};

use crate::PipelineError;
use crate::chain::Activation;
use crate::config::PipelineConfig;
use crate::context::{RequestContext, ResponseContext};
use crate::interceptor::{BoxFuture, Interceptor};
use crate::transport::Transport;

const APPLICATION_JSON: &str = "application/json";
const ACCEPT_GRAPHQL: &str = "application/graphql-response+json, application/json";

const OPERATION_NAME: &str = "x-apollo-operation-name";
const OPERATION_TYPE: &str = "x-apollo-operation-type";
const CLIENT_NAME: &str = "apollographql-client-name";
const CLIENT_VERSION: &str = "apollographql-client-version";

/// Encodes the operation, sends it through the [`Transport`] and proceeds
/// with the raw [`ResponseContext`].
///
/// Connectivity failures and timeouts fail the chain with
/// [`PipelineError::Transport`]. Any HTTP status is passed on; validating it
/// is the response-code stage's job.
pub struct NetworkFetchInterceptor {
    transport: Arc<dyn Transport>,
    endpoint: Uri,
    config: Arc<PipelineConfig>,
}

impl NetworkFetchInterceptor {
    pub fn new(transport: Arc<dyn Transport>, endpoint: Uri, config: Arc<PipelineConfig>) -> Self {
        Self {
            transport,
            endpoint,
            config,
        }
    }

    /// HTTP method for this attempt. Only queries may use GET.
    fn method(&self, request: &RequestContext) -> HttpMethod {
        if request.operation.kind() != OperationKind::Query {
            return HttpMethod::Post;
        }
        let config = &self.config;
        let use_get = if request.is_persisted_query_retry() {
            config.use_get_for_persisted_query_retry
        } else {
            config.use_get_for_queries
                || (config.auto_persist_queries && config.use_get_for_persisted_query_retry)
        };
        if use_get {
            HttpMethod::Get
        } else {
            HttpMethod::Post
        }
    }

    /// Persisted-only operations always carry their hash, with or without
    /// automatic persisted queries.
    fn wire_options(&self, request: &RequestContext) -> WireOptions {
        let auto_persist = self.config.auto_persist_queries;
        let has_document = request.operation.document().is_some();
        WireOptions {
            method: self.method(request),
            send_document: has_document && (!auto_persist || request.is_persisted_query_retry()),
            persisted_query: auto_persist || !has_document,
        }
    }

    /// Build the HTTP request for this attempt.
    pub(crate) fn build_request(
        &self,
        request: &RequestContext,
    ) -> Result<http::Request<Bytes>, PipelineError> {
        let options = self.wire_options(request);
        let (uri, body) = match encode_request(&request.operation, options)? {
            WireRequest::Body(body) => (self.endpoint.clone(), body),
            WireRequest::Query(query) => (self.uri_with_query(&query)?, Bytes::new()),
        };

        let mut builder = http::Request::builder()
            .method(options.method.as_str())
            .uri(uri);
        if let Some(headers) = builder.headers_mut() {
            self.apply_headers(headers, request, options.method);
        }
        builder
            .body(body)
            .map_err(|e| PipelineError::Encode(format!("invalid request: {}", e)))
    }

    fn uri_with_query(&self, query: &str) -> Result<Uri, PipelineError> {
        let endpoint = self.endpoint.to_string();
        let separator = if self.endpoint.query().is_some() { '&' } else { '?' };
        format!("{}{}{}", endpoint, separator, query)
            .parse()
            .map_err(|e| PipelineError::Encode(format!("invalid request URI: {}", e)))
    }

    fn apply_headers(&self, headers: &mut HeaderMap, request: &RequestContext, method: HttpMethod) {
        for (name, value) in self.config.additional_headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in request.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        if method == HttpMethod::Post {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_GRAPHQL));
        insert_text(headers, OPERATION_NAME, request.operation.name());
        headers.insert(
            HeaderName::from_static(OPERATION_TYPE),
            HeaderValue::from_static(request.operation.kind().as_str()),
        );
        if let Some(name) = &self.config.client_name {
            insert_text(headers, CLIENT_NAME, name);
        }
        if let Some(version) = &self.config.client_version {
            insert_text(headers, CLIENT_VERSION, version);
        }
    }

    async fn send(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>, PipelineError> {
        match self.config.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.transport.send(request))
                .await
                .map_err(|_| {
                    PipelineError::transport(format!("request timed out after {:?}", timeout))
                })?,
            None => self.transport.send(request).await,
        }
    }
}

fn insert_text(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => tracing::debug!(header = name, "skipping header with invalid value"),
    }
}

impl Interceptor for NetworkFetchInterceptor {
    fn id(&self) -> &str {
        "network-fetch"
    }

    fn intercept(
        &self,
        chain: Activation,
        request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let http_request = match self.build_request(&request) {
                Ok(http_request) => http_request,
                Err(err) => {
                    chain.fail(&request, response.as_ref(), err);
                    return;
                }
            };
            tracing::debug!(
                method = %http_request.method(),
                uri = %http_request.uri(),
                attempt = request.attempt(),
                "sending request"
            );

            let result = tokio::select! {
                result = self.send(http_request) => result,
                _ = chain.cancelled() => return,
            };

            match result {
                Ok(http_response) => {
                    tracing::trace!(status = %http_response.status(), "response received");
                    chain.proceed(request, Some(ResponseContext::from_http(http_response)));
                }
                Err(err) => chain.fail(&request, response.as_ref(), err),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptorChain;
    use crate::test_support::{MockTransport, hero_query};
    use gqlchain_core::Operation;
    use std::collections::HashMap;
    use std::time::Duration;

    fn interceptor(transport: Arc<MockTransport>, config: PipelineConfig) -> NetworkFetchInterceptor {
        NetworkFetchInterceptor::new(
            transport,
            "http://localhost:4000/graphql".parse().unwrap(),
            Arc::new(config),
        )
    }

    fn query_params(request: &http::Request<Bytes>) -> HashMap<String, String> {
        serde_qs::from_str(request.uri().query().unwrap_or_default()).unwrap()
    }

    #[test]
    fn test_post_by_default() {
        let fetch = interceptor(MockTransport::new(), PipelineConfig::new());
        let request = fetch.build_request(&RequestContext::new(hero_query())).unwrap();

        assert_eq!(request.method(), http::Method::POST);
        assert_eq!(request.headers()[CONTENT_TYPE], APPLICATION_JSON);
        assert_eq!(request.headers()["x-apollo-operation-name"], "Hero");
        assert_eq!(request.headers()["x-apollo-operation-type"], "query");

        let body: serde_json::Value = serde_json::from_slice(request.body()).unwrap();
        assert_eq!(body["operationName"], "Hero");
        assert!(body["query"].is_string());
        assert!(body.get("extensions").is_none());
    }

    #[test]
    fn test_get_for_queries() {
        let config = PipelineConfig {
            use_get_for_queries: true,
            ..Default::default()
        };
        let fetch = interceptor(MockTransport::new(), config);
        let request = fetch.build_request(&RequestContext::new(hero_query())).unwrap();

        assert_eq!(request.method(), http::Method::GET);
        assert!(request.headers().get(CONTENT_TYPE).is_none());
        assert!(request.body().is_empty());
        let params = query_params(&request);
        assert_eq!(params["operationName"], "Hero");
        assert!(params.contains_key("query"));
    }

    #[test]
    fn test_mutations_always_post() {
        let config = PipelineConfig {
            use_get_for_queries: true,
            ..Default::default()
        };
        let fetch = interceptor(MockTransport::new(), config);
        let op = Operation::mutation("AddHero", "mutation AddHero { addHero { name } }");
        let request = fetch.build_request(&RequestContext::new(op)).unwrap();
        assert_eq!(request.method(), http::Method::POST);
    }

    #[test]
    fn test_auto_persist_sends_hash_only() {
        let config = PipelineConfig {
            auto_persist_queries: true,
            use_get_for_persisted_query_retry: true,
            ..Default::default()
        };
        let fetch = interceptor(MockTransport::new(), config);

        let first = fetch.build_request(&RequestContext::new(hero_query())).unwrap();
        assert_eq!(first.method(), http::Method::GET);
        let params = query_params(&first);
        assert!(!params.contains_key("query"));
        assert!(params["extensions"].contains(hero_query().document_hash()));

        let mut retry = RequestContext::new(hero_query());
        retry.mark_persisted_query_retry();
        let second = fetch.build_request(&retry).unwrap();
        assert_eq!(second.method(), http::Method::GET);
        assert!(query_params(&second).contains_key("query"));
    }

    #[test]
    fn test_persisted_query_retry_uses_post_without_get_flag() {
        let config = PipelineConfig {
            auto_persist_queries: true,
            use_get_for_queries: true,
            ..Default::default()
        };
        let fetch = interceptor(MockTransport::new(), config);
        let mut retry = RequestContext::new(hero_query());
        retry.mark_persisted_query_retry();

        let request = fetch.build_request(&retry).unwrap();
        assert_eq!(request.method(), http::Method::POST);
        let body: serde_json::Value = serde_json::from_slice(request.body()).unwrap();
        assert!(body["query"].is_string());
        assert!(body["extensions"]["persistedQuery"].is_object());
    }

    #[test]
    fn test_header_precedence() {
        let mut config = PipelineConfig {
            client_name: Some("ios".into()),
            client_version: Some("1.2.3".into()),
            ..Default::default()
        };
        config
            .additional_headers
            .insert("x-shared", HeaderValue::from_static("config"));
        config
            .additional_headers
            .insert("x-config-only", HeaderValue::from_static("yes"));
        let fetch = interceptor(MockTransport::new(), config);

        let mut context = RequestContext::new(hero_query());
        context
            .headers
            .insert("x-shared", HeaderValue::from_static("request"));
        context
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let request = fetch.build_request(&context).unwrap();

        let headers = request.headers();
        assert_eq!(headers["x-shared"], "request");
        assert_eq!(headers["x-config-only"], "yes");
        assert_eq!(headers[CONTENT_TYPE], APPLICATION_JSON);
        assert_eq!(headers["apollographql-client-name"], "ios");
        assert_eq!(headers["apollographql-client-version"], "1.2.3");
    }

    #[test]
    fn test_endpoint_query_is_preserved() {
        let config = PipelineConfig {
            use_get_for_queries: true,
            ..Default::default()
        };
        let fetch = NetworkFetchInterceptor::new(
            MockTransport::new(),
            "http://localhost/graphql?tenant=a".parse().unwrap(),
            Arc::new(config),
        );
        let request = fetch.build_request(&RequestContext::new(hero_query())).unwrap();
        let query = request.uri().query().unwrap();
        assert!(query.starts_with("tenant=a&"));
    }

    #[tokio::test]
    async fn test_proceeds_with_response() {
        let transport = MockTransport::new();
        transport.push_json(200, r#"{"data":{"hero":{"name":"Luke"}}}"#);
        let fetch = interceptor(transport.clone(), PipelineConfig::new());
        let inspect = crate::interceptor::FnInterceptor::new("inspect", |chain, _request, response| {
            Box::pin(async move {
                let response: ResponseContext = response.unwrap();
                assert_eq!(response.status, http::StatusCode::OK);
                assert!(response.body.starts_with(b"{\"data\""));
                chain.finish(crate::result::GraphQLResult::from_cache(serde_json::json!({})));
            })
        });
        let chain = InterceptorChain::new(vec![Box::new(fetch), Box::new(inspect)], None);
        let response = chain.kickoff(RequestContext::new(hero_query())).unwrap();

        assert!(response.final_result().await.is_ok());
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, http::Method::POST);
        assert_eq!(requests[0].uri, "http://localhost:4000/graphql");
        assert_eq!(requests[0].headers["x-apollo-operation-name"], "Hero");
        assert!(!requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_fails_chain() {
        let transport = MockTransport::new();
        transport.push_error(PipelineError::transport("connection refused"));
        let chain = InterceptorChain::new(
            vec![Box::new(interceptor(transport, PipelineConfig::new()))],
            None,
        );
        let response = chain.kickoff(RequestContext::new(hero_query())).unwrap();
        assert_eq!(
            response.final_result().await,
            Err(PipelineError::Transport("connection refused".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transport_error() {
        let transport = MockTransport::new();
        transport.set_delay(Duration::from_secs(30));
        transport.push_json(200, r#"{"data":{}}"#);
        let config = PipelineConfig {
            timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        let chain = InterceptorChain::new(vec![Box::new(interceptor(transport, config))], None);
        let response = chain.kickoff(RequestContext::new(hero_query())).unwrap();

        let result = response.final_result().await;
        assert!(matches!(result, Err(PipelineError::Transport(message)) if message.contains("timed out")));
    }

    #[tokio::test]
    async fn test_persisted_only_operation_sends_hash_without_apq() {
        let transport = MockTransport::new();
        transport.push_json(200, r#"{"data":{"hero":{"name":"Luke"}}}"#);
        let op = Operation::persisted(OperationKind::Query, "Hero", "abc123");
        let chain = InterceptorChain::new(
            vec![Box::new(interceptor(transport.clone(), PipelineConfig::new()))],
            None,
        );
        let response = chain.kickoff(RequestContext::new(op)).unwrap();
        assert_eq!(
            response.final_result().await,
            Err(PipelineError::ChainExhaustedWithoutResult)
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, http::Method::POST);
        assert_eq!(requests[0].uri.path(), "/graphql");
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("query").is_none());
        assert_eq!(body["extensions"]["persistedQuery"]["sha256Hash"], "abc123");
    }
}
