//! Response parsing stage.

use gqlchain_core::decode_response;

use crate::PipelineError;
use crate::chain::Activation;
use crate::context::{RequestContext, ResponseContext};
use crate::interceptor::{BoxFuture, Interceptor};
use crate::result::GraphQLResult;

/// Decodes the response body into a [`GraphQLResult`] and attaches it to the
/// response context.
///
/// GraphQL errors in the body are data, not failures: they travel inside
/// the attached result. Only a malformed body fails the chain, with
/// [`PipelineError::Parse`].
#[derive(Debug, Default)]
pub struct JsonParsingInterceptor;

impl JsonParsingInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for JsonParsingInterceptor {
    fn id(&self) -> &str {
        "json-parsing"
    }

    fn intercept(
        &self,
        chain: Activation,
        request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let Some(mut response) = response else {
                let error = PipelineError::invalid_state("response parsing ran without a response");
                chain.fail(&request, None, error);
                return;
            };

            match decode_response(&response.body) {
                Ok(decoded) => {
                    let result = GraphQLResult::from_server(decoded);
                    tracing::trace!(
                        has_data = result.has_data(),
                        errors = result.errors.len(),
                        "response parsed"
                    );
                    response.set_parsed(result);
                    chain.proceed(request, Some(response));
                }
                Err(err) => chain.fail(&request, Some(&response), err.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptorChain;
    use crate::interceptor::FnInterceptor;
    use crate::test_support::{hero_query, http_response};
    use serde_json::json;
    use std::sync::Mutex;

    async fn parse(body: &'static str) -> Result<GraphQLResult, PipelineError> {
        let response = Mutex::new(Some(http_response(200, body)));
        let respond = FnInterceptor::new("respond", move |chain, request, _response| {
            let response = response.lock().unwrap().take();
            Box::pin(async move { chain.proceed(request, response) })
        });
        let finish = FnInterceptor::new("finish", |chain, _request, response| {
            Box::pin(async move {
                let response: ResponseContext = response.unwrap();
                chain.finish(response.parsed().cloned().unwrap())
            })
        });
        let chain = InterceptorChain::new(
            vec![
                Box::new(respond),
                Box::new(JsonParsingInterceptor::new()),
                Box::new(finish),
            ],
            None,
        );
        chain
            .kickoff(RequestContext::new(hero_query()))
            .unwrap()
            .final_result()
            .await
    }

    #[tokio::test]
    async fn test_attaches_parsed_result() {
        let result = parse(r#"{"data":{"hero":{"name":"Luke"}}}"#).await.unwrap();
        assert_eq!(result.data, Some(json!({"hero": {"name": "Luke"}})));
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_graphql_errors_are_data() {
        let result = parse(r#"{"data":null,"errors":[{"message":"boom"}]}"#)
            .await
            .unwrap();
        assert!(!result.has_data());
        assert_eq!(result.errors[0].message, "boom");
    }

    #[tokio::test]
    async fn test_malformed_body_fails() {
        assert!(matches!(parse("<html>").await, Err(PipelineError::Parse(_))));
        assert!(matches!(parse(r#"{"hello":1}"#).await, Err(PipelineError::Parse(_))));
    }
}
