//! Response validation stage.

use crate::PipelineError;
use crate::chain::Activation;
use crate::context::{RequestContext, ResponseContext};
use crate::interceptor::{BoxFuture, Interceptor};

/// Fails the chain with [`PipelineError::HttpStatus`] on a non-2xx status.
///
/// The response body is kept in the error as lossy UTF-8 text, since servers
/// often explain the failure there.
#[derive(Debug, Default)]
pub struct ResponseCodeInterceptor;

impl ResponseCodeInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for ResponseCodeInterceptor {
    fn id(&self) -> &str {
        "response-code"
    }

    fn intercept(
        &self,
        chain: Activation,
        request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let Some(http) = response.as_ref() else {
                let error = PipelineError::invalid_state("response validation ran without a response");
                chain.fail(&request, None, error);
                return;
            };

            if http.status.is_success() {
                chain.proceed(request, response);
                return;
            }

            tracing::debug!(status = %http.status, "unsuccessful response status");
            let error = PipelineError::HttpStatus {
                status: http.status,
                body: String::from_utf8_lossy(&http.body).into_owned(),
            };
            chain.fail(&request, Some(http), error);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptorChain;
    use crate::test_support::{hero_query, http_response, result_stage, value};
    use futures::StreamExt;
    use http::StatusCode;
    use std::sync::{Arc, Mutex};

    fn with_response(response: Option<ResponseContext>) -> Box<dyn Interceptor> {
        let response = Mutex::new(response);
        Box::new(crate::interceptor::FnInterceptor::new(
            "respond",
            move |chain, request, _response| {
                let response = response.lock().unwrap().take();
                Box::pin(async move { chain.proceed(request, response) })
            },
        ))
    }

    #[tokio::test]
    async fn test_success_proceeds() {
        let chain = InterceptorChain::new(
            vec![
                with_response(Some(http_response(200, "{}"))),
                Box::new(ResponseCodeInterceptor::new()),
                result_stage(value()),
            ],
            None,
        );
        let response = chain.kickoff(RequestContext::new(hero_query())).unwrap();
        assert!(response.final_result().await.is_ok());
    }

    #[tokio::test]
    async fn test_server_error_fails_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let chain = InterceptorChain::new(
            vec![
                with_response(Some(http_response(500, "internal"))),
                Box::new(ResponseCodeInterceptor::new()),
                result_stage(value()),
            ],
            Some(Arc::new(
                move |error: &PipelineError, _: &RequestContext, response: Option<&ResponseContext>| {
                    recorder
                        .lock()
                        .unwrap()
                        .push((error.status(), response.map(|r| r.status)));
                },
            )),
        );
        let deliveries: Vec<_> = chain
            .kickoff(RequestContext::new(hero_query()))
            .unwrap()
            .collect()
            .await;

        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].is_final());
        assert_eq!(
            deliveries[0].result,
            Err(PipelineError::HttpStatus {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "internal".into(),
            })
        );
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(
                Some(StatusCode::INTERNAL_SERVER_ERROR),
                Some(StatusCode::INTERNAL_SERVER_ERROR)
            )]
        );
    }

    #[tokio::test]
    async fn test_missing_response_is_invalid_state() {
        let chain = InterceptorChain::new(
            vec![Box::new(ResponseCodeInterceptor::new())],
            None,
        );
        let response = chain.kickoff(RequestContext::new(hero_query())).unwrap();
        assert!(matches!(
            response.final_result().await,
            Err(PipelineError::InvalidState(_))
        ));
    }
}
