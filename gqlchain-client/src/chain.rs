//! The per-execution interceptor chain.
//!
//! An [`InterceptorChain`] owns the ordered interceptors built for one
//! operation execution and drives them strictly one at a time. Each
//! interceptor receives an [`Activation`], the continuation through which it
//! controls the chain:
//!
//! - [`Activation::proceed`] runs the next interceptor (or completes the chain)
//! - [`Activation::retry`] restarts from the first interceptor with the attempt
//!   counter incremented
//! - [`Activation::return_value`] / [`Activation::handle_error`] emit to the
//!   caller without changing the chain's position
//! - [`Activation::finish`] / [`Activation::fail`] emit a final delivery and
//!   end the chain
//!
//! `proceed` and `retry` consume the activation, so at most one of them can
//! be called per activation. Emissions reach the caller through the
//! [`ChainResponse`] stream returned by [`InterceptorChain::kickoff`], in the
//! order the interceptors produce them.
//!
//! # State machine
//!
//! ```text
//! Ready --kickoff--> Running --proceed past last--> Completed
//!                       |  \--finish/fail/halt----> Halted
//!                       \------cancel-------------> Cancelled
//! ```
//!
//! An activation that is dropped after emitting, without proceeding or
//! retrying, halts the chain. One that is dropped without touching any
//! control primitive leaves the chain stalled in `Running`: the stream stays
//! pending and the defect is logged.
//!
//! # Example
//!
//! ```ignore
//! use gqlchain_client::{FnInterceptor, InterceptorChain, RequestContext};
//! use futures::StreamExt;
//!
//! let stage = FnInterceptor::new("answer", |chain, request, _response| {
//!     Box::pin(async move {
//!         chain.finish(GraphQLResult::from_cache(serde_json::json!({"answer": 42})));
//!     })
//! });
//! let chain = InterceptorChain::new(vec![Box::new(stage)], None);
//! let mut deliveries = chain.kickoff(RequestContext::new(op))?;
//! let delivery = deliveries.next().await;
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::{Notify, mpsc, oneshot};
use tracing::Instrument;

use crate::context::{RequestContext, ResponseContext};
use crate::interceptor::{ErrorInterceptor, Interceptor};
use crate::result::{Delivery, GraphQLResult};
use crate::PipelineError;

/// Lifecycle state of an [`InterceptorChain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainState {
    /// Built, not started.
    Ready,
    /// An interceptor is active.
    Running,
    /// The last interceptor proceeded.
    Completed,
    /// An interceptor ended the chain early.
    Halted,
    /// The caller cancelled the chain.
    Cancelled,
}

impl ChainState {
    /// Returns `true` for states the chain can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChainState::Completed | ChainState::Halted | ChainState::Cancelled
        )
    }
}

#[derive(Debug)]
struct Status {
    state: ChainState,
    cursor: usize,
    stalled: bool,
}

struct ChainShared {
    interceptors: Vec<Box<dyn Interceptor>>,
    error_interceptor: Option<Arc<dyn ErrorInterceptor>>,
    status: Mutex<Status>,
    cancelled: AtomicBool,
    cancel_notify: Notify,
    deliveries: Mutex<Option<mpsc::UnboundedSender<Delivery>>>,
}

impl ChainShared {
    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn deliver(&self, delivery: Delivery) {
        let mut sender = self.deliveries.lock().unwrap_or_else(PoisonError::into_inner);
        let is_final = delivery.is_final();
        if let Some(tx) = sender.as_ref() {
            let _ = tx.send(delivery);
        }
        if is_final {
            sender.take();
        }
    }

    fn close(&self) {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn emit_error(
        &self,
        request: &RequestContext,
        response: Option<&ResponseContext>,
        error: PipelineError,
        chain_active: bool,
    ) {
        if error.is_structural() {
            tracing::error!(
                operation = request.operation.name(),
                error = %error,
                "interceptor chain defect"
            );
        }
        if let Some(observer) = &self.error_interceptor {
            observer.intercept_error(&error, request, response);
        }
        self.deliver(Delivery {
            result: Err(error),
            chain_active,
        });
    }

    /// Move a running chain to `Halted` and close the stream.
    fn halt(&self) {
        {
            let mut status = self.status();
            if status.state != ChainState::Running {
                return;
            }
            status.state = ChainState::Halted;
        }
        self.close();
    }
}

/// Handle to one execution's chain of interceptors.
///
/// Cloning yields another handle to the same chain.
#[derive(Clone)]
pub struct InterceptorChain {
    shared: Arc<ChainShared>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.shared.status();
        f.debug_struct("InterceptorChain")
            .field("count", &self.shared.interceptors.len())
            .field("state", &status.state)
            .field("cursor", &status.cursor)
            .finish()
    }
}

impl InterceptorChain {
    /// Create a chain in the `Ready` state.
    pub fn new(
        interceptors: Vec<Box<dyn Interceptor>>,
        error_interceptor: Option<Arc<dyn ErrorInterceptor>>,
    ) -> Self {
        Self {
            shared: Arc::new(ChainShared {
                interceptors,
                error_interceptor,
                status: Mutex::new(Status {
                    state: ChainState::Ready,
                    cursor: 0,
                    stalled: false,
                }),
                cancelled: AtomicBool::new(false),
                cancel_notify: Notify::new(),
                deliveries: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ChainState {
        self.shared.status().state
    }

    /// Index of the interceptor currently active.
    pub fn cursor(&self) -> usize {
        self.shared.status().cursor
    }

    pub fn len(&self) -> usize {
        self.shared.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.interceptors.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Returns `true` if an interceptor ended without calling any control
    /// primitive, leaving the chain unable to progress.
    pub fn is_stalled(&self) -> bool {
        self.shared.status().stalled
    }

    /// Identifiers of the interceptors, in execution order.
    pub fn interceptor_ids(&self) -> Vec<&str> {
        self.shared.interceptors.iter().map(|i| i.id()).collect()
    }

    /// Start the chain.
    ///
    /// Valid only once, from `Ready`. The chain is driven on a spawned Tokio
    /// task, so this must be called from within a Tokio runtime. An empty
    /// chain completes immediately with
    /// [`PipelineError::ChainExhaustedWithoutResult`].
    pub fn kickoff(&self, request: RequestContext) -> Result<ChainResponse, PipelineError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let empty = {
            let mut status = self.shared.status();
            if status.state != ChainState::Ready {
                let err = PipelineError::invalid_state(format!(
                    "kickoff called on a chain in state {:?}",
                    status.state
                ));
                tracing::error!(operation = request.operation.name(), error = %err);
                return Err(err);
            }
            *self
                .shared
                .deliveries
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(tx);
            status.cursor = 0;
            if self.shared.interceptors.is_empty() {
                status.state = ChainState::Completed;
                true
            } else {
                status.state = ChainState::Running;
                false
            }
        };

        let response = ChainResponse {
            receiver: rx,
            chain: self.clone(),
        };

        if empty {
            self.shared.emit_error(
                &request,
                None,
                PipelineError::ChainExhaustedWithoutResult,
                false,
            );
            return Ok(response);
        }

        let span = tracing::info_span!(
            "graphql.operation",
            graphql.operation.name = request.operation.name(),
            graphql.operation.kind = request.operation.kind().as_str(),
            otel.kind = "client",
        );
        tokio::spawn(drive(self.shared.clone(), request).instrument(span));

        Ok(response)
    }

    /// Cancel the chain.
    ///
    /// Idempotent, and a no-op once the chain has reached a terminal state.
    /// The delivery stream closes immediately; interceptors still running
    /// observe the flag through [`Activation::is_cancelled`] and
    /// [`Activation::cancelled`].
    pub fn cancel(&self) {
        {
            let mut status = self.shared.status();
            if status.state.is_terminal() {
                return;
            }
            status.state = ChainState::Cancelled;
        }
        self.shared.cancelled.store(true, Ordering::Release);
        self.shared.cancel_notify.notify_waiters();
        self.shared.close();
        tracing::debug!("interceptor chain cancelled");
    }
}

enum Advance {
    Next {
        request: RequestContext,
        response: Option<ResponseContext>,
    },
    Stop,
    Stall,
}

async fn drive(shared: Arc<ChainShared>, request: RequestContext) {
    let mut pending = Some((request, None));
    while let Some((request, response)) = pending.take() {
        if shared.is_cancelled() {
            return;
        }
        let index = shared.status().cursor;
        let Some(interceptor) = shared.interceptors.get(index) else {
            return;
        };

        let (tx, rx) = oneshot::channel();
        let activation = Activation {
            shared: shared.clone(),
            index,
            advance: Some(tx),
            emitted: AtomicBool::new(false),
        };
        tracing::trace!(
            interceptor = interceptor.id(),
            index,
            attempt = request.attempt(),
            "invoking interceptor"
        );

        let ((), advance) = futures::join!(interceptor.intercept(activation, request, response), rx);
        match advance {
            Ok(Advance::Next { request, response }) => pending = Some((request, response)),
            Ok(Advance::Stop) | Err(_) => return,
            Ok(Advance::Stall) => {
                shared.status().stalled = true;
                tracing::error!(
                    interceptor = interceptor.id(),
                    index,
                    "interceptor returned without calling a control primitive; chain stalled"
                );
                return;
            }
        }
    }
}

/// The continuation handed to one interceptor invocation.
///
/// Emissions ([`return_value`](Self::return_value),
/// [`handle_error`](Self::handle_error)) may be called any number of times.
/// Advancing ([`proceed`](Self::proceed), [`retry`](Self::retry)) consumes
/// the activation. Every primitive is a no-op once the chain is cancelled.
pub struct Activation {
    shared: Arc<ChainShared>,
    index: usize,
    advance: Option<oneshot::Sender<Advance>>,
    emitted: AtomicBool,
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("index", &self.index)
            .field("cancelled", &self.shared.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Activation {
    /// Position of the interceptor this activation belongs to.
    pub fn index(&self) -> usize {
        self.index
    }

    /// A handle to the owning chain.
    pub fn chain(&self) -> InterceptorChain {
        InterceptorChain {
            shared: self.shared.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Resolves once the chain is cancelled.
    pub async fn cancelled(&self) {
        let notified = self.shared.cancel_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.shared.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Run the next interceptor with `request` and `response`.
    ///
    /// Past the last interceptor the chain completes: the parsed result in
    /// `response` is delivered as the final value, or
    /// [`PipelineError::ChainExhaustedWithoutResult`] if there is none.
    pub fn proceed(mut self, request: RequestContext, response: Option<ResponseContext>) {
        let Some(advance) = self.advance.take() else {
            return;
        };
        if self.shared.is_cancelled() {
            let _ = advance.send(Advance::Stop);
            return;
        }

        let completed = {
            let mut status = self.shared.status();
            if status.state != ChainState::Running || status.cursor != self.index {
                let state = status.state;
                drop(status);
                self.reject_stale(&request, "proceed", state);
                let _ = advance.send(Advance::Stop);
                return;
            }
            status.cursor += 1;
            if status.cursor == self.shared.interceptors.len() {
                status.state = ChainState::Completed;
                true
            } else {
                false
            }
        };

        if !completed {
            let _ = advance.send(Advance::Next { request, response });
            return;
        }

        tracing::debug!(
            operation = request.operation.name(),
            attempt = request.attempt(),
            "interceptor chain completed"
        );
        match response.and_then(ResponseContext::into_parsed) {
            Some(result) => self.shared.deliver(Delivery {
                result: Ok(result),
                chain_active: false,
            }),
            None => self.shared.emit_error(
                &request,
                None,
                PipelineError::ChainExhaustedWithoutResult,
                false,
            ),
        }
        self.shared.close();
        let _ = advance.send(Advance::Stop);
    }

    /// Restart the chain from the first interceptor.
    ///
    /// The attempt counter of `request` is incremented and the response slot
    /// is reset. No limit is enforced here; place a
    /// [`MaxRetryInterceptor`](crate::MaxRetryInterceptor) early in the chain.
    pub fn retry(mut self, request: RequestContext) {
        let Some(advance) = self.advance.take() else {
            return;
        };
        if self.shared.is_cancelled() {
            let _ = advance.send(Advance::Stop);
            return;
        }

        {
            let mut status = self.shared.status();
            if status.state != ChainState::Running || status.cursor != self.index {
                let state = status.state;
                drop(status);
                self.reject_stale(&request, "retry", state);
                let _ = advance.send(Advance::Stop);
                return;
            }
            status.cursor = 0;
        }

        let request = request.next_attempt();
        tracing::debug!(
            operation = request.operation.name(),
            attempt = request.attempt(),
            from = self.index,
            "retrying interceptor chain"
        );
        let _ = advance.send(Advance::Next {
            request,
            response: None,
        });
    }

    /// Deliver an intermediate result. The chain keeps running.
    pub fn return_value(&self, result: GraphQLResult) {
        if self.shared.is_cancelled() {
            return;
        }
        self.emitted.store(true, Ordering::Release);
        self.shared.deliver(Delivery {
            result: Ok(result),
            chain_active: true,
        });
    }

    /// Deliver an error. The chain keeps running.
    ///
    /// The configured error interceptor observes the error first.
    pub fn handle_error(
        &self,
        request: &RequestContext,
        response: Option<&ResponseContext>,
        error: PipelineError,
    ) {
        if self.shared.is_cancelled() {
            return;
        }
        self.emitted.store(true, Ordering::Release);
        self.shared.emit_error(request, response, error, true);
    }

    /// Deliver a final result and end the chain.
    pub fn finish(mut self, result: GraphQLResult) {
        if self.shared.is_cancelled() {
            return;
        }
        self.emitted.store(true, Ordering::Release);
        self.shared.deliver(Delivery {
            result: Ok(result),
            chain_active: false,
        });
        self.stop();
    }

    /// Deliver a final error and end the chain.
    ///
    /// The configured error interceptor observes the error first.
    pub fn fail(
        mut self,
        request: &RequestContext,
        response: Option<&ResponseContext>,
        error: PipelineError,
    ) {
        if self.shared.is_cancelled() {
            return;
        }
        self.emitted.store(true, Ordering::Release);
        self.shared.emit_error(request, response, error, false);
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.halt();
        if let Some(advance) = self.advance.take() {
            let _ = advance.send(Advance::Stop);
        }
    }

    fn reject_stale(&self, request: &RequestContext, primitive: &str, state: ChainState) {
        let err = PipelineError::invalid_state(format!(
            "{} from interceptor {} in state {:?}",
            primitive, self.index, state
        ));
        if !state.is_terminal() {
            self.shared.emit_error(request, None, err, false);
            self.shared.halt();
        }
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        let Some(advance) = self.advance.take() else {
            return;
        };
        if self.shared.is_cancelled() {
            let _ = advance.send(Advance::Stop);
        } else if self.emitted.load(Ordering::Acquire) {
            tracing::debug!(index = self.index, "interceptor ended the chain after emitting");
            self.shared.halt();
            let _ = advance.send(Advance::Stop);
        } else {
            let _ = advance.send(Advance::Stall);
        }
    }
}

/// Stream of deliveries from one chain execution.
///
/// The stream ends after the final delivery, when the chain halts, or when
/// it is cancelled. Dropping it cancels the chain.
pub struct ChainResponse {
    receiver: mpsc::UnboundedReceiver<Delivery>,
    chain: InterceptorChain,
}

impl fmt::Debug for ChainResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainResponse")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl ChainResponse {
    /// The chain producing this stream.
    pub fn interceptor_chain(&self) -> &InterceptorChain {
        &self.chain
    }

    /// Cancel the chain. No further deliveries are produced.
    pub fn cancel(&self) {
        self.chain.cancel();
    }

    /// Wait for the final delivery, skipping intermediate ones.
    ///
    /// If the stream ends without a final delivery, the last intermediate
    /// delivery is returned instead.
    pub async fn final_result(mut self) -> Result<GraphQLResult, PipelineError> {
        let mut last = None;
        while let Some(delivery) = self.next().await {
            if delivery.is_final() {
                return delivery.result;
            }
            last = Some(delivery.result);
        }
        last.unwrap_or_else(|| {
            Err(PipelineError::invalid_state(format!(
                "chain ended in state {:?} without delivering a result",
                self.chain.state()
            )))
        })
    }
}

impl Stream for ChainResponse {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.chain.is_cancelled() {
            self.receiver.close();
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ChainResponse {
    fn drop(&mut self) {
        self.chain.cancel();
    }
}
