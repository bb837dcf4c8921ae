//! Interceptor chain.
//!
//! Interceptors wrap the rest of the dispatch chain. The chain is folded
//! from the transport outwards over `global ++ per_call`, so the interceptor
//! listed **last** is the outermost one:
//!
//! ```text
//! global = [G1, G2], per_call = [P]
//!
//! P -> G2 -> G1 -> transport -> G1 -> G2 -> P
//! ```
//!
//! Per-call interceptors therefore see the request before any global one
//! and see the response after all global ones.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use crate::transport::Transport;

/// Middleware around the dispatch chain.
///
/// An interceptor may forward the request unchanged, replace it before
/// calling `next`, answer without calling `next` at all, or post-process
/// the response `next` returns. Any closure
/// `Fn(Request, Next) -> impl Future<Output = Result<Response>>` is an
/// interceptor.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, request: Request, next: Next) -> Result<Response>;
}

#[async_trait]
impl<F, Fut> Interceptor for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn intercept(&self, request: Request, next: Next) -> Result<Response> {
        (self)(request, next).await
    }
}

/// The remainder of the chain below an interceptor.
///
/// `Next` is transport-shaped and cheap to clone, so an interceptor can
/// call it more than once (for example to resubmit a request).
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn Interceptor>]>,
    remaining: usize,
    transport: Arc<dyn Transport>,
}

impl Next {
    /// Run the rest of the chain with `request`.
    pub async fn run(self, request: Request) -> Result<Response> {
        match self.remaining.checked_sub(1) {
            None => self.transport.fetch(request).await,
            Some(index) => {
                let interceptor = Arc::clone(&self.chain[index]);
                let next = Next {
                    chain: Arc::clone(&self.chain),
                    remaining: index,
                    transport: Arc::clone(&self.transport),
                };
                interceptor.intercept(request, next).await
            }
        }
    }

    /// Interceptors still ahead of the transport.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for Next {
    async fn fetch(&self, request: Request) -> Result<Response> {
        self.clone().run(request).await
    }
}

/// Global and per-call interceptors composed around a transport.
#[derive(Clone)]
pub struct InterceptorChain {
    entry: Next,
}

impl InterceptorChain {
    /// Compose `global ++ per_call` around `transport`.
    pub fn new(
        global: &[Arc<dyn Interceptor>],
        per_call: &[Arc<dyn Interceptor>],
        transport: Arc<dyn Transport>,
    ) -> Self {
        let chain: Arc<[Arc<dyn Interceptor>]> = global.iter().chain(per_call).cloned().collect();
        let remaining = chain.len();
        Self {
            entry: Next {
                chain,
                remaining,
                transport,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.entry.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.entry.remaining == 0
    }

    /// Send `request` through every interceptor and the transport.
    pub async fn execute(self, request: Request) -> Result<Response> {
        self.entry.run(request).await
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.len())
            .finish()
    }
}
