//! Dispatch pipeline: filter, middleware chain and transformer.
//!
//! The pipeline runs once per `emit`, before any listener sees the payload.

use std::sync::Arc;

/// Predicate deciding whether an emit is dispatched at all.
pub type FilterFn<E> = dyn Fn(&str, &E) -> bool + Send + Sync;

/// Payload rewrite applied after the middleware chain.
pub type TransformFn<E> = dyn Fn(&str, E) -> E + Send + Sync;

/// A middleware receives the event name, the payload and the continuation.
///
/// Dropping `next` without calling [`Next::run`] halts the dispatch.
pub type MiddlewareFn<E> = dyn for<'a> Fn(&'a str, E, Next<'a, E>) + Send + Sync;

/// Continuation handed to each middleware.
pub struct Next<'a, E> {
    event: &'a str,
    chain: &'a [Arc<MiddlewareFn<E>>],
    sink: &'a mut dyn FnMut(E),
}

impl<'a, E> Next<'a, E> {
    pub(crate) fn new(
        event: &'a str,
        chain: &'a [Arc<MiddlewareFn<E>>],
        sink: &'a mut dyn FnMut(E),
    ) -> Self {
        Self { event, chain, sink }
    }

    /// Name of the event being dispatched.
    pub fn event(&self) -> &str {
        self.event
    }

    /// Hand the (possibly modified) payload to the rest of the chain.
    pub fn run(self, data: E) {
        match self.chain.split_first() {
            Some((middleware, rest)) => middleware(
                self.event,
                data,
                Next {
                    event: self.event,
                    chain: rest,
                    sink: self.sink,
                },
            ),
            None => (self.sink)(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain_reaches_sink() {
        let mut seen = Vec::new();
        let mut sink = |n: u32| seen.push(n);
        Next::new("tick", &[], &mut sink).run(7);
        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn test_chain_runs_in_order_and_can_rewrite() {
        let double: Arc<MiddlewareFn<u32>> = Arc::new(|_, n, next| next.run(n * 2));
        let add_one: Arc<MiddlewareFn<u32>> = Arc::new(|_, n, next| next.run(n + 1));
        let chain = vec![double, add_one];

        let mut seen = Vec::new();
        let mut sink = |n: u32| seen.push(n);
        Next::new("tick", &chain, &mut sink).run(3);
        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn test_middleware_without_next_halts() {
        let halt: Arc<MiddlewareFn<u32>> = Arc::new(|_, _, _next| {});
        let chain = vec![halt];

        let mut seen = Vec::new();
        let mut sink = |n: u32| seen.push(n);
        Next::new("tick", &chain, &mut sink).run(3);
        assert!(seen.is_empty());
    }
}
