use futures_util::future::BoxFuture;
use std::time::Duration;

pub type DeferredEffect = BoxFuture<'static, ()>;

pub trait DeferredTaskScheduler: Send + Sync {
    /// Runs `effect` once, no earlier than `delay` from now.
    fn schedule(&self, effect: DeferredEffect, delay: Duration);
}
