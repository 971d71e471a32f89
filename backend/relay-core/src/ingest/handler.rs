use models::InboundFrame;

use std::future::Future;

use futures_util::future::BoxFuture;

/// Receives application frames, one at a time and in arrival order.
///
/// The next frame is not read until the returned future completes.
pub trait FrameHandler: Send + Sync + 'static {
    fn on_frame(&self, frame: InboundFrame) -> BoxFuture<'static, ()>;
}

impl<F, Fut> FrameHandler for F
where
    F: Fn(InboundFrame) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn on_frame(&self, frame: InboundFrame) -> BoxFuture<'static, ()> {
        Box::pin(self(frame))
    }
}
