use std::future::Future;

use crate::channel::Channel;

/// Logic run once per opened channel.
///
/// The handler owns the channel until the returned future completes; the
/// channel is finalized only after that.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, channel: Channel) -> impl Future<Output = ()> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(Channel) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, channel: Channel) -> impl Future<Output = ()> + Send {
        (self)(channel)
    }
}
