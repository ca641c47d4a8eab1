//! Subscriber bookkeeping. The library never owns a subscriber beyond
//! a weak channel handle plus its filter; delivery is always
//! non-blocking and failures are swallowed (see the concurrency
//! model's backpressure policy).

use crate::filter::Filter;
use crate::message::DeliveredMessage;
use tokio::sync::mpsc;

pub type SubscriberId = u64;

pub struct Subscriber {
    pub id: SubscriberId,
    pub sink: mpsc::WeakSender<DeliveredMessage>,
    pub filter: Filter,
}

impl Subscriber {
    /// Deliver `message` if this subscriber's filter accepts it and
    /// its sink is still reachable and not full. Never blocks; never
    /// errors the caller.
    pub fn try_deliver(&self, message: &DeliveredMessage) {
        let Some(sender) = self.sink.upgrade() else {
            return;
        };
        let _ = sender.try_send(message.clone());
    }
}
