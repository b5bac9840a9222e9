use wxgate_core::message::{BatchJob, Message};
use wxgate_core::reply::Reply;

/// Values extracted from a message for the category its rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Params {
    /// Plain events and media messages: everything lives on the message.
    Plain,
    Text {
        content: String,
    },
    /// `click` and `view` menu events.
    EventKey {
        key: String,
    },
    ScanPush {
        scan_result: String,
        scan_type: String,
    },
    ScanWaitMsg {
        scan_result: String,
    },
    BatchJob(BatchJob),
}

/// Business logic bound to a route rule. Returning `None` means "no reply".
pub trait Handler: Send + Sync {
    fn handle(&self, message: &Message, params: &Params) -> Option<Reply>;
}

impl<F> Handler for F
where
    F: Fn(&Message, &Params) -> Option<Reply> + Send + Sync,
{
    fn handle(&self, message: &Message, params: &Params) -> Option<Reply> {
        self(message, params)
    }
}
