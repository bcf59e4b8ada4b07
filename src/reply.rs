//! Runs an exchange off the UI task and feeds its bubble mutations back
//! through the event channel, so they are applied in arrival order.

use chatbox_core::{ChatView, Exchange, Message, SendOutcome};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::tui::AppEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    Append(Message),
    Extend(String),
    ScrollToBottom,
    DiscardEmptyLast,
}

impl ViewUpdate {
    pub fn apply<V: ChatView + ?Sized>(self, view: &mut V) {
        match self {
            ViewUpdate::Append(message) => view.append_message(message),
            ViewUpdate::Extend(text) => view.append_to_last(&text),
            ViewUpdate::ScrollToBottom => view.scroll_to_bottom(),
            ViewUpdate::DiscardEmptyLast => view.discard_last_if_empty(),
        }
    }
}

/// A [`ChatView`] that forwards every mutation to the UI loop
pub struct ChannelView {
    tx: UnboundedSender<AppEvent>,
}

impl ChannelView {
    pub fn new(tx: UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    fn post(&self, update: ViewUpdate) {
        // The receiver only goes away when the app is shutting down.
        let _ = self.tx.send(AppEvent::Reply(update));
    }
}

impl ChatView for ChannelView {
    fn append_message(&mut self, message: Message) {
        self.post(ViewUpdate::Append(message));
    }

    fn append_to_last(&mut self, text: &str) {
        self.post(ViewUpdate::Extend(text.to_string()));
    }

    fn scroll_to_bottom(&mut self) {
        self.post(ViewUpdate::ScrollToBottom);
    }

    fn discard_last_if_empty(&mut self) {
        self.post(ViewUpdate::DiscardEmptyLast);
    }
}

/// Posts `ReplyFinished` when dropped, whether the task returned, panicked
/// or was aborted.
struct FinishGuard {
    tx: UnboundedSender<AppEvent>,
    outcome: Option<SendOutcome>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let outcome = self.outcome.unwrap_or(SendOutcome::Cancelled);
        let _ = self.tx.send(AppEvent::ReplyFinished(outcome));
    }
}

pub fn spawn_exchange(
    exchange: Exchange,
    tx: UnboundedSender<AppEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    // Built before spawning so even a task aborted before its first poll reports back.
    let guard = FinishGuard {
        tx: tx.clone(),
        outcome: None,
    };
    tokio::spawn(async move {
        let mut guard = guard;
        let mut view = ChannelView::new(tx);
        let outcome = exchange.run(&mut view, &cancel).await;
        guard.outcome = Some(outcome);
    })
}
