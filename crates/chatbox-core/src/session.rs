//! Input guard and request/response cycle for one chat widget.
//!
//! A [`ChatSession`] owns the loading flag, so independent widgets never share
//! state. `submit` validates input and opens an [`Exchange`]; the exchange
//! talks to the backend and renders the reply into a [`ChatView`].

use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::backend::ChatBackend;
use crate::decode::Utf8StreamDecoder;
use crate::error::ChatError;
use crate::protocol::Protocol;
use crate::state::Message;
use crate::view::ChatView;

/// The only failure text a user ever sees
pub const FALLBACK_REPLY: &str = "Something went wrong!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input or a request already in flight; nothing happened
    Ignored,
    Replied,
    /// The fallback reply was rendered
    Failed,
    /// The stream broke after some text arrived; the partial text was kept
    Truncated,
    Cancelled,
}

pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    protocol: Protocol,
    loading: bool,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, protocol: Protocol) -> Self {
        Self {
            backend,
            protocol,
            loading: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Switch integration contract. Refused while a request is in flight.
    pub fn set_protocol(&mut self, protocol: Protocol) -> bool {
        if self.loading {
            return false;
        }
        self.protocol = protocol;
        true
    }

    /// Validate `input` and start one exchange.
    ///
    /// Returns `None` without touching anything when the trimmed input is
    /// empty or a request is outstanding. Otherwise the user message is
    /// appended, `input` is cleared and the session stays loading until
    /// [`ChatSession::complete`] is called.
    pub fn submit<V: ChatView + ?Sized>(
        &mut self,
        input: &mut String,
        view: &mut V,
    ) -> Option<Exchange> {
        let text = input.trim();
        if text.is_empty() || self.loading {
            return None;
        }
        let text = text.to_string();

        view.append_message(Message::user(text.clone()));
        view.scroll_to_bottom();
        input.clear();
        self.loading = true;

        tracing::info!(
            protocol = self.protocol.as_str(),
            chars = text.chars().count(),
            "sending message"
        );

        Some(Exchange {
            backend: Arc::clone(&self.backend),
            protocol: self.protocol,
            text,
        })
    }

    /// Release the loading flag at the end of an exchange started by `submit`.
    pub fn complete(&mut self, outcome: SendOutcome) {
        tracing::debug!(?outcome, "exchange finished");
        self.loading = false;
    }

    /// Run a whole cycle in place: submit, render the reply, release the flag.
    /// The flag is released even if this future is dropped before it finishes.
    pub async fn send<V: ChatView + ?Sized>(
        &mut self,
        input: &mut String,
        view: &mut V,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        let Some(exchange) = self.submit(input, view) else {
            return SendOutcome::Ignored;
        };

        let _guard = LoadingGuard {
            loading: &mut self.loading,
        };
        exchange.run(view, cancel).await
    }
}

struct LoadingGuard<'a> {
    loading: &'a mut bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        *self.loading = false;
    }
}

/// One request/response cycle, created by [`ChatSession::submit`].
pub struct Exchange {
    backend: Arc<dyn ChatBackend>,
    protocol: Protocol,
    text: String,
}

impl Exchange {
    pub async fn run<V: ChatView + ?Sized>(
        self,
        view: &mut V,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        match self.protocol {
            Protocol::Json => self.run_whole_body(view, cancel).await,
            Protocol::Stream => self.run_streaming(view, cancel).await,
        }
    }

    async fn run_whole_body<V: ChatView + ?Sized>(
        &self,
        view: &mut V,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        match cancellable(cancel, self.backend.ask(&self.text)).await {
            Ok(reply) => {
                view.append_message(Message::bot(reply));
                view.scroll_to_bottom();
                SendOutcome::Replied
            }
            Err(ChatError::Cancelled) => {
                tracing::info!("request cancelled");
                SendOutcome::Cancelled
            }
            Err(e) => {
                tracing::error!(error = %e, "whole-body request failed");
                view.append_message(Message::bot(FALLBACK_REPLY));
                view.scroll_to_bottom();
                SendOutcome::Failed
            }
        }
    }

    async fn run_streaming<V: ChatView + ?Sized>(
        &self,
        view: &mut V,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        let mut stream = match cancellable(cancel, self.backend.open_stream(&self.text)).await {
            Ok(stream) => stream,
            Err(ChatError::Cancelled) => {
                tracing::info!("request cancelled");
                return SendOutcome::Cancelled;
            }
            Err(e) => {
                tracing::error!(error = %e, "could not open reply stream");
                view.append_message(Message::bot(FALLBACK_REPLY));
                view.scroll_to_bottom();
                return SendOutcome::Failed;
            }
        };

        view.append_message(Message::bot(String::new()));
        view.scroll_to_bottom();

        let mut decoder = Utf8StreamDecoder::new();
        let mut has_text = false;
        let mut chunks = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(chunks, "reply stream cancelled");
                    // A cancelled reply leaves no bot message behind
                    view.discard_last_if_empty();
                    return SendOutcome::Cancelled;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    chunks += 1;
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        view.append_to_last(&text);
                        has_text = true;
                    }
                    view.scroll_to_bottom();
                }
                Some(Err(e)) if has_text => {
                    tracing::warn!(error = %e, chunks, "reply stream broke; keeping partial text");
                    return SendOutcome::Truncated;
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "reply stream failed before any text");
                    view.append_to_last(FALLBACK_REPLY);
                    view.scroll_to_bottom();
                    return SendOutcome::Failed;
                }
                None => break,
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            view.append_to_last(&tail);
            view.scroll_to_bottom();
        }

        tracing::debug!(chunks, "reply stream complete");
        SendOutcome::Replied
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T, ChatError>>,
) -> Result<T, ChatError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChatError::Cancelled),
        result = operation => result,
    }
}
