use crate::state::Message;

/// Rendering seam between the session and whatever displays the messages.
///
/// The streaming bubble is always the newest one: no other message can be
/// appended while a request is outstanding.
pub trait ChatView {
    fn append_message(&mut self, message: Message);
    fn append_to_last(&mut self, text: &str);
    fn scroll_to_bottom(&mut self);
    /// Drop the newest message if it is still an empty bubble
    fn discard_last_if_empty(&mut self);
}

/// Ordered, in-memory message container.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    follow: bool,
    revision: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            follow: true,
            revision: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether the view should stay pinned to the newest bubble
    pub fn follows_bottom(&self) -> bool {
        self.follow
    }

    /// Stop following the bottom after the user scrolls back manually
    pub fn unpin(&mut self) {
        self.follow = false;
    }

    /// Count of mutations applied so far
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl ChatView for Transcript {
    fn append_message(&mut self, message: Message) {
        self.messages.push(message);
        self.revision += 1;
    }

    fn append_to_last(&mut self, text: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.text.push_str(text);
            self.revision += 1;
        } else {
            tracing::warn!("append_to_last on an empty transcript; dropping {} bytes", text.len());
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.follow = true;
    }

    fn discard_last_if_empty(&mut self) {
        if self.messages.last().is_some_and(|m| m.text.is_empty()) {
            self.messages.pop();
            self.revision += 1;
        }
    }
}
