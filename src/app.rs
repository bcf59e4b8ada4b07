use std::path::PathBuf;
use std::sync::Arc;

use chatbox_core::{
    ChatBackend, ChatSession, ChatView, Config, Protocol, SendOutcome, Sender, Settings, Transcript,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::reply::{self, ViewUpdate};
use crate::tui::AppEvent;
use crate::ui;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub settings: Settings,
    pub session: ChatSession,
    pub transcript: Transcript,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat scroll state
    pub scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // In-flight exchange
    pub reply_task: Option<JoinHandle<()>>,
    reply_cancel: Option<CancellationToken>,
    shutdown: CancellationToken,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // One-line notice shown in the footer
    pub status: Option<String>,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub input_area: Option<Rect>,
    pub send_area: Option<Rect>,

    events: UnboundedSender<AppEvent>,
    config_path: PathBuf,
}

impl App {
    pub fn new(
        settings: Settings,
        backend: Arc<dyn ChatBackend>,
        events: UnboundedSender<AppEvent>,
        config_path: PathBuf,
    ) -> Self {
        let session = ChatSession::new(backend, settings.protocol);

        Self {
            should_quit: false,
            settings,
            session,
            transcript: Transcript::new(),

            input: String::new(),
            cursor: 0,

            scroll: 0,
            chat_height: 0,
            chat_width: 0,

            reply_task: None,
            reply_cancel: None,
            shutdown: CancellationToken::new(),

            animation_frame: 0,
            status: None,

            chat_area: None,
            input_area: None,
            send_area: None,

            events,
            config_path,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_loading()
    }

    pub fn protocol(&self) -> Protocol {
        self.session.protocol()
    }

    /// Where replies come from, for the header
    pub fn endpoint(&self) -> String {
        if let Some(path) = &self.settings.pokedex {
            return format!("local {}", path.display());
        }
        match self.protocol() {
            Protocol::Json => self.settings.ask_url.clone(),
            Protocol::Stream => self.settings.stream_url.clone(),
        }
    }

    /// Send the current input. Silently does nothing for blank input or
    /// while a reply is outstanding.
    pub fn send_message(&mut self) {
        let Some(exchange) = self.session.submit(&mut self.input, &mut self.transcript) else {
            return;
        };

        self.cursor = 0;
        self.status = None;
        self.animation_frame = 0;
        self.scroll_to_bottom();

        let cancel = self.shutdown.child_token();
        self.reply_cancel = Some(cancel.clone());
        self.reply_task = Some(reply::spawn_exchange(exchange, self.events.clone(), cancel));
    }

    pub fn cancel_reply(&mut self) {
        if let Some(cancel) = &self.reply_cancel {
            tracing::info!("cancelling in-flight reply");
            cancel.cancel();
        }
    }

    pub fn apply_reply(&mut self, update: ViewUpdate) {
        update.apply(&mut self.transcript);
        if self.transcript.follows_bottom() {
            self.scroll_to_bottom();
        }
    }

    pub fn finish_reply(&mut self, outcome: SendOutcome) {
        self.session.complete(outcome);
        self.reply_task = None;
        self.reply_cancel = None;
        if outcome == SendOutcome::Cancelled {
            self.status = Some("Reply cancelled".to_string());
        }
    }

    /// Switch between the JSON and streaming backends and remember the choice
    pub fn toggle_protocol(&mut self) {
        let next = self.protocol().next();
        if !self.session.set_protocol(next) {
            self.status = Some("Wait for the current reply before switching".to_string());
            return;
        }

        self.settings.protocol = next;
        self.status = match Config::save_default_protocol(&self.config_path, next) {
            Ok(()) => Some(format!("Protocol: {}", next.display_name())),
            Err(e) => {
                tracing::warn!(error = %e, "could not save protocol to config");
                Some(format!("Protocol: {} (not saved)", next.display_name()))
            }
        };
    }

    pub fn quit(&mut self) {
        self.shutdown.cancel();
        self.should_quit = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// True while the newest bot bubble has nothing to show yet
    pub fn awaiting_text(&self) -> bool {
        self.is_loading()
            && self
                .transcript
                .last()
                .map(|m| m.sender == Sender::User || m.text.is_empty())
                .unwrap_or(true)
    }

    /// A loading reply that has no bubble yet gets a placeholder row
    pub fn pending_bot_row(&self) -> bool {
        self.is_loading()
            && self
                .transcript
                .last()
                .map(|m| m.sender == Sender::User)
                .unwrap_or(false)
    }

    /// Rows the transcript occupies once wrapped to the chat pane width
    pub fn chat_line_count(&self) -> u16 {
        // Fall back to 50 columns until the first render reports the real width
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };
        let rows = ui::wrapped_rows(ui::chat_text(self), wrap_width);
        u16::try_from(rows).unwrap_or(u16::MAX)
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_line_count().saturating_sub(self.visible_height())
    }

    /// Pin the chat to its newest line
    pub fn scroll_to_bottom(&mut self) {
        self.transcript.scroll_to_bottom();
        self.scroll = self.max_scroll();
    }

    /// Re-apply the bottom pin after a resize or new content
    pub fn sync_scroll(&mut self) {
        if self.transcript.follows_bottom() {
            self.scroll = self.max_scroll();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        if lines == 0 {
            return;
        }
        self.transcript.unpin();
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max_scroll);
        if self.scroll >= max_scroll {
            self.transcript.scroll_to_bottom();
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }
}
