use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::App;
use crate::tui::AppEvent;
use crate::ui;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(width, height) => {
            tracing::debug!(width, height, "terminal resized");
            app.sync_scroll();
        }
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Reply(update) => app.apply_reply(update),
        AppEvent::ReplyFinished(outcome) => app.finish_reply(outcome),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') if ctrl => app.quit(),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => insert_char(app, '\n'),
        KeyCode::Enter => app.send_message(),
        KeyCode::Esc => app.cancel_reply(),
        KeyCode::F(2) => app.toggle_protocol(),

        // Transcript scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(app.half_page()),
        KeyCode::PageDown => app.scroll_down(app.half_page()),
        KeyCode::End if ctrl => app.scroll_to_bottom(),

        // Input editing
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) if !ctrl => insert_char(app, c),
        _ => {}
    }
}

fn insert_char(app: &mut App, c: char) {
    let byte_pos = char_to_byte_index(&app.input, app.cursor);
    app.input.insert(byte_pos, c);
    app.cursor += 1;
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_send = app.send_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_input = app.input_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => app.scroll_down(3),
        MouseEventKind::ScrollUp if in_chat => app.scroll_up(3),
        MouseEventKind::Down(MouseButton::Left) if in_send => app.send_message(),
        MouseEventKind::Down(MouseButton::Left) if in_input => {
            // Place the cursor where the user clicked (inside the border),
            // counting the chars scrolled off the left edge
            if let Some(area) = app.input_area {
                let inner_width = area.width.saturating_sub(2) as usize;
                let offset = ui::input_scroll_offset(app.cursor, inner_width);
                let clicked = x.saturating_sub(area.x + 1) as usize + offset;
                app.cursor = clicked.min(app.input.chars().count());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatbox_core::{
        ByteStream, ChatBackend, ChatError, ChatView, Message, Protocol, SendOutcome, Sender,
        Settings,
    };
    use crossterm::event::{KeyEventKind, KeyEventState};
    use futures_util::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct EchoBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn ask(&self, text: &str) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("echo: {text}"))
        }

        async fn open_stream(&self, text: &str) -> Result<ByteStream, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let chunks: Vec<Result<Vec<u8>, ChatError>> =
                vec![Ok(b"echo: ".to_vec()), Ok(text.as_bytes().to_vec())];
            Ok(stream::iter(chunks).boxed())
        }
    }

    struct Harness {
        app: App,
        rx: mpsc::UnboundedReceiver<AppEvent>,
        backend: Arc<EchoBackend>,
        dir: tempfile::TempDir,
    }

    fn harness(protocol: Protocol) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(EchoBackend {
            calls: AtomicUsize::new(0),
        });
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            protocol,
            ..Settings::default()
        };
        let app = App::new(settings, backend.clone(), tx, dir.path().join("config.json"));
        Harness {
            app,
            rx,
            backend,
            dir,
        }
    }

    fn key(code: KeyCode) -> AppEvent {
        key_with(code, KeyModifiers::NONE)
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c)));
        }
    }

    /// Feed reply events into the app until the exchange reports back
    async fn drain_reply(h: &mut Harness) -> SendOutcome {
        while let Some(event) = h.rx.recv().await {
            if let AppEvent::ReplyFinished(outcome) = event {
                handle_event(&mut h.app, AppEvent::ReplyFinished(outcome));
                return outcome;
            }
            handle_event(&mut h.app, event);
        }
        panic!("event channel closed before the reply finished");
    }

    #[tokio::test]
    async fn enter_sends_and_reply_arrives() {
        let mut h = harness(Protocol::Json);
        type_text(&mut h.app, "hello");
        handle_event(&mut h.app, key(KeyCode::Enter));

        assert!(h.app.input.is_empty());
        assert_eq!(h.app.cursor, 0);
        assert!(h.app.is_loading());
        assert_eq!(h.app.transcript.len(), 1);

        assert_eq!(drain_reply(&mut h).await, SendOutcome::Replied);
        assert!(!h.app.is_loading());
        assert!(h.app.reply_task.is_none());

        let last = h.app.transcript.last().unwrap();
        assert_eq!(last.sender, Sender::Bot);
        assert_eq!(last.text, "echo: hello");
    }

    #[tokio::test]
    async fn streamed_reply_fills_one_bubble() {
        let mut h = harness(Protocol::Stream);
        type_text(&mut h.app, "hi");
        handle_event(&mut h.app, key(KeyCode::Enter));

        assert_eq!(drain_reply(&mut h).await, SendOutcome::Replied);
        assert_eq!(h.app.transcript.len(), 2);
        assert_eq!(h.app.transcript.last().unwrap().text, "echo: hi");
    }

    #[tokio::test]
    async fn enter_while_loading_is_ignored() {
        let mut h = harness(Protocol::Json);
        type_text(&mut h.app, "first");
        handle_event(&mut h.app, key(KeyCode::Enter));
        type_text(&mut h.app, "second");
        handle_event(&mut h.app, key(KeyCode::Enter));

        assert_eq!(h.app.input, "second");
        assert_eq!(h.app.transcript.len(), 1);

        drain_reply(&mut h).await;
        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 1);

        // Once idle, the kept input can be sent
        handle_event(&mut h.app, key(KeyCode::Enter));
        drain_reply(&mut h).await;
        let texts: Vec<&str> = h.app.transcript.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "echo: first", "second", "echo: second"]);
    }

    #[test]
    fn blank_enter_does_nothing() {
        let mut h = harness(Protocol::Json);
        type_text(&mut h.app, "   ");
        handle_event(&mut h.app, key(KeyCode::Enter));

        assert_eq!(h.app.input, "   ");
        assert!(h.app.transcript.is_empty());
        assert!(!h.app.is_loading());
        assert!(h.rx.try_recv().is_err());
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let mut h = harness(Protocol::Json);
        type_text(&mut h.app, "ab");
        handle_event(&mut h.app, key_with(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&mut h.app, "c");

        assert_eq!(h.app.input, "ab\nc");
        assert!(h.app.transcript.is_empty());
    }

    #[test]
    fn editing_keys_respect_multibyte_chars() {
        let mut h = harness(Protocol::Json);
        type_text(&mut h.app, "héllo");
        handle_event(&mut h.app, key(KeyCode::Home));
        handle_event(&mut h.app, key(KeyCode::Right));
        handle_event(&mut h.app, key(KeyCode::Delete));
        assert_eq!(h.app.input, "hllo");

        handle_event(&mut h.app, key(KeyCode::End));
        handle_event(&mut h.app, key(KeyCode::Backspace));
        assert_eq!(h.app.input, "hll");
        assert_eq!(h.app.cursor, 3);
    }

    #[test]
    fn f2_toggles_protocol_and_saves_it() {
        let mut h = harness(Protocol::Json);
        handle_event(&mut h.app, key(KeyCode::F(2)));

        assert_eq!(h.app.protocol(), Protocol::Stream);
        let saved = chatbox_core::Config::load_from(&h.dir.path().join("config.json")).unwrap();
        assert_eq!(saved.protocol.as_deref(), Some("stream"));
    }

    fn click(column: u16, row: u16) -> AppEvent {
        AppEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn click_in_scrolled_input_lands_on_the_clicked_char() {
        let mut h = harness(Protocol::Json);
        // Ten visible columns inside the border
        h.app.input_area = Some(Rect::new(0, 20, 12, 3));
        type_text(&mut h.app, "abcdefghijklmnopqrstuvwxy");
        assert_eq!(h.app.cursor, 25);

        // Chars 16..25 are on screen; the first inner column shows 'q'
        handle_event(&mut h.app, click(1, 21));
        assert_eq!(h.app.cursor, 16);

        // Without horizontal scroll the click maps straight through
        handle_event(&mut h.app, key(KeyCode::Home));
        handle_event(&mut h.app, click(4, 21));
        assert_eq!(h.app.cursor, 3);
    }

    #[test]
    fn resize_keeps_the_transcript_pinned_to_the_bottom() {
        let mut h = harness(Protocol::Json);
        for i in 0..30 {
            h.app.transcript.append_message(Message::bot(format!("line {i}")));
        }
        h.app.chat_width = 40;
        h.app.chat_height = 5;

        handle_event(&mut h.app, AppEvent::Resize(42, 7));

        assert_eq!(h.app.scroll, h.app.max_scroll());
        assert!(h.app.scroll > 0);
    }

    #[test]
    fn ctrl_c_quits() {
        let mut h = harness(Protocol::Json);
        handle_event(&mut h.app, key_with(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(h.app.should_quit);
        assert!(h.app.input.is_empty());
    }
}
