use std::sync::Arc;
use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::client::CompletionService;
use crate::config::Config;
use crate::error::ChatError;
use crate::session::{ChatSession, Submission};

/// Terminal application state: one chat session plus what the screen needs.
pub struct App {
    pub should_quit: bool,

    pub session: ChatSession,
    pub service: Arc<dyn CompletionService>,
    /// The outstanding completion call, if any
    pub request_task: Option<JoinHandle<Result<String, ChatError>>>,

    // Input state (cursor is a char index into the session's pending input)
    pub input_cursor: usize,

    // Transcript viewport
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    /// Lines the transcript took on the last render, after wrapping
    pub chat_line_count: u16,
    pub follow_tail: bool,
    pub chat_area: Option<Rect>,

    pub animation_frame: u8,
}

impl App {
    pub fn new(config: Config, service: Arc<dyn CompletionService>) -> Self {
        Self {
            should_quit: false,
            session: ChatSession::new(config),
            service,
            request_task: None,
            input_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_line_count: 0,
            follow_tail: true,
            chat_area: None,
            animation_frame: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_in_flight()
    }

    /// Submit the pending input. The network call runs on its own task and is
    /// picked up again by [`poll_request`](Self::poll_request).
    pub fn submit(&mut self) {
        if self.request_task.is_some() {
            return;
        }

        let submission = self.session.begin_input();
        if !submission.is_accepted() {
            return;
        }

        self.input_cursor = 0;
        self.follow_tail = true;
        self.scroll_to_bottom();

        if let Submission::Request(request) = submission {
            let service = Arc::clone(&self.service);
            self.request_task = Some(tokio::spawn(async move {
                service.complete(&request).await
            }));
        }
    }

    /// Feed a finished request back into the session. No-op while it runs.
    pub async fn poll_request(&mut self) {
        let finished = self
            .request_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.request_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Completion task failed: {}", e);
                    Err(ChatError::Unknown)
                }
            };
            self.session.resolve(result);
            self.follow_tail = true;
            self.scroll_to_bottom();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        if self.chat_scroll == max {
            self.follow_tail = true;
        }
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll_up(self.chat_height.max(1));
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_down(self.chat_height.max(1));
    }

    /// Scroll so the newest message (or the "Thinking..." line) is visible
    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.chat_line_count.saturating_sub(visible_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::client::PendingRequest;
    use crate::message::ChatMessage;

    struct EchoService;

    #[async_trait]
    impl CompletionService for EchoService {
        async fn complete(&self, request: &PendingRequest) -> Result<String, ChatError> {
            let last = request.body.messages.last().map(|m| m.content.clone());
            Ok(format!("echo: {}", last.unwrap_or_default()))
        }
    }

    fn app() -> App {
        App::new(Config::new().with_api_key("sk-test"), Arc::new(EchoService))
    }

    async fn wait_for_reply(app: &mut App) {
        while app.request_task.is_some() {
            tokio::task::yield_now().await;
            app.poll_request().await;
        }
    }

    #[tokio::test]
    async fn test_submit_runs_request_in_background() {
        let mut app = app();
        app.session.set_input("ping");
        app.input_cursor = 4;

        app.submit();
        assert!(app.is_busy());
        assert_eq!(app.session.input(), "");
        assert_eq!(app.input_cursor, 0);
        assert_eq!(app.session.transcript(), &[ChatMessage::user("ping")]);

        wait_for_reply(&mut app).await;

        assert!(!app.is_busy());
        assert_eq!(
            app.session.transcript().last(),
            Some(&ChatMessage::assistant("echo: ping"))
        );
    }

    #[tokio::test]
    async fn test_second_submit_while_busy_keeps_input() {
        let mut app = app();
        app.session.set_input("first");
        app.submit();

        app.session.set_input("second");
        app.input_cursor = 6;
        app.submit();

        assert_eq!(app.session.transcript().len(), 1);
        assert_eq!(app.session.input(), "second");
        assert_eq!(app.input_cursor, 6);

        wait_for_reply(&mut app).await;
        assert_eq!(app.session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_key_spawns_nothing() {
        let mut app = App::new(Config::new(), Arc::new(EchoService));
        app.session.set_input("hello");

        app.submit();

        assert!(app.request_task.is_none());
        assert!(!app.is_busy());
        assert_eq!(app.session.error(), Some("OpenRouter API key is missing"));
    }

    #[test]
    fn test_manual_scroll_stops_following() {
        let mut app = app();
        app.chat_height = 2;
        app.chat_line_count = 30;
        app.scroll_to_bottom();
        let bottom = app.chat_scroll;
        assert_eq!(bottom, 28);

        app.scroll_up(3);
        assert!(!app.follow_tail);
        assert_eq!(app.chat_scroll, bottom - 3);

        app.scroll_down(100);
        assert_eq!(app.chat_scroll, bottom);
        assert!(app.follow_tail);
    }
}
