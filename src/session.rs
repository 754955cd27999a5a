//! Chat session controller
//!
//! Owns the transcript and the single in-flight request guard. A submission
//! is split at the network call: [`ChatSession::begin`] does the optimistic
//! update and hands back the outbound request, [`ChatSession::resolve`]
//! applies the outcome. [`ChatSession::submit`] runs both around a
//! [`CompletionService`].

use tracing::{debug, info};

use crate::client::{CompletionRequest, CompletionService, PendingRequest};
use crate::config::Config;
use crate::error::ChatError;
use crate::message::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// A request has been handed out and not yet resolved.
    Pending,
}

/// What became of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Blank text, or a request was already in flight. Nothing changed.
    Dropped,
    /// The user turn was recorded but there was nothing to send (no API key).
    /// The error is already set and the session is idle again.
    Unsent,
    /// The user turn was recorded and this request goes to the service.
    Request(PendingRequest),
}

impl Submission {
    /// Whether the user turn made it into the transcript.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Submission::Dropped)
    }
}

pub struct ChatSession {
    config: Config,
    transcript: Vec<ChatMessage>,
    input: String,
    state: SessionState,
    error: Option<String>,
}

impl ChatSession {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transcript: Vec::new(),
            input: String::new(),
            state: SessionState::Idle,
            error: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == SessionState::Pending
    }

    /// Error text of the most recent failed submission, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Pending input text
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Start a submission of `text`.
    ///
    /// Blank text or a request in flight gives [`Submission::Dropped`] and
    /// leaves all state alone. Otherwise the user turn is appended, the
    /// pending input and previous error are cleared and the session goes
    /// pending. Without an API key the session goes straight back to idle
    /// with the error recorded ([`Submission::Unsent`]).
    pub fn begin(&mut self, text: &str) -> Submission {
        let text = text.trim();
        if text.is_empty() {
            return Submission::Dropped;
        }
        if self.is_in_flight() {
            debug!("Dropping submission while a request is in flight");
            return Submission::Dropped;
        }

        self.state = SessionState::Pending;
        self.error = None;
        self.input.clear();
        self.transcript.push(ChatMessage::user(text));

        let Some(api_key) = self.config.api_key().map(str::to_string) else {
            self.resolve(Err(ChatError::MissingApiKey));
            return Submission::Unsent;
        };

        info!(turns = self.transcript.len(), "Sending message");
        Submission::Request(PendingRequest {
            api_key,
            body: CompletionRequest {
                model: self.config.model().to_string(),
                messages: self.transcript.clone(),
            },
        })
    }

    /// Start a submission of the pending input text.
    pub fn begin_input(&mut self) -> Submission {
        let text = self.input.clone();
        self.begin(&text)
    }

    /// Apply the outcome of the request handed out by [`begin`](Self::begin).
    ///
    /// Ignored unless a request is pending.
    pub fn resolve(&mut self, result: Result<String, ChatError>) {
        if !self.is_in_flight() {
            debug!("Ignoring completion result with no request pending");
            return;
        }

        match result {
            Ok(content) => {
                debug!(chars = content.chars().count(), "Received response");
                self.transcript.push(ChatMessage::assistant(content));
            }
            Err(e) => {
                info!("Submission failed: {}", e);
                self.error = Some(e.to_string());
            }
        }
        self.state = SessionState::Idle;
    }

    /// Run a whole exchange for `text` against `service`.
    ///
    /// Returns the outcome of [`begin`](Self::begin); for
    /// [`Submission::Request`] the request has been sent and resolved by the
    /// time this returns, so check [`error`](Self::error) for how it went.
    pub async fn submit(&mut self, service: &dyn CompletionService, text: &str) -> Submission {
        let submission = self.begin(text);
        if let Submission::Request(request) = &submission {
            let result = service.complete(request).await;
            self.resolve(result);
        }
        submission
    }

    /// Run a whole exchange for the pending input text.
    pub async fn submit_input(&mut self, service: &dyn CompletionService) -> Submission {
        let text = self.input.clone();
        self.submit(service, &text).await
    }
}
