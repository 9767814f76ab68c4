use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub(crate) const DEFAULT_API_URL: &str = "http://localhost:3000";
pub(crate) const DEFAULT_LEVEL: &str = "default";
pub(crate) const MAX_MESSAGE_CHARS: usize = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_OK: &str = "ok";
const HEALTH_UNAVAILABLE: &str = "unavailable";
const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BoardMessage {
    #[serde(rename = "_id", default)]
    pub(crate) id: Option<String>,
    pub(crate) text: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    #[serde(default = "default_level")]
    pub(crate) level: String,
    #[serde(default)]
    pub(crate) timestamp: Option<String>,
}

impl BoardMessage {
    /// Created locally because the server could not be reached.
    pub(crate) fn is_local(&self) -> bool {
        self.id
            .as_deref()
            .is_some_and(|id| id.starts_with(LOCAL_ID_PREFIX))
    }
}

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct NewMessage {
    pub(crate) text: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) level: String,
}

impl NewMessage {
    /// Trims and caps `text`; empty text is rejected.
    pub(crate) fn new(text: &str, x: f32, y: f32, level: &str) -> Option<Self> {
        let text: String = text.trim().chars().take(MAX_MESSAGE_CHARS).collect();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text,
            x,
            y,
            level: level.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct HealthStatus {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Error)]
pub(crate) enum BoardError {
    #[error("HTTP {code}")]
    Status { code: u16 },
    #[error("transport: {0}")]
    Transport(String),
    #[error("decode response: {0}")]
    Decode(#[source] std::io::Error),
}

impl From<ureq::Error> for BoardError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::Status(code, _) => BoardError::Status { code },
            other => BoardError::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiStatus {
    Checking,
    Online,
    Unavailable(String),
}

impl ApiStatus {
    pub(crate) fn label(&self) -> String {
        match self {
            ApiStatus::Checking => "checking".to_string(),
            ApiStatus::Online => "online".to_string(),
            ApiStatus::Unavailable(reason) => format!("unavailable: {reason}"),
        }
    }
}

/// Blocking client for the message-board REST API.
#[derive(Clone)]
pub(crate) struct BoardClient {
    base_url: String,
    agent: ureq::Agent,
}

impl BoardClient {
    pub(crate) fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            base_url: normalize_base_url(base_url),
            agent,
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn get_messages(&self) -> Result<Vec<BoardMessage>, BoardError> {
        let url = format!("{}/messages", self.base_url);
        let response = self.agent.get(&url).call()?;
        response.into_json().map_err(BoardError::Decode)
    }

    pub(crate) fn get_messages_by_level(&self, level: &str) -> Result<Vec<BoardMessage>, BoardError> {
        let url = level_url(&self.base_url, level);
        let response = self.agent.get(&url).call()?;
        response.into_json().map_err(BoardError::Decode)
    }

    pub(crate) fn create_message(&self, message: &NewMessage) -> Result<BoardMessage, BoardError> {
        let url = format!("{}/messages", self.base_url);
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(message)?;
        response.into_json().map_err(BoardError::Decode)
    }

    pub(crate) fn check_health(&self) -> Result<HealthStatus, BoardError> {
        let url = format!("{}/health", self.base_url);
        let response = self.agent.get(&url).call()?;
        response.into_json().map_err(BoardError::Decode)
    }

    fn messages_or_empty(&self, level: Option<&str>) -> Vec<BoardMessage> {
        let result = match level {
            Some(level) => self.get_messages_by_level(level),
            None => self.get_messages(),
        };
        result.unwrap_or_else(|error| {
            warn!(error = %error, level = level.unwrap_or("*"), "board_fetch_failed");
            Vec::new()
        })
    }

    fn post_or_local(&self, message: NewMessage) -> BoardMessage {
        self.create_message(&message).unwrap_or_else(|error| {
            warn!(error = %error, "board_post_failed");
            local_message(message)
        })
    }

    fn health_or_unavailable(&self) -> HealthStatus {
        self.check_health().unwrap_or_else(|error| {
            warn!(error = %error, "board_health_failed");
            HealthStatus {
                status: HEALTH_UNAVAILABLE.to_string(),
                error: Some(error.to_string()),
            }
        })
    }
}

fn level_url(base_url: &str, level: &str) -> String {
    format!("{}/messages/level/{}", base_url, urlencoding::encode(level))
}

/// Only an explicit `ok` counts as online.
fn status_from_health(health: HealthStatus) -> ApiStatus {
    if health.status == HEALTH_OK {
        return ApiStatus::Online;
    }
    ApiStatus::Unavailable(health.error.unwrap_or(health.status))
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let base = if trimmed.is_empty() {
        DEFAULT_API_URL
    } else {
        trimmed
    };
    base.strip_suffix('/').unwrap_or(base).to_string()
}

fn local_message(message: NewMessage) -> BoardMessage {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    BoardMessage {
        id: Some(format!("{LOCAL_ID_PREFIX}{millis}")),
        text: message.text,
        x: message.x,
        y: message.y,
        level: message.level,
        timestamp: None,
    }
}

/// Result of a request running on a background thread, polled once per tick.
pub(crate) struct PendingRequest<T> {
    receiver: Receiver<T>,
}

impl<T: Send + 'static> PendingRequest<T> {
    pub(crate) fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = channel();
        thread::spawn(move || {
            let _ = sender.send(work());
        });
        Self { receiver }
    }

    /// `Some(Ok(_))` when finished, `Some(Err(()))` if the worker vanished.
    pub(crate) fn poll(&self) -> Option<Result<T, ()>> {
        match self.receiver.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(())),
        }
    }
}

/// Message-board state shown next to the room: API status and the messages
/// annotated on the current level. Never blocks the caller.
pub(crate) struct MessageBoard {
    client: BoardClient,
    level: String,
    status: ApiStatus,
    annotations: Vec<BoardMessage>,
    pending_health: Option<PendingRequest<HealthStatus>>,
    pending_messages: Option<PendingRequest<Vec<BoardMessage>>>,
    pending_posts: Vec<PendingRequest<BoardMessage>>,
    pending_listing: Option<PendingRequest<Vec<BoardMessage>>>,
    listing: Option<Vec<BoardMessage>>,
}

impl MessageBoard {
    pub(crate) fn new(client: BoardClient) -> Self {
        Self {
            client,
            level: DEFAULT_LEVEL.to_string(),
            status: ApiStatus::Checking,
            annotations: Vec::new(),
            pending_health: None,
            pending_messages: None,
            pending_posts: Vec::new(),
            pending_listing: None,
            listing: None,
        }
    }

    pub(crate) fn status(&self) -> &ApiStatus {
        &self.status
    }

    pub(crate) fn annotations(&self) -> &[BoardMessage] {
        &self.annotations
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.pending_health.is_some()
            || self.pending_messages.is_some()
            || !self.pending_posts.is_empty()
            || self.pending_listing.is_some()
    }

    /// Fetches messages across every level; see [`Self::take_listing`].
    pub(crate) fn request_listing(&mut self) {
        if self.pending_listing.is_some() {
            return;
        }
        let client = self.client.clone();
        self.pending_listing = Some(PendingRequest::spawn(move || client.messages_or_empty(None)));
    }

    pub(crate) fn take_listing(&mut self) -> Option<Vec<BoardMessage>> {
        self.listing.take()
    }

    /// Fires a health check and a message refresh.
    pub(crate) fn refresh(&mut self) {
        if self.pending_health.is_none() {
            let client = self.client.clone();
            self.pending_health = Some(PendingRequest::spawn(move || client.health_or_unavailable()));
            self.status = ApiStatus::Checking;
        }
        if self.pending_messages.is_none() {
            let client = self.client.clone();
            let level = self.level.clone();
            self.pending_messages = Some(PendingRequest::spawn(move || {
                client.messages_or_empty(Some(&level))
            }));
        }
        debug!(url = %self.client.base_url(), "board_refresh_started");
    }

    pub(crate) fn post(&mut self, text: &str, x: f32, y: f32) -> Result<(), &'static str> {
        let Some(message) = NewMessage::new(text, x, y, &self.level) else {
            return Err("message text is empty");
        };
        let client = self.client.clone();
        self.pending_posts
            .push(PendingRequest::spawn(move || client.post_or_local(message)));
        Ok(())
    }

    /// Collects finished requests. Returns true when anything changed.
    pub(crate) fn poll(&mut self) -> bool {
        let mut changed = false;

        if let Some(finished) = self.pending_health.as_ref().and_then(PendingRequest::poll) {
            self.pending_health = None;
            self.status = match finished {
                Ok(health) => status_from_health(health),
                Err(()) => ApiStatus::Unavailable("request worker stopped".to_string()),
            };
            info!(status = %self.status.label(), "board_status_changed");
            changed = true;
        }

        if let Some(finished) = self.pending_messages.as_ref().and_then(PendingRequest::poll) {
            self.pending_messages = None;
            if let Ok(messages) = finished {
                let unsent: Vec<BoardMessage> = self
                    .annotations
                    .drain(..)
                    .filter(BoardMessage::is_local)
                    .collect();
                let level = self.level.as_str();
                self.annotations = messages
                    .into_iter()
                    .filter(|message| message.level == level)
                    .collect();
                self.annotations.extend(unsent);
            }
            changed = true;
        }

        if let Some(finished) = self.pending_listing.as_ref().and_then(PendingRequest::poll) {
            self.pending_listing = None;
            self.listing = Some(finished.unwrap_or_default());
            changed = true;
        }

        let mut still_pending = Vec::with_capacity(self.pending_posts.len());
        for pending in self.pending_posts.drain(..) {
            match pending.poll() {
                Some(Ok(message)) => {
                    info!(id = message.id.as_deref().unwrap_or("-"), "board_message_posted");
                    if message.level == self.level {
                        self.annotations.push(message);
                    }
                    changed = true;
                }
                Some(Err(())) => changed = true,
                None => still_pending.push(pending),
            }
        }
        self.pending_posts = still_pending;
        changed
    }

    /// Polls until every request finishes or `timeout` elapses.
    pub(crate) fn wait_idle(&mut self, timeout: Duration) {
        let started = std::time::Instant::now();
        while self.is_busy() && started.elapsed() < timeout {
            self.poll();
            if self.is_busy() {
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
