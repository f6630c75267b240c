//! Sandboxed execution host for generated artifacts.
//!
//! A [`MiniGame`](crate::MiniGame) is untrusted code. The host owns an
//! isolated browsing surface (an iframe-equivalent context, abstracted behind
//! [`SandboxSurface`]) and supervises everything that happens to an artifact
//! inside it: load detection, timeout-based assumed success, bounded retry,
//! and the one-way message relay out of the sandbox.
//!
//! # Trust model
//!
//! The surface is granted exactly [`SANDBOX_ATTRIBUTES`]: scripts, forms,
//! modals, popups and same-origin execution, but no top-level navigation and
//! no privilege escalation. Signals coming *out* of the sandbox are treated
//! as hostile input: only JSON objects carrying a recognized `type` tag are
//! accepted, and nothing received from the sandbox is ever evaluated.
//!
//! # Load policy
//!
//! Generated documents that throw during synchronous script execution often
//! never fire a conventional load event, so silence is not proof of failure.
//! After content assignment the host waits [`SandboxConfig::load_timeout`]
//! (5 s by default) for a load signal and then *optimistically* transitions
//! to `Loaded` anyway. Explicit load failures consume retry attempts; at the
//! cap the session parks in a terminal `Error` phase that only a brand-new
//! artifact can clear.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::playsmith::request::MiniGame;

/// The exact privilege set granted to the sandbox surface. No
/// `allow-top-navigation`, no `allow-popups-to-escape-sandbox`.
pub const SANDBOX_ATTRIBUTES: &str =
    "allow-scripts allow-same-origin allow-forms allow-modals allow-popups";

/// How long to wait for a load signal before assuming success.
const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);
/// Load attempts (initial load excluded) before the session parks in `Error`.
const DEFAULT_MAX_LOAD_ATTEMPTS: u32 = 3;

// Discrete load-progress stages surfaced to collaborators.
const PROGRESS_IDLE: u8 = 0;
const PROGRESS_STARTED: u8 = 10;
const PROGRESS_ASSIGNED: u8 = 40;
const PROGRESS_SUPERVISING: u8 = 70;
const PROGRESS_COMPLETE: u8 = 100;

/// Error type for surface operations.
#[derive(Debug, Clone)]
pub struct SandboxError {
    message: String,
}

impl SandboxError {
    pub fn new(message: impl Into<String>) -> Self {
        SandboxError {
            message: message.into(),
        }
    }
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sandbox error: {}", self.message)
    }
}

impl Error for SandboxError {}

/// The isolated browsing context the host drives.
///
/// Implementations bind to a real surface (a webview iframe, an embedded
/// browser pane); the host never talks to the surface except through this
/// seam. Bindings must apply [`sandbox_attributes`](Self::sandbox_attributes)
/// verbatim to the underlying element.
pub trait SandboxSurface: Send + Sync {
    /// Replace the surface's document with `html`.
    fn assign_content(&self, html: &str) -> Result<(), SandboxError>;

    /// Blank the surface.
    fn clear(&self) -> Result<(), SandboxError>;

    /// Ask the embedder to present the surface fullscreen.
    fn request_fullscreen(&self) -> Result<(), SandboxError>;

    /// The sandbox attribute string the binding must apply. Not overridable
    /// in spirit: the default is the contract.
    fn sandbox_attributes(&self) -> &str {
        SANDBOX_ATTRIBUTES
    }
}

/// Raw signals a surface binding pushes into the host.
///
/// `Loaded`/`LoadFailed` reflect the surface's own load machinery; `Message`
/// carries an unvalidated JSON value posted from inside the sandbox.
#[derive(Debug, Clone)]
pub enum SurfaceSignal {
    Loaded,
    LoadFailed(String),
    Message(JsonValue),
}

/// Console method relayed from inside the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMethod {
    Log,
    Error,
    Warn,
}

/// Load status values the injected relay script reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loaded,
}

/// Validated messages from inside the sandbox.
///
/// The wire format is a tagged JSON object; anything that does not parse into
/// one of these shapes is dropped. The host logs and relays these; it never
/// executes or evaluates their content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SandboxMessage {
    Console {
        method: ConsoleMethod,
        #[serde(default)]
        args: Vec<JsonValue>,
    },
    Error {
        message: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        lineno: Option<u32>,
        #[serde(default)]
        colno: Option<u32>,
        #[serde(default)]
        error: Option<String>,
    },
    Status {
        status: LoadStatus,
    },
}

impl SandboxMessage {
    /// Validate an inbound value from the untrusted side of the channel.
    ///
    /// Only JSON objects with a recognized `type` tag are accepted.
    pub fn parse(value: &JsonValue) -> Option<SandboxMessage> {
        if !value.is_object() || value.get("type").is_none() {
            log::debug!("sandbox: dropping untagged inbound message");
            return None;
        }
        match serde_json::from_value(value.clone()) {
            Ok(message) => Some(message),
            Err(err) => {
                log::debug!("sandbox: dropping unrecognized message: {}", err);
                None
            }
        }
    }
}

/// Lifecycle phase of a sandbox session.
///
/// `Loaded` and `Error` are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Observable state of the artifact currently owned by the host.
#[derive(Debug, Clone)]
pub struct SandboxSession {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub load_attempts: u32,
    pub last_error: Option<String>,
    pub load_progress_pct: u8,
}

impl SandboxSession {
    fn fresh() -> Self {
        SandboxSession {
            id: Uuid::new_v4(),
            phase: SessionPhase::Idle,
            load_attempts: 0,
            last_error: None,
            load_progress_pct: PROGRESS_IDLE,
        }
    }
}

/// Observer hooks for UI collaborators. Both methods default to no-ops, so
/// implementors only override what they render.
#[async_trait]
pub trait SandboxObserver: Send + Sync {
    /// The session's phase, attempt count, progress or error changed.
    async fn on_session_changed(&self, _session: &SandboxSession) {}

    /// A validated message arrived from inside the sandbox.
    async fn on_sandbox_message(&self, _message: &SandboxMessage) {}
}

/// Tuning knobs for the host.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub load_timeout: Duration,
    pub max_load_attempts: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            max_load_attempts: DEFAULT_MAX_LOAD_ATTEMPTS,
        }
    }
}

enum LoadOutcome {
    Loaded,
    TimedOut,
    ChannelClosed,
    Failed(String),
}

/// Supervises one sandbox surface and the artifact loaded into it.
pub struct SandboxHost {
    surface: Arc<dyn SandboxSurface>,
    config: SandboxConfig,
    session: SandboxSession,
    artifact: Option<MiniGame>,
    signal_tx: mpsc::UnboundedSender<SurfaceSignal>,
    signal_rx: mpsc::UnboundedReceiver<SurfaceSignal>,
    observer: Option<Arc<dyn SandboxObserver>>,
}

impl SandboxHost {
    pub fn new(surface: Arc<dyn SandboxSurface>) -> Self {
        Self::with_config(surface, SandboxConfig::default())
    }

    pub fn with_config(surface: Arc<dyn SandboxSurface>, config: SandboxConfig) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        SandboxHost {
            surface,
            config,
            session: SandboxSession::fresh(),
            artifact: None,
            signal_tx,
            signal_rx,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SandboxObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Sender half of the surface-signal channel.
    ///
    /// The channel exists from construction, so the binding can (and must)
    /// wire its callbacks before any content is assigned; the load that
    /// content assignment triggers has to be observable.
    pub fn signal_sender(&self) -> mpsc::UnboundedSender<SurfaceSignal> {
        self.signal_tx.clone()
    }

    /// Snapshot of the current session state.
    pub fn session(&self) -> SandboxSession {
        self.session.clone()
    }

    /// The artifact currently owned by the host, if any.
    pub fn artifact(&self) -> Option<&MiniGame> {
        self.artifact.as_ref()
    }

    /// Take ownership of a new artifact and load it.
    ///
    /// Replaces any previous session (including a terminal `Error` one) with
    /// a fresh one: attempts reset, error cleared.
    pub async fn load(&mut self, game: MiniGame) {
        log::info!("sandbox: loading artifact \"{}\"", game.title);
        self.session = SandboxSession::fresh();
        self.artifact = Some(game);
        self.run_load_cycle().await;
    }

    /// Reload the current artifact.
    ///
    /// Consumes one load attempt. At the attempt cap the session transitions
    /// to terminal `Error`; after that, refresh is a no-op (the counter is
    /// never reset) until a caller supplies a brand-new artifact via
    /// [`load`](Self::load).
    pub async fn refresh(&mut self) {
        if self.artifact.is_none() {
            log::warn!("sandbox: refresh called with no artifact");
            return;
        }
        if self.session.phase == SessionPhase::Error
            && self.session.load_attempts >= self.config.max_load_attempts
        {
            log::warn!("sandbox: attempts exhausted; refresh requires a new artifact");
            return;
        }
        if !self.consume_attempt().await {
            return;
        }
        self.run_load_cycle().await;
    }

    /// Release the current artifact: blank the surface and return the
    /// session to `Idle`.
    pub async fn teardown(&mut self) {
        if let Err(err) = self.surface.clear() {
            log::warn!("sandbox: failed to clear surface: {}", err);
        }
        self.artifact = None;
        self.session = SandboxSession::fresh();
        self.notify_session().await;
    }

    /// Ask the surface to go fullscreen. Failures are logged, not surfaced.
    pub fn request_fullscreen(&self) {
        if let Err(err) = self.surface.request_fullscreen() {
            log::error!("sandbox: fullscreen request failed: {}", err);
        }
    }

    /// Drain and relay any signals that arrived outside a load cycle
    /// (console output and runtime errors from a running game).
    ///
    /// Runtime errors after a successful load are logged and relayed only;
    /// the `Error` phase is reserved for failures to load content.
    pub async fn process_pending_signals(&mut self) {
        while let Ok(signal) = self.signal_rx.try_recv() {
            match signal {
                SurfaceSignal::Loaded => {
                    // Late load signal after an optimistic transition; no-op.
                    log::debug!("sandbox: ignoring late load signal");
                }
                SurfaceSignal::LoadFailed(message) => {
                    log::warn!("sandbox: surface reported failure after load: {}", message);
                }
                SurfaceSignal::Message(value) => {
                    if let Some(message) = SandboxMessage::parse(&value) {
                        self.relay_message(&message).await;
                    }
                }
            }
        }
    }

    /// One full assign-and-supervise cycle, retrying explicit failures up to
    /// the attempt cap.
    async fn run_load_cycle(&mut self) {
        loop {
            // Stale signals from previously assigned content must not
            // satisfy this load.
            while self.signal_rx.try_recv().is_ok() {}

            let content = match &self.artifact {
                Some(game) => game.content.clone(),
                None => {
                    self.enter_error("no artifact content to load".to_string()).await;
                    return;
                }
            };

            self.set_phase(SessionPhase::Loading, PROGRESS_STARTED).await;

            if let Err(err) = self.surface.assign_content(&content) {
                log::error!("sandbox: content assignment failed: {}", err);
                if self.consume_attempt().await {
                    continue;
                }
                return;
            }
            self.set_progress(PROGRESS_ASSIGNED).await;

            self.set_progress(PROGRESS_SUPERVISING).await;
            match self.supervise_load().await {
                LoadOutcome::Loaded => {
                    self.mark_loaded("load signal").await;
                    return;
                }
                LoadOutcome::TimedOut => {
                    log::warn!(
                        "sandbox: no load signal within {:?}; assuming loaded",
                        self.config.load_timeout
                    );
                    self.mark_loaded("timeout").await;
                    return;
                }
                LoadOutcome::ChannelClosed => {
                    log::warn!("sandbox: signal channel closed; assuming loaded");
                    self.mark_loaded("channel closed").await;
                    return;
                }
                LoadOutcome::Failed(message) => {
                    log::warn!("sandbox: load failed: {}", message);
                    if self.consume_attempt().await {
                        continue;
                    }
                    return;
                }
            }
        }
    }

    /// Wait for the first decisive signal or the load timeout, relaying any
    /// console/error traffic that arrives in between.
    async fn supervise_load(&mut self) -> LoadOutcome {
        let deadline = Instant::now() + self.config.load_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = tokio::time::timeout(remaining, self.signal_rx.recv()).await;
            match received {
                Ok(Some(SurfaceSignal::Loaded)) => return LoadOutcome::Loaded,
                Ok(Some(SurfaceSignal::LoadFailed(message))) => {
                    return LoadOutcome::Failed(message)
                }
                Ok(Some(SurfaceSignal::Message(value))) => {
                    if let Some(message) = SandboxMessage::parse(&value) {
                        if matches!(
                            message,
                            SandboxMessage::Status {
                                status: LoadStatus::Loaded
                            }
                        ) {
                            return LoadOutcome::Loaded;
                        }
                        // Script errors during load are relayed but do not
                        // fail the load; the timeout policy decides.
                        self.relay_message(&message).await;
                    }
                }
                Ok(None) => return LoadOutcome::ChannelClosed,
                Err(_) => return LoadOutcome::TimedOut,
            }
        }
    }

    /// Burn one load attempt. Returns `false` when the cap was reached and
    /// the session has parked in terminal `Error`.
    async fn consume_attempt(&mut self) -> bool {
        self.session.load_attempts += 1;
        if self.session.load_attempts >= self.config.max_load_attempts {
            let message = format!(
                "could not load the game after {} attempts, generate a new game",
                self.config.max_load_attempts
            );
            self.enter_error(message).await;
            return false;
        }
        log::info!(
            "sandbox: retrying load (attempt {}/{})",
            self.session.load_attempts,
            self.config.max_load_attempts
        );
        true
    }

    /// Idempotent `Loading → Loaded` transition; a losing signal that
    /// arrives after the phase has settled is a no-op.
    async fn mark_loaded(&mut self, reason: &str) {
        if self.session.phase != SessionPhase::Loading {
            return;
        }
        log::info!("sandbox: content loaded ({})", reason);
        self.session.phase = SessionPhase::Loaded;
        self.session.load_progress_pct = PROGRESS_COMPLETE;
        self.session.last_error = None;
        self.notify_session().await;
    }

    /// Terminal failure path. Supervision is scoped to the load call, so no
    /// load timer can outlive this transition.
    async fn enter_error(&mut self, message: String) {
        log::error!("sandbox: {}", message);
        self.session.phase = SessionPhase::Error;
        self.session.last_error = Some(message);
        self.notify_session().await;
    }

    async fn set_phase(&mut self, phase: SessionPhase, progress: u8) {
        self.session.phase = phase;
        self.session.load_progress_pct = progress;
        self.notify_session().await;
    }

    async fn set_progress(&mut self, progress: u8) {
        self.session.load_progress_pct = progress;
        self.notify_session().await;
    }

    async fn notify_session(&self) {
        if let Some(observer) = &self.observer {
            observer.on_session_changed(&self.session).await;
        }
    }

    /// Log a validated sandbox message and hand it to the observer.
    async fn relay_message(&self, message: &SandboxMessage) {
        match message {
            SandboxMessage::Console { method, args } => {
                let rendered = args
                    .iter()
                    .map(|arg| arg.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                match method {
                    ConsoleMethod::Log => log::info!("sandbox console.log: {}", rendered),
                    ConsoleMethod::Warn => log::warn!("sandbox console.warn: {}", rendered),
                    ConsoleMethod::Error => log::error!("sandbox console.error: {}", rendered),
                }
            }
            SandboxMessage::Error {
                message,
                source,
                lineno,
                colno,
                ..
            } => {
                log::error!(
                    "sandbox runtime error: {} ({}:{}:{})",
                    message,
                    source.as_deref().unwrap_or("?"),
                    lineno.unwrap_or(0),
                    colno.unwrap_or(0)
                );
            }
            SandboxMessage::Status { status } => {
                log::debug!("sandbox status: {:?}", status);
            }
        }
        if let Some(observer) = &self.observer {
            observer.on_sandbox_message(message).await;
        }
    }
}
