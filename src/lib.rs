//! # Playsmith
//!
//! Playsmith turns a natural-language topic into a runnable, self-contained
//! HTML mini-game via a generative-content API, and then babysits that
//! untrusted artifact inside a sandboxed execution surface.
//!
//! The hard part of this problem is not asking a model for a game; it is
//! surviving what comes back. Model output is frequently malformed, upstream
//! APIs are unreliable, and a generated document must never be able to harm
//! the application hosting it. The crate is built around those three facts:
//!
//! * **Resilient generation**: [`gateway::ApiGateway`] wraps every call in a
//!   cooperative timeout and a doubling-backoff retry loop, and reports
//!   exhaustion as a tagged error instead of throwing.
//! * **Defensive repair**: [`repair`] runs a fixed pipeline of text-transform
//!   passes that strip markdown fences, restore the document shell, fix the
//!   syntax mistakes models habitually make, and inject guards the generated
//!   code should have written itself.
//! * **Guaranteed availability**: [`fallback_game`] is a pure function that
//!   always produces a complete, playable placeholder; no upstream failure
//!   can leave the user with nothing.
//! * **Sandboxed execution**: [`sandbox::SandboxHost`] owns an isolated
//!   browsing surface with a fixed privilege set, supervises load with an
//!   optimistic timeout, bounds retries, and relays console/error traffic out
//!   of the sandbox over a validated one-way message protocol.
//!
//! ## Generating a game
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use playsmith::gateway::{ApiGateway, GatewayConfig, GenerativeApiTransport};
//! use playsmith::{GameGenerator, GameSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     playsmith::init_logger();
//!
//!     let config = GatewayConfig::from_env();
//!     let transport = Arc::new(GenerativeApiTransport::new(&config));
//!     let generator = GameGenerator::new(ApiGateway::new(transport, config));
//!
//!     // Never fails: on exhausted retries or unusable output the caller
//!     // receives the deterministic fallback artifact instead.
//!     let game = generator
//!         .generate("fractions for beginners", &GameSettings::default())
//!         .await;
//!     println!("{}: {} bytes of HTML", game.title, game.content.len());
//! }
//! ```
//!
//! ## Hosting the artifact
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use playsmith::sandbox::{SandboxHost, SandboxSurface, SandboxError};
//! # use playsmith::MiniGame;
//!
//! struct MySurface; // binds to a real iframe-equivalent context
//!
//! impl SandboxSurface for MySurface {
//!     fn assign_content(&self, _html: &str) -> Result<(), SandboxError> { Ok(()) }
//!     fn clear(&self) -> Result<(), SandboxError> { Ok(()) }
//!     fn request_fullscreen(&self) -> Result<(), SandboxError> { Ok(()) }
//! }
//!
//! # async fn host_it(game: MiniGame) {
//! let mut host = SandboxHost::new(Arc::new(MySurface));
//! host.load(game).await;
//! println!("phase after load: {:?}", host.session().phase);
//! # }
//! ```
//!
//! UI collaborators observe `{phase, load_progress_pct, last_error}` via
//! [`sandbox::SandboxHost::session`] (or a [`sandbox::SandboxObserver`]) and
//! render loading/error state however they like; the pipeline itself carries
//! no UI.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// The helper is intentionally lightweight so that applications embedding
/// Playsmith can opt in to simple `RUST_LOG` driven diagnostics without
/// having to choose a logging backend upfront.
///
/// ```rust
/// playsmith::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `playsmith` module.
pub mod playsmith;

// Re-exporting key items for easier external access.
pub use crate::playsmith::fallback::fallback_game;
pub use crate::playsmith::gateway;
pub use crate::playsmith::generator::GameGenerator;
pub use crate::playsmith::prompt::build_prompt;
pub use crate::playsmith::repair::{repair, RepairedDocument};
pub use crate::playsmith::request::{
    Difficulty, GameSettings, GenerationRequest, Language, MiniGame,
};
pub use crate::playsmith::sandbox;
pub use crate::playsmith::sandbox::{SandboxHost, SandboxSurface, SANDBOX_ATTRIBUTES};
