//! Generation orchestrator: the single entry point UI collaborators call.
//!
//! [`GameGenerator`] composes prompt construction, the
//! gateway's resilient call and the repair engine, and absorbs every failure
//! below its boundary into the deterministic fallback. `generate` therefore
//! never fails and never returns an empty artifact.
//!
//! The generator is an explicit, constructor-injected service object: build
//! one, share it (`Arc`) with whoever needs it. No process-wide singleton is
//! involved, and concurrent `generate` calls are independent; the only
//! shared state is the last-artifact cache, which is last-write-wins and
//! purely informational.
//!
//! # Example
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
//!     let game = generator
//!         .generate("the water cycle", &GameSettings::default())
//!         .await;
//!     println!("generated: {} ({} bytes)", game.title, game.content.len());
//! }
//! ```

use std::sync::Mutex;

use crate::playsmith::fallback::fallback_game;
use crate::playsmith::gateway::ApiGateway;
use crate::playsmith::prompt::build_prompt;
use crate::playsmith::repair::repair;
use crate::playsmith::request::{GameSettings, GenerationRequest, MiniGame};

/// Orchestrates prompt → gateway → repair, with fallback substitution.
pub struct GameGenerator {
    gateway: ApiGateway,
    /// Most recently produced artifact, for inspection only. Last write wins;
    /// not used for deduplication; every `generate` call runs the full
    /// pipeline.
    last_game: Mutex<Option<MiniGame>>,
}

impl GameGenerator {
    /// Create a generator around a configured gateway.
    pub fn new(gateway: ApiGateway) -> Self {
        log::info!(
            "GameGenerator initialized with model: {}",
            gateway.config().model
        );
        GameGenerator {
            gateway,
            last_game: Mutex::new(None),
        }
    }

    /// Generate an artifact for `topic`. Never fails: any gateway exhaustion
    /// or repair anomaly is logged and absorbed by the fallback generator.
    pub async fn generate(&self, topic: &str, settings: &GameSettings) -> MiniGame {
        let request = GenerationRequest::new(topic, settings);
        log::info!(
            "generating mini-game for topic: \"{}\" (canvas: {})",
            request.topic,
            request.use_canvas
        );

        let prompt = build_prompt(&request);

        let game = match self.gateway.call(&prompt).await {
            Ok(response) => {
                let doc = repair(&response.content);
                log::info!(
                    "successfully generated mini-game: {} (attempts: {})",
                    doc.title,
                    response.attempts.len()
                );
                MiniGame {
                    title: doc.title,
                    content: doc.content,
                    use_canvas: request.use_canvas,
                }
            }
            Err(err) => {
                log::error!("generation failed, substituting fallback: {}", err);
                fallback_game(&request.topic, request.use_canvas)
            }
        };

        if let Ok(mut slot) = self.last_game.lock() {
            *slot = Some(game.clone());
        }

        game
    }

    /// The most recently produced artifact, if any.
    ///
    /// Informational only: last write wins across concurrent calls.
    pub fn last_generated(&self) -> Option<MiniGame> {
        self.last_game.lock().ok().and_then(|slot| slot.clone())
    }
}
