use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use playsmith::gateway::{ApiGateway, ContentTransport, GatewayConfig, GatewayError};
use playsmith::{GameGenerator, GameSettings};

fn fast_config() -> GatewayConfig {
    GatewayConfig {
        timeout: Duration::from_millis(50),
        max_attempts: 3,
        backoff_base: Duration::from_millis(1),
        ..Default::default()
    }
}

fn generator_with(transport: Arc<dyn ContentTransport>) -> GameGenerator {
    GameGenerator::new(ApiGateway::new(transport, fast_config()))
}

struct TimingOutTransport;

#[async_trait]
impl ContentTransport for TimingOutTransport {
    async fn generate_content(
        &self,
        _prompt: &str,
        _model: &str,
        _temperature: f32,
    ) -> Result<String, GatewayError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(String::new())
    }
}

struct MalformedTransport;

#[async_trait]
impl ContentTransport for MalformedTransport {
    async fn generate_content(
        &self,
        _prompt: &str,
        _model: &str,
        _temperature: f32,
    ) -> Result<String, GatewayError> {
        Ok("I'm sorry, here is some prose instead of a game. Enjoy!".to_string())
    }
}

struct WellFormedTransport;

#[async_trait]
impl ContentTransport for WellFormedTransport {
    async fn generate_content(
        &self,
        _prompt: &str,
        _model: &str,
        _temperature: f32,
    ) -> Result<String, GatewayError> {
        Ok("```html\n<!DOCTYPE html><html><head><title>Fraction Frenzy</title></head><body><h1>Fraction Frenzy</h1></body></html>\n```".to_string())
    }
}

#[tokio::test]
async fn generate_resolves_when_upstream_always_times_out() {
    let generator = generator_with(Arc::new(TimingOutTransport));
    let game = generator.generate("fractions", &GameSettings::default()).await;

    // Fallback substitution: still a complete runnable document.
    assert!(game.content.contains("<!DOCTYPE html>"));
    assert!(!game.title.is_empty());
}

#[tokio::test]
async fn generate_resolves_for_empty_topic() {
    let generator = generator_with(Arc::new(TimingOutTransport));
    let game = generator.generate("", &GameSettings::default()).await;

    assert!(game.content.contains("<!DOCTYPE html>"));
    assert!(!game.title.is_empty());
}

#[tokio::test]
async fn malformed_output_is_repaired_rather_than_rejected() {
    let generator = generator_with(Arc::new(MalformedTransport));
    let game = generator.generate("fractions", &GameSettings::default()).await;

    // Non-HTML text gets the skeleton treatment from the repair engine.
    assert!(game.content.contains("<!DOCTYPE html>"));
    assert!(game.content.contains("prose instead of a game"));
    assert!(game.content.contains("window.onerror"));
}

#[tokio::test]
async fn well_formed_output_flows_through_with_title() {
    let generator = generator_with(Arc::new(WellFormedTransport));
    let game = generator.generate("fractions", &GameSettings::default()).await;

    assert_eq!(game.title, "Fraction Frenzy");
    assert!(!game.content.contains("```"));
    assert!(game.use_canvas);
}

#[tokio::test]
async fn last_generated_caches_the_most_recent_artifact() {
    let generator = generator_with(Arc::new(WellFormedTransport));
    assert!(generator.last_generated().is_none());

    let game = generator.generate("fractions", &GameSettings::default()).await;
    let cached = generator.last_generated().expect("cache populated");
    assert_eq!(cached.title, game.title);
    assert_eq!(cached.content, game.content);
}

#[tokio::test]
async fn fallback_respects_the_canvas_flag() {
    let generator = generator_with(Arc::new(TimingOutTransport));

    let mut settings = GameSettings::default();
    settings.use_canvas = false;
    let dom_game = generator.generate("fractions", &settings).await;
    assert!(!dom_game.use_canvas);
    assert!(dom_game.content.contains("gameArea"));

    settings.use_canvas = true;
    let canvas_game = generator.generate("fractions", &settings).await;
    assert!(canvas_game.use_canvas);
    assert!(canvas_game.content.contains("gameCanvas"));
}
