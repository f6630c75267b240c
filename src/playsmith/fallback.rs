//! Deterministic fallback artifact for when generation is unusable.
//!
//! [`fallback_game`] is the crate's availability guarantee: pure, total, no
//! network, never fails. Whatever the upstream does, the caller always
//! receives *some* runnable artifact: a minimal but playable scaffold with a
//! title screen, a score counter, a start button and a trivial interaction
//! loop, rendered either on a canvas or with plain DOM elements.

use crate::playsmith::request::MiniGame;

/// Escape text destined for HTML interpolation.
///
/// The topic string is user input; a hostile topic must not be able to break
/// out of the scaffold's markup.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Encode text as a JS string literal safe to embed inside a `<script>`
/// block. `<` is unicode-escaped so a topic containing `</script>` cannot
/// terminate the block early.
fn js_string_literal(text: &str) -> String {
    serde_json::to_string(text)
        .unwrap_or_else(|_| "\"Game\"".to_string())
        .replace('<', "\\u003c")
}

/// Shared stylesheet for both scaffold variants.
const FALLBACK_STYLE: &str = r#"    body {
      font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
      margin: 0;
      padding: 20px;
      background-color: #f5f5f5;
      color: #333;
      display: flex;
      flex-direction: column;
      align-items: center;
      justify-content: center;
      min-height: 100vh;
      text-align: center;
    }
    .container {
      max-width: 800px;
      background-color: white;
      border-radius: 12px;
      padding: 20px;
      box-shadow: 0 4px 12px rgba(0,0,0,0.1);
    }
    h1 {
      color: #4F46E5;
      margin-bottom: 10px;
    }
    .game-instructions {
      background-color: #EEF2FF;
      border-left: 4px solid #4F46E5;
      padding: 15px;
      margin: 20px 0;
    }
    button {
      background-color: #4F46E5;
      color: white;
      border: none;
      padding: 10px 20px;
      border-radius: 6px;
      cursor: pointer;
      font-size: 16px;
      transition: background-color 0.2s;
    }
    button:hover {
      background-color: #4338CA;
    }
    #gameCanvas {
      border: 2px solid #4F46E5;
      border-radius: 8px;
      background-color: white;
      margin: 20px 0;
      max-width: 100%;
    }
    #gameArea {
      width: 600px;
      max-width: 100%;
      height: 400px;
      border: 2px solid #4F46E5;
      border-radius: 8px;
      margin: 20px 0;
    }
    #score {
      font-size: 24px;
      font-weight: bold;
      margin: 15px 0;
    }"#;

/// Canvas interaction loop: welcome screen, click-to-score, resize handling.
const CANVAS_SCRIPT: &str = r#"    const canvas = document.getElementById('gameCanvas');
    const ctx = canvas.getContext('2d');
    if (!ctx) { console.error('Canvas context not available'); }

    function resizeCanvas() {
      const container = canvas.parentElement;
      const maxWidth = container.clientWidth - 40;
      if (maxWidth < 600) {
        canvas.width = maxWidth;
        canvas.height = maxWidth * 2 / 3;
      } else {
        canvas.width = 600;
        canvas.height = 400;
      }
      if (gameActive) { drawGame(); } else { drawWelcome(); }
    }
    window.addEventListener('resize', resizeCanvas);

    function drawWelcome() {
      if (!ctx) return;
      ctx.clearRect(0, 0, canvas.width, canvas.height);
      ctx.fillStyle = '#f5f5f5';
      ctx.fillRect(0, 0, canvas.width, canvas.height);
      ctx.font = '24px Arial';
      ctx.fillStyle = '#4F46E5';
      ctx.textAlign = 'center';
      ctx.fillText(gameTitle, canvas.width / 2, canvas.height / 2 - 30);
      ctx.font = '16px Arial';
      ctx.fillStyle = '#333';
      ctx.fillText('Press Start to play!', canvas.width / 2, canvas.height / 2 + 10);
    }

    function drawGame() {
      if (!ctx) return;
      ctx.clearRect(0, 0, canvas.width, canvas.height);
      ctx.fillStyle = '#ffffff';
      ctx.fillRect(0, 0, canvas.width, canvas.height);
      ctx.font = '18px Arial';
      ctx.fillStyle = '#4F46E5';
      ctx.textAlign = 'start';
      ctx.fillText(gameTitle, 20, 30);
      ctx.textAlign = 'end';
      ctx.fillText('Score: ' + score, canvas.width - 20, 30);
      ctx.textAlign = 'center';
      ctx.fillStyle = '#333';
      ctx.fillText('Click the circle to score', canvas.width / 2, canvas.height - 20);
      ctx.beginPath();
      ctx.arc(canvas.width / 2, canvas.height / 2, 50, 0, Math.PI * 2);
      ctx.fillStyle = '#4F46E5';
      ctx.fill();
      ctx.closePath();
    }

    canvas.addEventListener('mousemove', function() {
      if (!gameActive) return;
      drawGame();
    });

    canvas.addEventListener('click', function() {
      if (!gameActive) return;
      score += 10;
      scoreElement.textContent = 'Score: ' + score;
      drawGame();
    });

    resizeCanvas();
    drawWelcome();"#;

/// DOM interaction loop: a grid of colored click targets.
const DOM_SCRIPT: &str = r#"    const gameArea = document.getElementById('gameArea');

    function getRandomColor() {
      const colors = ['#4F46E5', '#EC4899', '#8B5CF6', '#10B981', '#F59E0B', '#EF4444'];
      return colors[Math.floor(Math.random() * colors.length)];
    }

    function setupGameElements() {
      gameArea.innerHTML = '';

      const title = document.createElement('div');
      title.textContent = gameTitle;
      title.style.fontSize = '18px';
      title.style.color = '#4F46E5';
      title.style.margin = '20px 0';
      title.style.textAlign = 'center';

      const boxes = document.createElement('div');
      boxes.style.display = 'grid';
      boxes.style.gridTemplateColumns = 'repeat(2, 1fr)';
      boxes.style.gap = '10px';
      boxes.style.width = '80%';
      boxes.style.margin = '0 auto';

      for (let i = 0; i < 4; i++) {
        const box = document.createElement('div');
        box.style.backgroundColor = getRandomColor();
        box.style.width = '100%';
        box.style.height = '100px';
        box.style.borderRadius = '8px';
        box.style.cursor = 'pointer';
        box.addEventListener('click', function() {
          score += 5;
          scoreElement.textContent = 'Score: ' + score;
          this.style.backgroundColor = getRandomColor();
        });
        boxes.appendChild(box);
      }

      gameArea.appendChild(title);
      gameArea.appendChild(boxes);
    }"#;

/// Build the deterministic placeholder artifact for a topic.
///
/// # Example
///
/// ```rust
/// use playsmith::fallback_game;
///
/// let game = fallback_game("", true);
/// assert!(game.content.contains("<!DOCTYPE html>"));
/// assert!(!game.title.is_empty());
/// ```
pub fn fallback_game(topic: &str, use_canvas: bool) -> MiniGame {
    let trimmed = topic.trim();
    let title = if trimmed.is_empty() {
        "Interactive Game".to_string()
    } else {
        format!("Game: {}", trimmed)
    };
    let escaped_title = escape_html(&title);
    let escaped_topic = escape_html(if trimmed.is_empty() { "your topic" } else { trimmed });

    let surface = if use_canvas {
        r#"<canvas id="gameCanvas" width="600" height="400"></canvas>"#
    } else {
        r#"<div id="gameArea"></div>"#
    };
    let hint = if use_canvas {
        "Move your mouse or finger over the board and click to interact."
    } else {
        "Click the colored tiles to score points."
    };
    let loop_script = if use_canvas { CANVAS_SCRIPT } else { DOM_SCRIPT };
    let start_action = if use_canvas {
        "drawGame();"
    } else {
        "setupGameElements();"
    };

    let content = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <style>
{style}
  </style>
</head>
<body>
  <div class="container">
    <h1>{title}</h1>
    <p>Welcome to an interactive game about {topic}!</p>

    <div class="game-instructions">
      <h3>How to play</h3>
      <p>This is a simple placeholder game. Press Start to play!</p>
      <p>{hint}</p>
    </div>

    {surface}

    <div id="score">Score: 0</div>
    <button id="startBtn">Start</button>
  </div>

  <script>
    let score = 0;
    let gameActive = false;
    const gameTitle = {title_js};
    const startBtn = document.getElementById('startBtn');
    const scoreElement = document.getElementById('score');

{loop_script}

    startBtn.addEventListener('click', function() {{
      gameActive = true;
      score = 0;
      scoreElement.textContent = 'Score: 0';
      startBtn.textContent = 'Play again';
      {start_action}
    }});

    window.onerror = function(message, source, lineno, colno, error) {{
      console.error('Game error:', message);
      return true;
    }};
  </script>
</body>
</html>"#,
        title = escaped_title,
        style = FALLBACK_STYLE,
        topic = escaped_topic,
        hint = hint,
        surface = surface,
        title_js = js_string_literal(&title),
        loop_script = loop_script,
        start_action = start_action,
    );

    MiniGame {
        title,
        content,
        use_canvas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostile_topic_cannot_break_markup() {
        let game = fallback_game("<script>alert('x')</script>", false);
        assert!(!game.content.contains("<script>alert"));
        assert!(game.content.contains("&lt;script&gt;"));
    }

    #[test]
    fn empty_topic_still_yields_title_and_doctype() {
        let game = fallback_game("", true);
        assert!(game.content.starts_with("<!DOCTYPE html>"));
        assert_eq!(game.title, "Interactive Game");
    }

    #[test]
    fn canvas_flag_selects_surface() {
        assert!(fallback_game("planets", true).content.contains("gameCanvas"));
        assert!(fallback_game("planets", false).content.contains("gameArea"));
    }
}
