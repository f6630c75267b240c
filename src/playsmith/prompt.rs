//! Prompt construction for the generative-content API.
//!
//! [`build_prompt`] is a pure, total function: any topic string in, one
//! deterministic instruction set out. The instruction blocks pin down the
//! output contract hard (a single complete HTML document, no markdown, no
//! prose) because everything downstream (the repair engine, the sandbox
//! host) is built around that shape.
//!
//! Very short topics historically produced degenerate model output, so a
//! topic under ten characters (or one that names a well-known game genre) is
//! swapped for a richer phrase from a fixed lookup before interpolation. The
//! user's original input is never modified; enrichment only affects the
//! rendered prompt.

use crate::playsmith::request::GenerationRequest;

/// Output-format contract embedded in every prompt.
pub const HTML_FORMAT_INSTRUCTIONS: &str = r#"
IMPORTANT FORMATTING RULES (FOLLOW THESE EXACTLY):
1. Your answer MUST be a COMPLETE, VALID HTML document with a proper DOCTYPE declaration.
2. Place ALL JavaScript in a SINGLE <script> tag at the END of the body section.
3. Place ALL CSS in a SINGLE <style> tag in the head section.
4. Use modern JavaScript (ES6+) with proper syntax and error handling.
5. DO NOT use external dependencies or CDN links.
6. DO NOT use markdown code blocks (``` or ~~~) in your response.
7. Make the game FULLY INTERACTIVE and TOUCH-FRIENDLY for mobile devices.
8. Include clear instructions for players directly in the game UI.
9. Make the game centered and responsive for both desktop and mobile.
10. Include a title and game description in the HTML.

EXAMPLE CODE STRUCTURE:
<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Your Game Title</title>
  <style>
    /* ALL CSS HERE */
  </style>
</head>
<body>
  <!-- Game HTML here -->

  <script>
    // ALL JavaScript code here
  </script>
</body>
</html>
"#;

/// Canvas-specific requirements, appended only when the request asks for a
/// canvas-rendered game.
pub const CANVAS_IMPLEMENTATION_INSTRUCTIONS: &str = r#"
CANVAS IMPLEMENTATION RULES:
1. Use proper error handling for canvas operations:
   - Check that the context is available after calling getContext
   - Include proper bounds checking in drawing functions
2. Add window resize handlers to keep the canvas responsive
3. Use requestAnimationFrame for animations
4. Include touch events for mobile compatibility
5. Use proper scaling for high-DPI screens

EXAMPLE CANVAS INITIALIZATION:
const canvas = document.getElementById('gameCanvas');
const ctx = canvas.getContext('2d');
if (!ctx) {
  console.error('Canvas rendering context not available');
  document.body.innerHTML = '<p>Your browser does not support canvas</p>';
  return;
}

function resizeCanvas() {
  const container = canvas.parentElement;
  canvas.width = container.clientWidth;
  canvas.height = container.clientHeight;
  drawGame();
}

window.addEventListener('resize', resizeCanvas);
resizeCanvas();
"#;

/// Defensive-coding requirements embedded in every prompt.
pub const ERROR_HANDLING_INSTRUCTIONS: &str = r#"
ERROR HANDLING REQUIREMENTS:
1. Add comprehensive error handling throughout the code
2. Include a global error handler with window.onerror
3. Always check for null/undefined before accessing properties
4. Handle all potential exceptions in event handlers
5. Provide fallback UI for any feature that might fail

EXAMPLE ERROR HANDLING:
window.onerror = function(message, source, lineno, colno, error) {
  console.error('Game error:', message, 'at line:', lineno);
  return true; // Prevents default error handling
};
"#;

/// Topics shorter than this are considered too thin to prompt with directly.
const MIN_TOPIC_LEN: usize = 10;

/// Fixed keyword → expansion lookup for well-known but under-specified
/// topics. First match wins; matching is case-insensitive substring.
const TOPIC_ENRICHMENT: &[(&str, &str)] = &[
    (
        "flappy bird",
        "a flappy-bird-style game where a character flies through gaps between obstacles",
    ),
    (
        "tic tac toe",
        "a tic tac toe game played on a 3x3 grid against a simple computer opponent",
    ),
    (
        "word search",
        "a word search puzzle where players find hidden words in a letter grid",
    ),
    (
        "puzzle",
        "a jigsaw puzzle game with draggable pieces that assemble into a complete picture",
    ),
    (
        "tetris",
        "a tetris-style game with falling blocks that players rotate and stack",
    ),
    (
        "snake",
        "the classic snake game where the snake grows as it eats food and must avoid itself",
    ),
    (
        "quiz",
        "a multiple-choice quiz game with varied questions, scoring and feedback",
    ),
    (
        "memory",
        "a memory game where players flip cards to find matching pairs",
    ),
    (
        "matching",
        "a matching game where players pair related items such as terms and definitions",
    ),
    (
        "sudoku",
        "a sudoku game with a number grid the player completes cell by cell",
    ),
    (
        "hangman",
        "a hangman word-guessing game with letter-by-letter reveals",
    ),
    (
        "racing",
        "a racing game with obstacles to dodge and increasing speed",
    ),
    (
        "shooting",
        "a target-shooting game with moving targets and a score counter",
    ),
];

/// Expand a topic that is too short or matches a known-ambiguous keyword.
///
/// Returns the topic unchanged when it is already descriptive enough.
fn enrich_topic(topic: &str) -> String {
    // Counted in characters, not bytes; Vietnamese topics are multi-byte.
    let topic_len = topic.chars().count();
    let lowered = topic.to_lowercase();
    let table_hit = TOPIC_ENRICHMENT
        .iter()
        .any(|(key, _)| lowered.contains(key));

    if topic_len < MIN_TOPIC_LEN || table_hit {
        for (key, expansion) in TOPIC_ENRICHMENT {
            if lowered.contains(key) {
                return (*expansion).to_string();
            }
        }
        if topic_len < MIN_TOPIC_LEN {
            return format!(
                "a simple interactive game about {} with a friendly, easy-to-use interface",
                topic
            );
        }
    }

    topic.to_string()
}

/// Build the full model prompt for a generation request.
///
/// Deterministic and side-effect free; total over any topic string.
///
/// # Example
///
/// ```rust
/// use playsmith::{build_prompt, GameSettings, GenerationRequest};
///
/// let request = GenerationRequest::new("solar system", &GameSettings::default());
/// let prompt = build_prompt(&request);
/// assert!(prompt.contains("solar system"));
/// assert!(prompt.contains("DOCTYPE"));
/// ```
pub fn build_prompt(request: &GenerationRequest) -> String {
    let enriched_topic = enrich_topic(&request.topic);
    let rendering = if request.use_canvas {
        "HTML5 Canvas"
    } else {
        "DOM manipulation"
    };

    let mut prompt = format!(
        "Create an interactive HTML5 mini-game about \"{topic}\" for educational purposes.\n\
         {format_rules}\n\
         Game Requirements:\n\
         - Difficulty level: {difficulty}\n\
         - Category: {category}\n\
         - Main language: {language}\n\
         - Use {rendering} for the game\n\
         - Make the game educational and fun\n\
         - Include clear instructions for players\n\
         - Add scoring and progress tracking\n\
         - Make it responsive for both desktop and mobile devices\n\
         - Include a title screen and a game-over screen\n\
         - Implement touch controls for mobile devices\n",
        topic = enriched_topic,
        format_rules = HTML_FORMAT_INSTRUCTIONS,
        difficulty = request.difficulty.as_str(),
        category = request.category,
        language = request.language.display_name(),
        rendering = rendering,
    );

    if let Some(count) = request.question_count {
        prompt.push_str(&format!("- Number of questions/elements: {}\n", count));
    }
    if let Some(seconds) = request.time_per_question {
        prompt.push_str(&format!("- Time per question: {} seconds\n", seconds));
    }

    if request.use_canvas {
        prompt.push_str(CANVAS_IMPLEMENTATION_INSTRUCTIONS);
    }
    prompt.push_str(ERROR_HANDLING_INSTRUCTIONS);

    prompt.push_str(
        "\nIMPORTANT: Return ONLY the complete HTML document. Do not include any \
         explanation, commentary, or markdown syntax around your code.\n",
    );

    prompt
}
