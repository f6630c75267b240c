//! Defensive repair pipeline for raw model output.
//!
//! Model responses are frequently *almost* valid: fenced in markdown, missing
//! the document shell, interpolating `${...}` inside plain quotes, or leaning
//! on globals that were never initialised. [`repair`] runs a fixed sequence
//! of text-transform passes that turn such output into a syntactically
//! defensible, self-contained HTML document.
//!
//! Every pass consumes and returns a full document string, so passes stay
//! independently testable and order-dependent only where documented (fence
//! stripping must precede template-literal repair; shape normalization must
//! precede error-handler injection so a `</body>` tag exists). Every pass is
//! safe to run on already-correct input: no double doctype, no duplicate
//! error handler, no re-wrapped guards.
//!
//! The passes operate on raw text, not a syntax tree. That is a deliberate,
//! best-effort trade-off: the pipeline can only fix a fixed set of
//! structural anti-patterns and can over-fire (the `.length` wrap touches
//! bare identifiers that were never null). It cannot detect semantic game
//! bugs.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Result of the repair pipeline: a displayable title and the repaired
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedDocument {
    pub title: String,
    pub content: String,
}

/// Title used when nothing better can be extracted.
const DEFAULT_TITLE: &str = "Interactive Game";

lazy_static! {
    static ref FENCE_MARKER: Regex = Regex::new(r"```(?:html|css|javascript|js)?").unwrap();
    static ref HTML_BLOCK: Regex = Regex::new(r"(?i)<html[\s\S]*?</html>").unwrap();
    static ref TEMPLATE_IN_QUOTES: Regex = Regex::new(
        r#"(\w+\.(?:style\.transform|innerHTML|textContent|innerText)\s*=\s*)(['"])?([^'"`;]*)\$\{([^}]+)\}([^'"`;]*)(['"])?;?"#
    )
    .unwrap();
    static ref PLACEHOLDER_PARAM: Regex = Regex::new(r"function\s+(\w+)\s*\(\$(\d+)\)").unwrap();
    static ref CANVAS_CONTEXT: Regex =
        Regex::new(r#"const\s+ctx\s*=\s*canvas\.getContext\(['"]2d['"]\);"#).unwrap();
    static ref CSS_COMMENT_BLOCK: Regex =
        Regex::new(r"(?i)/\*\s*CSS\s*\*/([\s\S]*?)/\*\s*End\s*CSS\s*\*/").unwrap();
    static ref LOOSE_NULL_COMPARE: Regex =
        Regex::new(r"if\s*\(\s*(\w+)\s*==\s*(null|undefined)\s*\)").unwrap();
    static ref LISTENER_BY_NAME: Regex =
        Regex::new(r#"addEventListener\(\s*['"](\w+)['"]\s*,\s*(\w+)\s*\)"#).unwrap();
    static ref BARE_LENGTH: Regex = Regex::new(r"([^.\w$]|^)([A-Za-z_]\w*)\.length").unwrap();
    static ref TITLE_TAG: Regex = Regex::new(r"(?is)<title>(.*?)</title>").unwrap();
    static ref H1_TAG: Regex = Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap();
    static ref BODY_TAG: Regex = Regex::new(r"(?i)<body[^>]*>([\s\S]*)").unwrap();
    static ref ANY_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Run the full repair pipeline on raw model output.
pub fn repair(raw: &str) -> RepairedDocument {
    let mut content = strip_fences(raw);
    content = normalize_document_shape(&content);
    content = fix_template_literals(&content);
    content = fix_placeholder_parameters(&content);
    content = inject_canvas_guard(&content);
    content = rewrap_css_block(&content);
    content = inject_global_error_handler(&content);
    content = fix_common_syntax_errors(&content);
    let title = extract_title(&content);

    RepairedDocument { title, content }
}

/// Pass 1: drop markdown fence markers and leading/trailing stray
/// backticks.
///
/// Interior backticks are left alone: legitimate template literals inside an
/// already-correct document must survive a re-run.
pub(crate) fn strip_fences(raw: &str) -> String {
    let without_fences = FENCE_MARKER.replace_all(raw, "");
    without_fences
        .trim()
        .trim_matches('`')
        .trim()
        .to_string()
}

/// Pass 2: guarantee a full document shell.
///
/// Prefers promoting an embedded `<html>...</html>` block; synthesizes the
/// minimal skeleton only when no shell exists at all.
pub(crate) fn normalize_document_shape(text: &str) -> String {
    let lowered = text.to_lowercase();
    if lowered.contains("<!doctype html") {
        return text.to_string();
    }

    if let Some(found) = HTML_BLOCK.find(text) {
        log::warn!("repair: document lacked DOCTYPE, promoting embedded <html> block");
        return format!("<!DOCTYPE html>\n{}", found.as_str());
    }
    if lowered.contains("<html") {
        // An <html> open tag without a matching close; keep whatever follows.
        return format!("<!DOCTYPE html>\n{}", text);
    }

    log::warn!("repair: no HTML shell found, wrapping raw text in a skeleton");
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         \x20 <meta charset=\"UTF-8\">\n\
         \x20 <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         \x20 <title>{}</title>\n\
         </head>\n\
         <body>\n\
         {}\n\
         </body>\n\
         </html>",
        DEFAULT_TITLE, text
    )
}

/// Pass 3: rewrite `${...}` interpolation trapped inside plain quotes to
/// back-tick template syntax.
///
/// Limited to the property sinks models actually get wrong; values already
/// using back-ticks do not match and stay untouched.
pub(crate) fn fix_template_literals(text: &str) -> String {
    TEMPLATE_IN_QUOTES
        .replace_all(text, |caps: &Captures| {
            let open = caps.get(2);
            let close = caps.get(6);
            if open.is_none() && close.is_none() {
                // Unquoted (or already templated); not ours to touch.
                return caps[0].to_string();
            }
            format!("{}`{}${{{}}}{}`;", &caps[1], &caps[3], &caps[4], &caps[5])
        })
        .into_owned()
}

/// Curated parameter lists for well-known game-loop function names.
fn curated_parameters(name: &str) -> Option<&'static str> {
    match name {
        "drawSegment" => Some("index"),
        "getWinningSegment" => Some("finalAngle"),
        "updateScore" => Some("points"),
        "checkAnswer" => Some("selectedOption"),
        "spinWheel" | "drawWheel" | "startGame" | "endGame" | "resetGame" => Some(""),
        _ => None,
    }
}

/// Pass 4: replace `function name($N)` placeholder parameter lists.
pub(crate) fn fix_placeholder_parameters(text: &str) -> String {
    PLACEHOLDER_PARAM
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let number = &caps[2];
            match curated_parameters(name) {
                Some(params) => {
                    log::debug!("repair: restored parameters for function {}", name);
                    format!("function {}({})", name, params)
                }
                None => format!("function {}(param{})", name, number),
            }
        })
        .into_owned()
}

/// Pass 5: guard `canvas.getContext('2d')` against a null context.
pub(crate) fn inject_canvas_guard(text: &str) -> String {
    if !text.contains("getContext") || text.contains("if (!ctx)") {
        return text.to_string();
    }
    CANVAS_CONTEXT
        .replace_all(
            text,
            "const ctx = canvas.getContext('2d');\n\
             \x20 if (!ctx) { console.error('Canvas context not available'); return; }",
        )
        .into_owned()
}

/// Pass 6: rewrap a `/* CSS */ ... /* End CSS */` region that escaped its
/// `<style>` tag.
pub(crate) fn rewrap_css_block(text: &str) -> String {
    if let Some(caps) = CSS_COMMENT_BLOCK.captures(text) {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if !whole.contains("<style>") {
            let inner = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            return text.replacen(whole, &format!("<style>\n{}\n</style>", inner), 1);
        }
    }
    text.to_string()
}

/// Pass 7: inject a global `window.onerror` handler when none is present.
///
/// The handler logs structured details and returns `true` to suppress the
/// default browser propagation; with the sandbox relay in place those logs
/// travel to the host instead of dying inside the frame.
pub(crate) fn inject_global_error_handler(text: &str) -> String {
    if text.contains("window.onerror") {
        return text.to_string();
    }

    let handler = "  <script>\n\
                   \x20   window.onerror = (message, source, lineno, colno, error) => {\n\
                   \x20     console.error('Game error:', { message, source, lineno, colno, stack: error?.stack });\n\
                   \x20     return true;\n\
                   \x20   };\n\
                   \x20 </script>";

    if text.contains("</body>") {
        text.replacen("</body>", &format!("{}\n</body>", handler), 1)
    } else if text.contains("</html>") {
        text.replacen("</html>", &format!("{}\n</html>", handler), 1)
    } else {
        format!("{}\n{}", text, handler)
    }
}

/// Pass 8: a small set of syntactic normalizations for habits the model
/// keeps falling into.
pub(crate) fn fix_common_syntax_errors(text: &str) -> String {
    // Loose equality against null/undefined becomes strict.
    let mut fixed = LOOSE_NULL_COMPARE
        .replace_all(text, "if ($1 === $2)")
        .into_owned();

    // Named-handler registrations are normalized only when the handler is
    // actually declared in this document; undeclared names are left alone.
    let snapshot = fixed.clone();
    fixed = LISTENER_BY_NAME
        .replace_all(&fixed, |caps: &Captures| {
            let event = &caps[1];
            let handler = &caps[2];
            if is_declared_function(&snapshot, handler) {
                format!("addEventListener('{}', {})", event, handler)
            } else {
                log::debug!("repair: leaving undeclared handler '{}' untouched", handler);
                caps[0].to_string()
            }
        })
        .into_owned();

    // `.length` on a bare identifier gets a nullish empty-array fallback.
    // Best-effort: also wraps identifiers that are never null, but member
    // chains (a.b.length) are excluded so no syntax is ever corrupted.
    fixed = BARE_LENGTH
        .replace_all(&fixed, |caps: &Captures| {
            format!("{}({} || []).length", &caps[1], &caps[2])
        })
        .into_owned();

    fixed
}

/// Whether `name` is declared as a function (declaration or const binding)
/// anywhere in the document.
fn is_declared_function(text: &str, name: &str) -> bool {
    let declaration = format!("function {}", name);
    let binding = format!("const {} =", name);
    let let_binding = format!("let {} =", name);
    text.contains(&declaration) || text.contains(&binding) || text.contains(&let_binding)
}

/// Pass 9: pick a display title.
///
/// Preference order: `<title>` contents, first `<h1>` (inner tags stripped),
/// the first six words of visible body text, then the default.
pub(crate) fn extract_title(content: &str) -> String {
    if let Some(caps) = TITLE_TAG.captures(content) {
        let title = caps[1].trim().to_string();
        if !title.is_empty() {
            return title;
        }
    }

    if let Some(caps) = H1_TAG.captures(content) {
        let stripped = ANY_TAG.replace_all(&caps[1], "");
        let title = stripped.trim().to_string();
        if !title.is_empty() {
            return title;
        }
    }

    if let Some(caps) = BODY_TAG.captures(content) {
        let stripped = ANY_TAG.replace_all(&caps[1], " ");
        let words: Vec<&str> = stripped.split_whitespace().take(6).collect();
        if !words.is_empty() {
            return words.join(" ");
        }
    }

    DEFAULT_TITLE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped_backticks_in_body_survive() {
        let raw = "```html\n<!DOCTYPE html><html><body><script>const a = `x${y}z`;</script></body></html>\n```";
        let cleaned = strip_fences(raw);
        assert!(!cleaned.contains("```"));
        assert!(cleaned.contains("`x${y}z`"));
    }

    #[test]
    fn embedded_html_block_is_promoted() {
        let raw = "Here is your game:\n<html><body><p>hi</p></body></html>\nEnjoy!";
        let shaped = normalize_document_shape(raw);
        assert!(shaped.starts_with("<!DOCTYPE html>"));
        assert!(shaped.ends_with("</html>"));
        assert!(!shaped.contains("Enjoy!"));
    }

    #[test]
    fn bare_text_is_wrapped_in_skeleton() {
        let shaped = normalize_document_shape("<p>fragment</p>");
        assert!(shaped.contains("<!DOCTYPE html>"));
        assert!(shaped.contains("<meta name=\"viewport\""));
        assert!(shaped.contains("</body>"));
    }

    #[test]
    fn quoted_interpolation_becomes_template_literal() {
        let fixed = fix_template_literals(r#"el.textContent = "Score: ${score}";"#);
        assert_eq!(fixed, "el.textContent = `Score: ${score}`;");
    }

    #[test]
    fn backticked_interpolation_is_untouched() {
        let input = "el.textContent = `Score: ${score}`;";
        assert_eq!(fix_template_literals(input), input);
    }

    #[test]
    fn curated_and_generic_parameters() {
        let fixed = fix_placeholder_parameters("function drawSegment($2) {}\nfunction mystery($3) {}");
        assert!(fixed.contains("function drawSegment(index)"));
        assert!(fixed.contains("function mystery(param3)"));
    }

    #[test]
    fn existing_guard_suppresses_injection() {
        let input = "const ctx = canvas.getContext('2d');\nif (!ctx) { return; }";
        assert_eq!(inject_canvas_guard(input), input);
    }

    #[test]
    fn css_comment_region_is_rewrapped() {
        let input = "<head>/* CSS */ body { color: red; } /* End CSS */</head>";
        let fixed = rewrap_css_block(input);
        assert!(fixed.contains("<style>"));
        assert!(fixed.contains("body { color: red; }"));
        assert!(!fixed.contains("/* CSS */"));
    }

    #[test]
    fn error_handler_is_injected_once() {
        let input = "<html><body><p>x</p></body></html>";
        let once = inject_global_error_handler(input);
        assert_eq!(once.matches("window.onerror").count(), 1);
        let twice = inject_global_error_handler(&once);
        assert_eq!(twice.matches("window.onerror").count(), 1);
    }

    #[test]
    fn member_chain_length_is_not_wrapped() {
        let fixed = fix_common_syntax_errors("const n = state.items.length;");
        assert!(fixed.contains("state.(items || []).length") == false);
        assert!(fixed.contains("state.items.length"));
    }

    #[test]
    fn bare_length_is_wrapped_and_stable() {
        let once = fix_common_syntax_errors("const n = items.length;");
        assert_eq!(once, "const n = (items || []).length;");
        assert_eq!(fix_common_syntax_errors(&once), once);
    }

    #[test]
    fn strict_equality_is_not_degraded() {
        let input = "if (x === null) {}";
        assert_eq!(fix_common_syntax_errors(input), input);
    }

    #[test]
    fn undeclared_listener_is_left_alone() {
        let input = "el.addEventListener('click',  mystery)";
        assert_eq!(fix_common_syntax_errors(input), input);
    }

    #[test]
    fn declared_listener_is_normalized() {
        let input = "function onClick() {}\nel.addEventListener( 'click' ,  onClick )";
        let fixed = fix_common_syntax_errors(input);
        assert!(fixed.contains("addEventListener('click', onClick)"));
    }

    #[test]
    fn title_preference_order() {
        assert_eq!(
            extract_title("<title>Planet Hop</title><h1>ignored</h1>"),
            "Planet Hop"
        );
        assert_eq!(
            extract_title("<h1><span>Word</span> Safari</h1>"),
            "Word Safari"
        );
        assert_eq!(
            extract_title("<body>one two three four five six seven</body>"),
            "one two three four five six"
        );
        assert_eq!(extract_title("<div></div>"), "Interactive Game");
    }
}
