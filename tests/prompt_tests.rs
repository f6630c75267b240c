use playsmith::{build_prompt, Difficulty, GameSettings, GenerationRequest, Language};

fn settings() -> GameSettings {
    GameSettings::default()
}

#[test]
fn short_table_topic_is_expanded_in_prompt() {
    // "puzzle" is six characters and a known-ambiguous keyword: the prompt
    // must embed the expanded phrase, not the bare word.
    let request = GenerationRequest::new("puzzle", &settings());
    let prompt = build_prompt(&request);

    assert!(prompt.contains("jigsaw puzzle game with draggable pieces"));
    assert!(!prompt.contains("about \"puzzle\""));
    // The request itself still carries the user's literal input.
    assert_eq!(request.topic, "puzzle");
}

#[test]
fn descriptive_topic_is_interpolated_verbatim() {
    let request = GenerationRequest::new("photosynthesis in tropical plants", &settings());
    let prompt = build_prompt(&request);
    assert!(prompt.contains("photosynthesis in tropical plants"));
}

#[test]
fn short_unknown_topic_gets_generic_wrapper() {
    let request = GenerationRequest::new("frogs", &settings());
    let prompt = build_prompt(&request);
    assert!(prompt.contains("a simple interactive game about frogs"));
}

#[test]
fn prompt_embeds_output_format_contract() {
    let request = GenerationRequest::new("the solar system", &settings());
    let prompt = build_prompt(&request);

    assert!(prompt.contains("COMPLETE, VALID HTML document"));
    assert!(prompt.contains("DOCTYPE"));
    assert!(prompt.contains("SINGLE <script> tag at the END of the body"));
    assert!(prompt.contains("SINGLE <style> tag in the head"));
    assert!(prompt.contains("DO NOT use markdown code blocks"));
    assert!(prompt.contains("Return ONLY the complete HTML document"));
}

#[test]
fn canvas_flag_controls_canvas_requirements() {
    let mut with_canvas = settings();
    with_canvas.use_canvas = true;
    let prompt = build_prompt(&GenerationRequest::new("the solar system", &with_canvas));
    assert!(prompt.contains("CANVAS IMPLEMENTATION RULES"));
    assert!(prompt.contains("requestAnimationFrame"));
    assert!(prompt.contains("touch events"));
    assert!(prompt.contains("Use HTML5 Canvas for the game"));

    let mut without_canvas = settings();
    without_canvas.use_canvas = false;
    let prompt = build_prompt(&GenerationRequest::new("the solar system", &without_canvas));
    assert!(!prompt.contains("CANVAS IMPLEMENTATION RULES"));
    assert!(prompt.contains("Use DOM manipulation for the game"));
}

#[test]
fn prompt_reflects_settings() {
    let custom = GameSettings {
        difficulty: Difficulty::Hard,
        category: "history".to_string(),
        language: Language::Vi,
        use_canvas: false,
        question_count: Some(12),
        time_per_question: Some(30),
    };
    let prompt = build_prompt(&GenerationRequest::new("world war two aviation", &custom));

    assert!(prompt.contains("Difficulty level: hard"));
    assert!(prompt.contains("Category: history"));
    assert!(prompt.contains("Main language: Vietnamese"));
    assert!(prompt.contains("Number of questions/elements: 12"));
    assert!(prompt.contains("Time per question: 30 seconds"));
}

#[test]
fn prompt_is_deterministic_and_total() {
    for topic in ["", " ", "ü", "<script>", "a very long and descriptive topic string"] {
        let request = GenerationRequest::new(topic, &settings());
        let first = build_prompt(&request);
        let second = build_prompt(&request);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}

#[test]
fn error_handling_requirements_are_always_present() {
    let request = GenerationRequest::new("volcanoes", &settings());
    let prompt = build_prompt(&request);
    assert!(prompt.contains("window.onerror"));
}
