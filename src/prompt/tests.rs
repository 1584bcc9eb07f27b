use super::*;

fn pancakes() -> MinimalRecipe {
    MinimalRecipe {
        name: "Pancakes".to_string(),
        ingredients_with_quantities: vec!["2 eggs".to_string(), "1 cup flour".to_string()],
        instructions: vec!["Whisk.".to_string(), "Fry.".to_string()],
        category: Some("Breakfast".to_string()),
        calories: Some(320.0),
        total_time: Some("00:20".to_string()),
        rating: Some(4.5),
        images: Vec::new(),
    }
}

#[test]
fn prompt_sections_appear_in_order() {
    let history = vec![
        ChatMessage::user("Breakfast ideas?"),
        ChatMessage::assistant("How about pancakes?"),
        ChatMessage::user("How do I make them?"),
    ];
    let prompt = assemble_prompt("SYSTEM", &[pancakes()], &history, "How do I make them?");

    let positions: Vec<usize> = [
        "SYSTEM",
        CONTEXT_HEADER,
        "Recipe 1:\nName: Pancakes",
        HISTORY_HEADER,
        "User: Breakfast ideas?\nAssistant: How about pancakes?\nUser: How do I make them?",
        "The user asked: How do I make them?",
    ]
    .iter()
    .map(|part| prompt.find(part).expect("section present"))
    .collect();

    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(prompt.ends_with(ASSISTANT_CUE));
    assert!(!prompt.contains(NO_CONTEXT_TEXT));
}

#[test]
fn recipes_are_numbered_from_one() {
    let mut second = pancakes();
    second.name = "Waffles".to_string();

    let prompt = assemble_prompt("sys", &[pancakes(), second], &[], "hi");
    assert!(prompt.contains("Recipe 1:\nName: Pancakes"));
    assert!(prompt.contains("Recipe 2:\nName: Waffles"));
    assert!(!prompt.contains("Recipe 3:"));
}

#[test]
fn empty_context_uses_fallback_text() {
    let prompt = assemble_prompt("sys", &[], &[ChatMessage::user("hi")], "hi");
    assert!(prompt.contains(&format!("{CONTEXT_HEADER}\n{NO_CONTEXT_TEXT}\n{HISTORY_HEADER}")));
    assert!(!prompt.contains("Recipe 1:"));
}

#[test]
fn fallback_points_to_history_or_clarification() {
    let prompt = assemble_prompt("sys", &[], &[ChatMessage::user("something warm")], "hm");
    let context = prompt
        .split(HISTORY_HEADER)
        .next()
        .expect("context section comes first")
        .to_lowercase();

    assert!(context.contains("no context was retrieved"));
    assert!(context.contains("conversation history"));
    assert!(context.contains("clarify"));
    assert!(!context.contains("general cooking knowledge"));
}

#[test]
fn plain_message_gets_only_the_preamble() {
    assert_eq!(generate_system_prompt("hello there"), BASE_SYSTEM_PROMPT);
}

#[test]
fn matching_guidance_blocks_combine() {
    let prompt = generate_system_prompt("Quick vegan dinner with high protein?");

    assert!(prompt.starts_with(BASE_SYSTEM_PROMPT));
    assert!(prompt.contains("dietary restriction"));
    assert!(prompt.contains("short on time"));
    assert!(prompt.contains("nutritional information"));
    assert!(!prompt.contains("substitutions"));
}

#[test]
fn guidance_matching_ignores_case() {
    let prompt = generate_system_prompt("What can I SUBSTITUTE for butter?");
    assert!(prompt.contains("substitutions"));
}
