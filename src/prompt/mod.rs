// Prompt assembly
// Builds the model prompt from the system guidance, retrieved recipes and the conversation

#[cfg(test)]
mod tests;

use fancy_regex::Regex;
use itertools::Itertools;
use std::fmt::Write as _;
use std::sync::LazyLock;
use tracing::debug;

use crate::chat::ChatMessage;
use crate::recipes::MinimalRecipe;

pub const CONTEXT_HEADER: &str = "[Context Retrieved from Knowledge Base]";
pub const HISTORY_HEADER: &str = "[Conversation History]";
pub const NO_CONTEXT_TEXT: &str = "No context was retrieved from the knowledge base. \
     Respond using the conversation history, or ask the user to clarify what they are looking for.";
pub const ASSISTANT_CUE: &str = "Assistant:";

const BASE_SYSTEM_PROMPT: &str = "You are a friendly and knowledgeable cooking assistant. \
     Answer using the recipes from the knowledge base when they are relevant. \
     Keep answers clear and well structured, list ingredients with their quantities \
     and number the preparation steps. \
     Never invent recipes that contradict the retrieved context.";

/// Guidance appended to the system prompt when the user's message matches
struct Guidance {
    pattern: Regex,
    text: &'static str,
}

static GUIDANCE_BANK: LazyLock<Vec<Guidance>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(i have|i've got|leftover|using|with)\b",
            "The user is working from ingredients they already have. Prefer recipes \
             that use most of them and point out anything extra they would need.",
        ),
        (
            r"(?i)\b(vegan|vegetarian|gluten[- ]free|keto|halal|dairy[- ]free|diet)\b",
            "Respect the dietary restriction strictly. Flag any ingredient in a \
             retrieved recipe that breaks it and suggest a compliant alternative.",
        ),
        (
            r"(?i)\b(calories|nutrition|nutritional|protein|carbs|fat|healthy)\b",
            "Include the nutritional information available for each recipe and say \
             when a value is missing rather than guessing.",
        ),
        (
            r"(?i)\b(quick|fast|minutes|under|less than|hurry)\b",
            "The user is short on time. Mention the total time of each recipe and \
             favour the fastest options.",
        ),
        (
            r"(?i)\b(substitute|substitution|replace|instead of|swap)\b",
            "Suggest practical ingredient substitutions and explain how they change \
             the result.",
        ),
        (
            r"(?i)\b(next step|what's next|then|after that|step)\b",
            "Guide the user one step at a time and wait for them before moving on.",
        ),
        (
            r"(?i)\b(best|top|highest rated|popular)\b",
            "Rank the recipes by their rating and mention it in the answer.",
        ),
    ]
    .into_iter()
    .map(|(pattern, text)| Guidance {
        pattern: Regex::new(pattern).expect("valid regex"),
        text,
    })
    .collect()
});

/// System prompt for `latest`: the base preamble plus every guidance block whose
/// pattern matches the message.
#[inline]
pub fn generate_system_prompt(latest: &str) -> String {
    let matched = GUIDANCE_BANK
        .iter()
        .filter(|guidance| guidance.pattern.is_match(latest).unwrap_or(false))
        .map(|guidance| guidance.text)
        .collect_vec();
    debug!("System prompt uses {} guidance blocks", matched.len());

    if matched.is_empty() {
        BASE_SYSTEM_PROMPT.to_string()
    } else {
        format!("{}\n\n{}", BASE_SYSTEM_PROMPT, matched.iter().join("\n\n"))
    }
}

/// Concatenate the system prompt, retrieved context, conversation history and
/// latest message into one prompt ending with the assistant cue.
#[inline]
pub fn assemble_prompt(
    system_prompt: &str,
    records: &[MinimalRecipe],
    history: &[ChatMessage],
    latest: &str,
) -> String {
    let mut prompt = String::with_capacity(system_prompt.len() + latest.len() + 1024);

    // Writing into a String cannot fail
    let _ = writeln!(prompt, "{system_prompt}");
    let _ = writeln!(prompt, "{CONTEXT_HEADER}");
    if records.is_empty() {
        let _ = writeln!(prompt, "{NO_CONTEXT_TEXT}");
    }
    for (position, record) in records.iter().enumerate() {
        let _ = write!(prompt, "Recipe {}:\n{record}", position + 1);
    }

    let _ = writeln!(prompt, "{HISTORY_HEADER}");
    for message in history {
        let _ = writeln!(prompt, "{}: {}", message.role, message.content);
    }

    let _ = write!(prompt, "\nThe user asked: {latest}\n{ASSISTANT_CUE}");
    prompt
}
