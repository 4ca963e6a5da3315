//! Prompt and schema construction for flashcard generation.

use serde_json::{json, Value};

/// System prompt for the flashcard generation task. Counts are filled
/// in from the generator configuration.
pub fn flashcard_system_prompt(min_cards: usize, max_cards: usize) -> String {
    format!(
        "You are a helpful AI assistant that generates flashcards from provided text.\n\
         Your task is to create a set of question-answer pairs that effectively capture the key concepts from the text.\n\
         Each flashcard should have a clear question on the front and a concise answer on the back.\n\
         Follow these guidelines:\n\
         1. Create {min_cards}-{max_cards} flashcards depending on the content density\n\
         2. Focus on the most important concepts\n\
         3. Make questions specific and unambiguous\n\
         4. Keep answers concise but complete\n\
         5. Avoid yes/no questions\n\
         6. Use proper terminology from the text\n\
         7. Format output as a JSON array of objects with 'front' and 'back' properties"
    )
}

/// JSON schema for an array of `{front, back}` cards with declared
/// item-count bounds.
pub fn suggestion_schema(min_items: usize, max_items: usize) -> Value {
    json!({
        "type": "array",
        "minItems": min_items,
        "maxItems": max_items,
        "items": {
            "type": "object",
            "properties": {
                "front": { "type": "string" },
                "back": { "type": "string" }
            },
            "required": ["front", "back"]
        }
    })
}

/// Schema instruction block appended to the system message. The provider
/// cannot be trusted to enforce a JSON mode, so the contract is textual.
pub(crate) fn schema_instructions(schema: &Value) -> String {
    let schema_text = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "\n\nIMPORTANT: Your response must be a valid JSON array of objects matching this schema:\n\
         {schema_text}\n\n\
         Do not include any text before or after the JSON. Return ONLY the JSON array."
    )
}

/// Reminder appended to the trailing user message of a structured call.
pub(crate) const JSON_ARRAY_REMINDER: &str = "\n\nIMPORTANT: Return ONLY a JSON array of objects. Example format:\n\
[\n\
  {\n\
    \"front\": \"Question here?\",\n\
    \"back\": \"Answer here\"\n\
  }\n\
]\n\
Do not include any text before or after the JSON array. Do not include schema description.";
