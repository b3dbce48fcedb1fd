//! System instruction and response schema for recap generation.

use serde_json::{json, Value};

use crate::upstream::Style;

fn style_guidance(style: Style) -> &'static str {
    match style {
        Style::Concise => "Keep it short. Cover only the points that matter most.",
        Style::Detailed => {
            "Be thorough. Include context, the main threads of discussion and how each was resolved."
        }
        Style::Bullet => "Write the recap as bullet points grouped under clear headings.",
        Style::Casual => "Write in a relaxed, friendly tone, as if catching up a friend.",
        Style::Formal => "Write in a professional, structured tone suitable for work or study.",
    }
}

/// Build the instruction that frames the model as a conversation analyst.
pub fn system_instruction(style: Style, days: Option<u32>) -> String {
    let mut out = String::from(
        "You analyze chat conversations and extract structured information from them.\n\n",
    );

    out.push_str("Style: ");
    out.push_str(style_guidance(style));
    out.push_str("\n\n");

    if let Some(days) = days {
        let period = if days == 1 {
            "day".to_string()
        } else {
            format!("{days} days")
        };
        out.push_str(&format!(
            "Focus on messages from the last {period} of the conversation.\n\n"
        ));
    }

    out.push_str(
        "Reply with a JSON object with these fields:\n\
         - title: a short descriptive title reflecting the main topics\n\
         - participants: every distinct sender in the conversation\n\
         - recap: what was discussed, decided or concluded, written in the style above\n\n\
         Take participant names only from the sender label before the colon in lines such as \
         \"Name: message\". Do not add names that are only mentioned inside a message, and list \
         each sender once even if they appear under a nickname elsewhere.\n\n\
         Ignore system lines such as group creation notices, encryption notices, timestamps \
         and other metadata, which usually appear at the top of an export.",
    );

    out
}

/// JSON schema for the structured recap. All fields are required.
pub fn recap_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "Descriptive title for the conversation"
            },
            "participants": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Distinct sender names"
            },
            "recap": {
                "type": "STRING",
                "description": "Summary in the requested style"
            }
        },
        "required": ["title", "participants", "recap"]
    })
}
