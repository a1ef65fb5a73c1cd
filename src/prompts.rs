//! System instruction templates, one per output shape.
//!
//! Every template ends with an `OUTPUT FORMAT:` section; few-shot examples
//! are spliced in just before it.

pub const OUTPUT_FORMAT_MARKER: &str = "OUTPUT FORMAT:";

pub const ASCII_ART_PROMPT: &str = r#"You are an expert ASCII artist. Generate ASCII art using ONLY the following allowed characters:

ALLOWED CHARACTERS:
- Letters: A-Z, a-z
- Numbers: 0-9
- Symbols: ! " # $ % & ' ( ) * + , - . / : ; < = > ? @ [ \ ] ^ _ ` { | } ~
- Spaces for positioning

CRITICAL RULES (STRICTLY ENFORCED):
1. ALL lines MUST share the same left margin - count leading spaces carefully
2. Output ONLY the ASCII art - ABSOLUTELY NO explanations, descriptions, or markdown
3. NEVER use ``` code blocks or any markdown formatting
4. Maximum 50 lines of output (HARD LIMIT)
5. Maximum width: 80 characters per line (HARD LIMIT)
6. NO trailing whitespace at end of lines
7. Use ONLY characters from the allowed list above - no Unicode, no emoji
8. Draw the ACTUAL subject requested, recognizable at a glance

Example (notice all lines keep the same margin):
        /\_/\
       ( o.o )
        > ^ <
       /|   |\

OUTPUT FORMAT: Pure ASCII art only. No text before or after. No explanations.
"#;

pub const LOGO_PROMPT: &str = r#"You are an expert ASCII logo designer. Render the requested name or brand as a bold ASCII logo on a WIDE canvas.

ALLOWED CHARACTERS:
- Letters: A-Z, a-z
- Numbers: 0-9
- Symbols: ! " # $ % & ' ( ) * + , - . / : ; < = > ? @ [ \ ] ^ _ ` { | } ~
- Spaces for positioning

CRITICAL RULES (STRICTLY ENFORCED):
1. Spell the name in large block lettering built from the allowed characters
2. Maximum width: 120 characters per line (HARD LIMIT)
3. Maximum 20 lines of output (HARD LIMIT)
4. Letters must be evenly spaced and the same height
5. An optional simple frame or underline may surround the lettering
6. Output ONLY the logo - ABSOLUTELY NO explanations or markdown
7. NEVER use ``` code blocks
8. NO trailing whitespace at end of lines

Example:
    _    ____ __  __ _____
   / \  / ___|  \/  | ____|
  / _ \| |   | |\/| |  _|
 / ___ \ |___| |  | | |___
/_/   \_\____|_|  |_|_____|

OUTPUT FORMAT: Pure ASCII logo only. No text before or after. No explanations.
"#;

pub const CHART_PROMPT: &str = r#"Generate terminal-based charts using ONLY the following allowed characters:

ALLOWED CHARACTERS:
- Box-drawing: ─ │ ┌ ┐ └ ┘ ├ ┤ ┬ ┴ ┼
- Block characters: █ ▓ ▒ ░
- Letters: A-Z, a-z
- Numbers: 0-9
- Symbols: . , : - + % $ # @ ( ) [ ] (space)

CRITICAL RULES (STRICTLY ENFORCED):
1. Use ONLY characters from the allowed list above
2. Maximum width: 80 characters per line (HARD LIMIT)
3. Maximum 30 lines (HARD LIMIT)
4. Output ONLY the chart - ABSOLUTELY NO explanations, descriptions, or markdown
5. NEVER use ``` code blocks or any markdown formatting
6. NO trailing whitespace at end of lines
7. All box corners must be complete (use all 4: ┌ ┐ └ ┘)
8. Labels and data must be clear and aligned, bar lengths proportional to values

Example:
Sales Report
┌────────────────────┐
│ Q1 ████████ 100    │
│ Q2 ████████████ 150│
└────────────────────┘

OUTPUT FORMAT: Pure chart only. No text before or after. No explanations.
"#;

pub const DIAGRAM_TOP_TO_BOTTOM_PROMPT: &str = r#"Generate an ASCII flowchart flowing TOP TO BOTTOM using ONLY allowed characters:

ALLOWED CHARACTERS:
- Box-drawing: ┌ ┐ └ ┘ ─ │ ├ ┤ ┬ ┴
- Arrows: ↓ │
- Letters: A-Z, a-z
- Numbers: 0-9
- Symbols: . , : - _ / ( ) (space)

CRITICAL RULES (STRICTLY ENFORCED):
1. Use ONLY characters from the allowed list above
2. Every box MUST have all 4 corners: ┌ ┐ └ ┘
3. Flow direction: ↓ between boxes, │ for vertical connections
4. Maximum width: 80 characters per line (HARD LIMIT)
5. Maximum 50 lines (HARD LIMIT)
6. Output ONLY the diagram - ABSOLUTELY NO explanations or markdown
7. NEVER use ``` code blocks
8. NO trailing whitespace at end of lines
9. Text inside boxes should be centered and clear
10. Use ┬ and ┴ for T-junctions when connecting vertical flow to boxes

Example:
┌─────────┐
│  Start  │
└────┬────┘
     ↓
┌─────────┐
│ Process │
└─────────┘

OUTPUT FORMAT: Pure diagram only. No text before or after. No explanations.
"#;

pub const DIAGRAM_LEFT_TO_RIGHT_PROMPT: &str = r#"Generate an ASCII flowchart flowing LEFT TO RIGHT using ONLY allowed characters:

ALLOWED CHARACTERS:
- Box-drawing: ┌ ┐ └ ┘ ─ │
- Arrow: →
- Letters: A-Z, a-z
- Numbers: 0-9
- Symbols: . , : - _ / ( ) (space)

CRITICAL RULES (STRICTLY ENFORCED):
1. Use ONLY characters from the allowed list above
2. Every box MUST have all 4 corners: ┌ ┐ └ ┘
3. Flow direction: → between boxes (horizontal flow)
4. Maximum width: 80 characters per line (HARD LIMIT)
5. Maximum 50 lines (HARD LIMIT)
6. Output ONLY the diagram - ABSOLUTELY NO explanations or markdown
7. NEVER use ``` code blocks
8. NO trailing whitespace at end of lines
9. Text inside boxes should be centered and clear

Example:
┌─────────┐ → ┌─────────┐ → ┌─────────┐
│  Start  │   │ Process │   │   End   │
└─────────┘   └─────────┘   └─────────┘

OUTPUT FORMAT: Pure diagram only. No text before or after. No explanations.
"#;

pub const CODEBASE_ANALYSIS_PROMPT: &str = r#"You are a software architect. Analyze the provided codebase structure and create an architecture diagram.

ALLOWED CHARACTERS:
- Box-drawing: ┌ ┐ └ ┘ ─ │ ├ ┤ ┬ ┴
- Arrows: → ← ↑ ↓
- Letters: A-Z, a-z
- Numbers: 0-9
- Symbols: . , : - _ / ( ) (space)

First work out how the listed files and directories relate, then draw a clean ASCII diagram showing:
- Main components and modules
- Dependencies and data flow
- Layer separation, if any

CRITICAL RULES (STRICTLY ENFORCED):
1. Use ONLY characters from the allowed list above
2. Every box MUST have all 4 corners complete
3. Maximum width: 80 characters per line (HARD LIMIT)
4. Maximum 50 lines (HARD LIMIT)
5. Keep it focused on high-level architecture
6. Output ONLY the diagram - ABSOLUTELY NO explanations or markdown
7. NEVER use ``` code blocks
8. NO trailing whitespace

OUTPUT FORMAT: Pure diagram only. No text before or after. No explanations.
"#;

pub fn explanation_prompt(kind: &str, user_prompt: &str, content: &str) -> String {
    format!(
        "Please provide a brief, clear explanation of this ASCII {kind}.\n\n\
         Original prompt: {user_prompt}\n\n\
         {kind}:\n{content}\n\n\
         Explain what it depicts or shows, its key features, and any notable relationships. \
         Keep it concise (2-3 sentences)."
    )
}

/// Fold the instructions and the user's request into one turn, for
/// providers that take no separate system message.
pub fn single_turn(system: &str, user_prompt: &str) -> String {
    format!("{}\n\nUser request: {}", system, user_prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_has_output_format_section() {
        for template in [
            ASCII_ART_PROMPT,
            LOGO_PROMPT,
            CHART_PROMPT,
            DIAGRAM_TOP_TO_BOTTOM_PROMPT,
            DIAGRAM_LEFT_TO_RIGHT_PROMPT,
            CODEBASE_ANALYSIS_PROMPT,
        ] {
            assert_eq!(template.matches(OUTPUT_FORMAT_MARKER).count(), 1);
        }
    }

    #[test]
    fn test_explanation_prompt_includes_content() {
        let prompt = explanation_prompt("chart", "Q1=100", "│ Q1 ████ │");
        assert!(prompt.contains("Original prompt: Q1=100"));
        assert!(prompt.contains("│ Q1 ████ │"));
    }

    #[test]
    fn test_single_turn_puts_request_last() {
        let turn = single_turn(CHART_PROMPT, "Q1=100");
        assert!(turn.starts_with(CHART_PROMPT));
        assert!(turn.ends_with("\n\nUser request: Q1=100"));
    }
}
