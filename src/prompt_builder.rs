//! Assembles the exact instructions sent to the model.
//!
//! Building is pure apart from read-only lookups in the [`ExampleLoader`]:
//! the same inputs and corpus always produce the same [`PromptRequest`].

use crate::examples_loader::{Example, ExampleLoader};
use crate::prompts::{
    ASCII_ART_PROMPT, CHART_PROMPT, CODEBASE_ANALYSIS_PROMPT, DIAGRAM_LEFT_TO_RIGHT_PROMPT,
    DIAGRAM_TOP_TO_BOTTOM_PROMPT, LOGO_PROMPT, OUTPUT_FORMAT_MARKER,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

const LOGO_MARKERS: &[&str] = &["logo", "logos", "brand", "branding", "company", "wordmark"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Art,
    Chart,
    Diagram,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Art => "art",
            Mode::Chart => "chart",
            Mode::Diagram => "diagram",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "art" | "ascii" => Ok(Mode::Art),
            "chart" => Ok(Mode::Chart),
            "diagram" => Ok(Mode::Diagram),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    TopToBottom,
    LeftToRight,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top-to-bottom" | "ttb" | "vertical" => Ok(Orientation::TopToBottom),
            "left-to-right" | "ltr" | "horizontal" => Ok(Orientation::LeftToRight),
            other => Err(format!(
                "unknown orientation '{}', use top-to-bottom or left-to-right",
                other
            )),
        }
    }
}

/// Request flags that shape the prompt or the presentation of its result.
///
/// Field order here has no effect on fingerprints; the cache canonicalizes
/// options by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PromptOptions {
    pub logo: bool,
    pub orientation: Orientation,
    pub explain: bool,
    pub colors: bool,
    /// The user text is a codebase listing rather than a description.
    pub codebase: bool,
}

/// Which instruction template a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    Art,
    Logo,
    Chart,
    DiagramTopToBottom,
    DiagramLeftToRight,
    Codebase,
}

impl Template {
    pub fn text(self) -> &'static str {
        match self {
            Template::Art => ASCII_ART_PROMPT,
            Template::Logo => LOGO_PROMPT,
            Template::Chart => CHART_PROMPT,
            Template::DiagramTopToBottom => DIAGRAM_TOP_TO_BOTTOM_PROMPT,
            Template::DiagramLeftToRight => DIAGRAM_LEFT_TO_RIGHT_PROMPT,
            Template::Codebase => CODEBASE_ANALYSIS_PROMPT,
        }
    }

    fn example_category(self) -> &'static str {
        match self {
            Template::Art => "art",
            Template::Logo => "logo",
            Template::Chart => "chart",
            Template::DiagramTopToBottom | Template::DiagramLeftToRight => "diagram",
            Template::Codebase => "codebase",
        }
    }
}

/// A fully assembled model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub mode: Mode,
    pub template: Template,
    pub options: PromptOptions,
    pub user_text: String,
    pub examples: Vec<Example>,
    system_prompt: String,
}

impl PromptRequest {
    /// Template plus any spliced-in examples.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

pub struct PromptBuilder {
    loader: Arc<ExampleLoader>,
    max_examples: usize,
}

impl PromptBuilder {
    pub fn new(loader: Arc<ExampleLoader>, max_examples: usize) -> Self {
        Self {
            loader,
            max_examples,
        }
    }

    /// Assemble the request for `user_text`.
    ///
    /// Never fails: with no examples available the bare template is used.
    pub fn build(&self, mode: Mode, user_text: &str, options: &PromptOptions) -> PromptRequest {
        let template = select_template(mode, user_text, options);
        let user_text = user_text.trim().to_string();

        let (subject, examples) = self.find_examples(template, &user_text);
        debug!(
            "Building {} prompt with template {:?} and {} examples",
            mode,
            template,
            examples.len()
        );

        let system_prompt = if examples.is_empty() {
            template.text().to_string()
        } else {
            splice_examples(template.text(), &format_examples(&examples, &subject))
        };

        PromptRequest {
            mode,
            template,
            options: *options,
            user_text,
            examples,
            system_prompt,
        }
    }

    /// Art requests first try a subject-specific category, then the
    /// template's own category.
    fn find_examples(&self, template: Template, user_text: &str) -> (String, Vec<Example>) {
        if template == Template::Art {
            if let Some(subject) = self.loader.match_subject(user_text) {
                let examples = self.loader.get_examples(&subject, self.max_examples);
                if !examples.is_empty() {
                    return (subject, examples);
                }
            }
        }
        let category = template.example_category();
        (
            category.to_string(),
            self.loader.get_examples(category, self.max_examples),
        )
    }
}

/// Pick the instruction template for a request.
pub fn select_template(mode: Mode, user_text: &str, options: &PromptOptions) -> Template {
    match mode {
        Mode::Art if is_logo_request(user_text, options) => Template::Logo,
        Mode::Art => Template::Art,
        Mode::Chart => Template::Chart,
        Mode::Diagram if options.codebase => Template::Codebase,
        Mode::Diagram => match options.orientation {
            Orientation::TopToBottom => Template::DiagramTopToBottom,
            Orientation::LeftToRight => Template::DiagramLeftToRight,
        },
    }
}

/// Logo mode: forced by the flag, or inferred from all-caps text or a
/// branding keyword.
pub fn is_logo_request(user_text: &str, options: &PromptOptions) -> bool {
    if options.logo {
        return true;
    }

    let letters: Vec<char> = user_text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
        return true;
    }

    user_text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| LOGO_MARKERS.contains(&word))
}

fn format_examples(examples: &[Example], subject: &str) -> String {
    let mut lines = vec![
        format!("RELEVANT EXAMPLES FOR '{}':", subject.to_uppercase()),
        "Study these high-quality examples:".to_string(),
        String::new(),
    ];
    for (i, example) in examples.iter().enumerate() {
        lines.push(format!("Example {}:", i + 1));
        lines.push(example.output.trim_end().to_string());
        lines.push(String::new());
    }
    lines.push("Use these as reference for style, proportions, and recognizable features.".to_string());
    lines.push(String::new());
    lines.join("\n")
}

fn splice_examples(template: &str, section: &str) -> String {
    match template.split_once(OUTPUT_FORMAT_MARKER) {
        Some((head, tail)) => format!("{}{}\n{}{}", head, section, OUTPUT_FORMAT_MARKER, tail),
        None => format!("{}\n{}", template, section),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn builder_with(dir: &TempDir) -> PromptBuilder {
        PromptBuilder::new(Arc::new(ExampleLoader::new(dir.path(), 4)), 2)
    }

    fn write(dir: &TempDir, name: &str, body: &str) {
        fs::write(dir.path().join(name), body).unwrap();
    }

    #[test]
    fn test_logo_detection() {
        let none = PromptOptions::default();
        assert_eq!(select_template(Mode::Art, "ACME CORP", &none), Template::Logo);
        assert_eq!(select_template(Mode::Art, "a cat", &none), Template::Art);
        let forced = PromptOptions {
            logo: true,
            ..PromptOptions::default()
        };
        assert_eq!(select_template(Mode::Art, "a cat", &forced), Template::Logo);
        assert_eq!(
            select_template(Mode::Art, "a logo for my bakery", &none),
            Template::Logo
        );
        assert_eq!(select_template(Mode::Art, "Company banner", &none), Template::Logo);
        // Only art has a logo template.
        assert_eq!(select_template(Mode::Chart, "ACME CORP", &forced), Template::Chart);
    }

    #[test]
    fn test_logo_detection_ignores_near_misses() {
        let none = PromptOptions::default();
        assert!(!is_logo_request("I", &none));
        assert!(!is_logo_request("a brandy glass", &none));
        assert!(!is_logo_request("123", &none));
    }

    #[test]
    fn test_diagram_template_follows_orientation_and_codebase() {
        let ltr = PromptOptions {
            orientation: Orientation::LeftToRight,
            ..PromptOptions::default()
        };
        assert_eq!(
            select_template(Mode::Diagram, "login flow", &ltr),
            Template::DiagramLeftToRight
        );
        assert_eq!(
            select_template(Mode::Diagram, "login flow", &PromptOptions::default()),
            Template::DiagramTopToBottom
        );
        let codebase = PromptOptions {
            codebase: true,
            ..ltr
        };
        assert_eq!(
            select_template(Mode::Diagram, "src/main.rs", &codebase),
            Template::Codebase
        );
    }

    #[test]
    fn test_build_without_examples_falls_back_to_template() {
        let dir = TempDir::new().unwrap();
        let builder = builder_with(&dir);

        let request = builder.build(Mode::Art, "  a nonexistent_subject_xyz  ", &PromptOptions::default());
        assert!(request.examples.is_empty());
        assert_eq!(request.system_prompt(), ASCII_ART_PROMPT);
        assert_eq!(request.user_text, "a nonexistent_subject_xyz");
        assert_eq!(request.template, Template::Art);
    }

    #[test]
    fn test_examples_are_spliced_before_output_format() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "chart.json",
            r#"{"examples": [{"prompt": "q", "output": "BAR-ONE"}, {"output": "BAR-TWO"}, {"output": "BAR-THREE"}]}"#,
        );
        let builder = builder_with(&dir);

        let request = builder.build(Mode::Chart, "Q1=100, Q2=150", &PromptOptions::default());
        assert_eq!(request.examples.len(), 2);

        let system = request.system_prompt();
        let examples_at = system.find("RELEVANT EXAMPLES FOR 'CHART'").unwrap();
        let output_at = system.find(OUTPUT_FORMAT_MARKER).unwrap();
        assert!(examples_at < output_at);
        assert!(system.contains("Example 1:\nBAR-ONE"));
        assert!(!system.contains("BAR-THREE"));
    }

    #[test]
    fn test_art_prefers_subject_examples() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "index.json",
            r#"{"keywords": {"kitty": "cat"}, "categories": {"cat": "cat.json"}}"#,
        );
        write(&dir, "cat.json", r#"{"examples": [{"output": "CAT-ART"}]}"#);
        write(&dir, "art.json", r#"{"examples": [{"output": "GENERIC-ART"}]}"#);
        let builder = builder_with(&dir);

        let request = builder.build(Mode::Art, "a kitty", &PromptOptions::default());
        assert_eq!(request.examples[0].output, "CAT-ART");
        assert!(request.system_prompt().contains("RELEVANT EXAMPLES FOR 'CAT'"));

        let request = builder.build(Mode::Art, "a rocket", &PromptOptions::default());
        assert_eq!(request.examples[0].output, "GENERIC-ART");
    }

    #[test]
    fn test_build_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write(&dir, "diagram.json", r#"{"examples": [{"output": "┌─┐"}]}"#);
        let builder = builder_with(&dir);
        let options = PromptOptions::default();

        let first = builder.build(Mode::Diagram, "login flow", &options);
        let second = builder.build(Mode::Diagram, "login flow", &options);
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_mode_and_orientation() {
        assert_eq!("Chart".parse::<Mode>().unwrap(), Mode::Chart);
        assert_eq!("ltr".parse::<Orientation>().unwrap(), Orientation::LeftToRight);
        assert_eq!("horizontal".parse::<Orientation>().unwrap(), Orientation::LeftToRight);
        assert!("diagonal".parse::<Orientation>().is_err());
    }
}
