//! Terminal presentation of generation results.
//!
//! Output goes through any [`Write`] so it can be captured in tests.

use crate::generator::GenerationOutcome;
use crate::prompt_builder::Mode;
use anstyle::{AnsiColor, Color, Effects, Style};
use std::io::{self, Write};
use std::time::Duration;

const LIVE_LINE_DELAY: Duration = Duration::from_millis(30);

pub struct Renderer {
    colors: bool,
    live: bool,
    line_delay: Duration,
}

impl Renderer {
    pub fn new(colors: bool, live: bool) -> Self {
        Self {
            colors,
            live,
            line_delay: LIVE_LINE_DELAY,
        }
    }

    pub fn with_line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.colors {
            format!("{}{}{}", style.render(), text, style.render_reset())
        } else {
            text.to_string()
        }
    }

    fn body_style(mode: Mode) -> Style {
        let color = match mode {
            Mode::Art => AnsiColor::Cyan,
            Mode::Chart => AnsiColor::Green,
            Mode::Diagram => AnsiColor::Yellow,
        };
        Style::new().fg_color(Some(Color::Ansi(color)))
    }

    /// Print one outcome: title line, body, then the optional explanation.
    pub async fn render<W: Write + Send>(
        &self,
        out: &mut W,
        mode: Mode,
        outcome: &GenerationOutcome,
    ) -> io::Result<()> {
        let title = Style::new().effects(Effects::BOLD);
        let dim = Style::new().effects(Effects::DIMMED);

        let mut header = self.paint(title, &format!("{}: {}", mode, outcome.prompt));
        if outcome.cached {
            header.push(' ');
            header.push_str(&self.paint(dim, "(cached)"));
        }
        writeln!(out, "{}", header)?;
        writeln!(out)?;

        let body = Self::body_style(mode);
        for line in outcome.output.lines() {
            writeln!(out, "{}", self.paint(body, line))?;
            if self.live {
                out.flush()?;
                tokio::time::sleep(self.line_delay).await;
            }
        }

        if let Some(explanation) = &outcome.explanation {
            writeln!(out)?;
            writeln!(out, "{}", self.paint(title, "Explanation:"))?;
            writeln!(out, "{}", explanation)?;
        }
        if let Some(usage) = outcome.usage {
            writeln!(
                out,
                "{}",
                self.paint(
                    dim,
                    &format!(
                        "{} · {} · {} tokens",
                        outcome.provider, outcome.model, usage.total_tokens
                    )
                )
            )?;
        }
        writeln!(out)?;
        out.flush()
    }

    pub fn render_error<W: Write>(&self, out: &mut W, prompt: &str, error: &impl std::fmt::Display) -> io::Result<()> {
        let style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
        writeln!(out, "{}", self.paint(style, &format!("✗ {}: {}", prompt, error)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_client::{Provider, Usage};

    fn outcome(cached: bool) -> GenerationOutcome {
        GenerationOutcome {
            prompt: "a cat".to_string(),
            output: " /\\_/\\\n( o.o )".to_string(),
            cached,
            provider: Provider::Groq,
            model: "llama".to_string(),
            usage: None,
            explanation: None,
        }
    }

    async fn rendered(renderer: &Renderer, outcome: &GenerationOutcome) -> String {
        let mut out = Vec::new();
        renderer.render(&mut out, Mode::Art, outcome).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_plain_output_has_no_escape_codes() {
        let text = rendered(&Renderer::new(false, false), &outcome(false)).await;
        assert!(text.starts_with("art: a cat\n\n /\\_/\\\n( o.o )\n"));
        assert!(!text.contains('\u{1b}'));
        assert!(!text.contains("(cached)"));
    }

    #[tokio::test]
    async fn test_cached_marker_and_colors() {
        let text = rendered(&Renderer::new(true, false), &outcome(true)).await;
        assert!(text.contains("(cached)"));
        assert!(text.contains('\u{1b}'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_mode_waits_per_line() {
        let renderer = Renderer::new(false, true).with_line_delay(Duration::from_millis(100));
        let start = tokio::time::Instant::now();
        rendered(&renderer, &outcome(false)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_explanation_and_usage_are_shown() {
        let mut outcome = outcome(false);
        outcome.explanation = Some("A sitting cat.".to_string());
        outcome.usage = Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        let text = rendered(&Renderer::new(false, false), &outcome).await;
        assert!(text.contains("Explanation:\nA sitting cat."));
        assert!(text.contains("groq · llama · 15 tokens"));
    }
}
