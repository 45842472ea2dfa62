//! Assisted text generation. The backend is a pluggable [`TextGenerator`]; when it
//! fails the user gets a fixed fallback message instead of an error.

use crate::config::{GENERATOR_ACTION_ENV_VAR, GENERATOR_ENV_VAR};
use crate::error::{RadtextError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::str::FromStr;

/// Shown in place of generated text when the backend is unavailable.
pub const FALLBACK_TEXT: &str =
    "Serviço temporariamente indisponível. Por favor, tente novamente em alguns instantes.";

const CONNECTION_NOTICE: &str =
    "Não foi possível acessar o serviço de IA. Usando uma resposta local alternativa.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationAction {
    GenerateReport,
    GenerateImpressions,
    FollowUp,
    EnhanceReport,
}

impl GenerationAction {
    pub const ALL: [GenerationAction; 4] = [
        GenerationAction::GenerateReport,
        GenerationAction::GenerateImpressions,
        GenerationAction::FollowUp,
        GenerationAction::EnhanceReport,
    ];

    /// Kebab-case name, as serialized
    pub fn key(&self) -> &'static str {
        match self {
            GenerationAction::GenerateReport => "generate-report",
            GenerationAction::GenerateImpressions => "generate-impressions",
            GenerationAction::FollowUp => "follow-up",
            GenerationAction::EnhanceReport => "enhance-report",
        }
    }

    /// Name of the action as requested
    pub fn label(&self) -> &'static str {
        match self {
            GenerationAction::GenerateReport => "Generate Report",
            GenerationAction::GenerateImpressions => "Generate Impressions",
            GenerationAction::FollowUp => "Follow-up Recommendations",
            GenerationAction::EnhanceReport => "Enhance Report",
        }
    }

    /// Heading shown above the generated text
    pub fn title(&self) -> &'static str {
        match self {
            GenerationAction::GenerateReport => "Relatório Gerado",
            GenerationAction::GenerateImpressions => "Impressões",
            GenerationAction::FollowUp => "Recomendações de Acompanhamento",
            GenerationAction::EnhanceReport => "Relatório Aprimorado",
        }
    }
}

impl fmt::Display for GenerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GenerationAction {
    type Err = RadtextError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        GenerationAction::ALL
            .into_iter()
            .find(|action| action.label().to_lowercase() == wanted || action.key() == wanted)
            .ok_or_else(|| RadtextError::Other(format!("Unknown generation action '{}'", s)))
    }
}

/// Backend that turns report content into new text for an action
pub trait TextGenerator {
    fn generate(&self, content: &str, action: GenerationAction) -> Result<String>;
}

/// Generator used when no backend is configured; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGenerator;

impl TextGenerator for OfflineGenerator {
    fn generate(&self, _content: &str, _action: GenerationAction) -> Result<String> {
        Err(RadtextError::Generation(
            "no text generation backend configured".to_string(),
        ))
    }
}

/// Shell command backend. The report goes to stdin, the action key to
/// `RADTEXT_ACTION`, and stdout becomes the generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandGenerator {
    command: String,
}

impl CommandGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The command named by `RADTEXT_GENERATOR`, if set and not blank
    pub fn from_env() -> Option<Self> {
        env::var(GENERATOR_ENV_VAR)
            .ok()
            .filter(|command| !command.trim().is_empty())
            .map(Self::new)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn spawn_for(&self, action: GenerationAction) -> std::io::Result<std::process::Child> {
        #[cfg(target_os = "windows")]
        let mut command = {
            let mut command = Command::new("cmd");
            command.args(["/c", &self.command]);
            command
        };

        #[cfg(not(target_os = "windows"))]
        let mut command = {
            let shell = env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
            let mut command = Command::new(shell);
            command.args(["-c", &self.command]);
            command
        };

        command
            .env(GENERATOR_ACTION_ENV_VAR, action.key())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}

impl TextGenerator for CommandGenerator {
    fn generate(&self, content: &str, action: GenerationAction) -> Result<String> {
        let mut child = self
            .spawn_for(action)
            .map_err(|e| RadtextError::Generation(format!("failed to start '{}': {}", self.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content.as_bytes())
                .map_err(|e| RadtextError::Generation(format!("failed to send report: {}", e)))?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(RadtextError::Generation(format!(
                "command failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        if text.trim().is_empty() {
            return Err(RadtextError::Generation("command produced no text".to_string()));
        }
        Ok(text)
    }
}

/// Outcome of one generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub action: GenerationAction,
    pub text: String,
    /// True when `text` is the fallback message
    pub fallback: bool,
    /// Non-fatal message for the user, set on fallback
    pub notice: Option<String>,
}

impl Generation {
    pub fn title(&self) -> &'static str {
        self.action.title()
    }

    pub fn is_success(&self) -> bool {
        !self.fallback
    }
}

/// Ask `generator` for text, substituting the fallback message on failure.
///
/// Empty content is rejected before the backend is called.
pub fn generate(
    generator: &dyn TextGenerator,
    content: &str,
    action: GenerationAction,
) -> Result<Generation> {
    if content.trim().is_empty() {
        return Err(RadtextError::EmptyContent);
    }

    match generator.generate(content, action) {
        Ok(text) => {
            tracing::info!(action = %action, "Generation completed");
            Ok(Generation {
                action,
                text,
                fallback: false,
                notice: None,
            })
        }
        Err(e) => {
            tracing::warn!(action = %action, "Generation failed, using fallback: {}", e);
            Ok(Generation {
                action,
                text: FALLBACK_TEXT.to_string(),
                fallback: true,
                notice: Some(CONNECTION_NOTICE.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl TextGenerator for Echo {
        fn generate(&self, content: &str, action: GenerationAction) -> Result<String> {
            Ok(format!("{}: {}", action.title(), content.len()))
        }
    }

    #[test]
    fn test_offline_falls_back() {
        let generation = generate(&OfflineGenerator, "Exame normal", GenerationAction::FollowUp).unwrap();
        assert!(generation.fallback);
        assert!(!generation.is_success());
        assert_eq!(generation.text, FALLBACK_TEXT);
        assert!(generation.notice.is_some());
        assert_eq!(generation.title(), "Recomendações de Acompanhamento");
    }

    #[test]
    fn test_empty_content_is_rejected() {
        assert!(matches!(
            generate(&Echo, " \n ", GenerationAction::GenerateReport),
            Err(RadtextError::EmptyContent)
        ));
    }

    #[test]
    fn test_successful_generation() {
        let generation = generate(&Echo, "abc", GenerationAction::GenerateImpressions).unwrap();
        assert!(generation.is_success());
        assert_eq!(generation.text, "Impressões: 3");
        assert_eq!(generation.notice, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_generator_reads_stdout() {
        let generator = CommandGenerator::new("printf '%s: ' \"$RADTEXT_ACTION\"; cat");
        let generation = generate(&generator, "Exame normal\n", GenerationAction::FollowUp).unwrap();
        assert!(generation.is_success());
        assert_eq!(generation.text, "follow-up: Exame normal");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_falls_back() {
        for command in ["exit 3", "cat > /dev/null"] {
            let generation = generate(
                &CommandGenerator::new(command),
                "Exame normal",
                GenerationAction::GenerateReport,
            )
            .unwrap();
            assert!(generation.fallback, "{}", command);
            assert_eq!(generation.text, FALLBACK_TEXT);
        }
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(
            "follow-up".parse::<GenerationAction>().unwrap(),
            GenerationAction::FollowUp
        );
        assert_eq!(
            "Enhance Report".parse::<GenerationAction>().unwrap(),
            GenerationAction::EnhanceReport
        );
        assert!("summarize".parse::<GenerationAction>().is_err());
    }
}
