use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One message of a client-submitted conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    fn render(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}

/// Validated conversation input. The only constructors are [`ConversationInput::prompt`]
/// and [`ConversationInput::history`], which reject empty values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationInput(Source);

#[derive(Clone, Debug, PartialEq, Eq)]
enum Source {
    PromptOnly(String),
    History(Vec<Turn>),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("either prompt or messages is required")]
    MissingInput,
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("messages must contain at least 1 element(s)")]
    EmptyHistory,
    #[error("messages[{index}].content must not be empty")]
    EmptyTurnContent { index: usize },
}

impl ConversationInput {
    pub fn prompt(text: impl Into<String>) -> Result<Self, InputError> {
        let text = text.into();
        if text.is_empty() {
            return Err(InputError::EmptyPrompt);
        }
        Ok(Self(Source::PromptOnly(text)))
    }

    pub fn history(turns: Vec<Turn>) -> Result<Self, InputError> {
        if turns.is_empty() {
            return Err(InputError::EmptyHistory);
        }
        if let Some(index) = turns.iter().position(|turn| turn.content.is_empty()) {
            return Err(InputError::EmptyTurnContent { index });
        }
        Ok(Self(Source::History(turns)))
    }

    pub fn turn_count(&self) -> usize {
        match &self.0 {
            Source::PromptOnly(_) => 1,
            Source::History(turns) => turns.len(),
        }
    }
}

/// Canonical text form of a conversation, as submitted to the agent runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript(String);

impl Transcript {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize(input: &ConversationInput) -> Transcript {
    match &input.0 {
        Source::PromptOnly(text) => Transcript(text.clone()),
        Source::History(turns) => {
            Transcript(turns.iter().map(Turn::render).collect::<Vec<_>>().join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize, ConversationInput, InputError, Role, Turn};

    #[test]
    fn prompt_is_passed_through_verbatim() {
        let prompt = "  What snacks do you sell?\nAnything spicy? ";
        let input = ConversationInput::prompt(prompt).expect("non-empty prompt");

        assert_eq!(normalize(&input).as_str(), prompt);
    }

    #[test]
    fn history_renders_one_labelled_line_per_turn_in_order() {
        let input = ConversationInput::history(vec![
            Turn::user("Hi"),
            Turn::assistant("Hello"),
            Turn::user("Any sauces?"),
        ])
        .expect("valid history");

        assert_eq!(normalize(&input).as_str(), "User: Hi\nAssistant: Hello\nUser: Any sauces?");
    }

    #[test]
    fn history_line_count_matches_turn_count() {
        let turns = (0..7)
            .map(|i| if i % 2 == 0 { Turn::user(format!("q{i}")) } else { Turn::assistant("a") })
            .collect::<Vec<_>>();
        let input = ConversationInput::history(turns.clone()).expect("valid history");
        let transcript = normalize(&input);
        let lines = transcript.as_str().split('\n').collect::<Vec<_>>();

        assert_eq!(lines.len(), turns.len());
        for (line, turn) in lines.iter().zip(&turns) {
            let expected_prefix = match turn.role {
                Role::User => "User: ",
                Role::Assistant => "Assistant: ",
            };
            assert_eq!(*line, format!("{expected_prefix}{}", turn.content));
        }
    }

    #[test]
    fn single_assistant_turn_is_still_a_transcript() {
        let input =
            ConversationInput::history(vec![Turn::assistant("Welcome!")]).expect("valid history");

        assert_eq!(normalize(&input).as_str(), "Assistant: Welcome!");
    }

    #[test]
    fn empty_inputs_are_rejected_at_construction() {
        assert_eq!(ConversationInput::prompt(""), Err(InputError::EmptyPrompt));
        assert_eq!(ConversationInput::history(Vec::new()), Err(InputError::EmptyHistory));
        assert_eq!(
            ConversationInput::history(vec![Turn::user("Hi"), Turn::assistant("")]),
            Err(InputError::EmptyTurnContent { index: 1 })
        );
    }

    #[test]
    fn every_accepted_input_normalizes_to_a_non_empty_transcript() {
        let inputs = [
            ConversationInput::prompt(" "),
            ConversationInput::history(vec![Turn::user("?")]),
            ConversationInput::history(vec![Turn::assistant("Hello"), Turn::user("Hi")]),
        ];

        for input in inputs {
            let input = input.expect("accepted input");
            let transcript = normalize(&input);

            assert!(!transcript.as_str().is_empty());
            assert_eq!(transcript.as_str().split('\n').count(), input.turn_count());
        }
    }

    #[test]
    fn roles_deserialize_from_lowercase_names_only() {
        let turn: Turn =
            serde_json::from_str(r#"{"role":"assistant","content":"ok"}"#).expect("valid turn");
        assert_eq!(turn.role, Role::Assistant);

        assert!(serde_json::from_str::<Turn>(r#"{"role":"system","content":"x"}"#).is_err());
    }
}
