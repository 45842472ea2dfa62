//! Live expansion of AutoTexto triggers as the user types.
//!
//! The matcher keeps no state between keystrokes. On every separator (space or
//! Enter) it looks at the run of non-whitespace immediately before the cursor; if
//! that run starts with the trigger sentinel and names a registered trigger, the
//! run is replaced in place by the trigger's content.

use crate::buffer::TextBuffer;
use crate::config::{TAB_INDENT, TRIGGER_SENTINEL};
use crate::registry::TriggerRegistry;
use serde::{Deserialize, Serialize};

/// What happens to the separator keystroke that fired an expansion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorPolicy {
    /// The separator is inserted after the expansion: `/n␠` → `normal␠`
    #[default]
    Reinsert,
    /// The separator is swallowed: `/n␠` → `normal`
    Consume,
}

/// A single keystroke delivered by the editing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", content = "char", rename_all = "lowercase")]
pub enum KeyInput {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
}

/// A trigger that fired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expansion {
    /// The token as typed, e.g. `/N`
    pub trigger: String,
    pub content: String,
    /// Char offset where the expansion starts
    pub start: usize,
    /// Cursor after the expansion, separator included when re-inserted
    pub cursor: usize,
}

impl Expansion {
    /// Confirmation shown to the user
    pub fn notice(&self) -> String {
        format!("AutoTexto: {} expanded", self.trigger)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Expanded(Expansion),
    Inserted,
    Indented,
    Deleted,
    Moved,
    /// Nothing changed, e.g. Backspace at the start of the document
    Unchanged,
}

/// Result of evaluating a change event from the editing surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOutcome {
    pub text: String,
    pub cursor: usize,
    pub expansion: Option<Expansion>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionMatcher {
    policy: SeparatorPolicy,
}

pub fn is_separator(c: char) -> bool {
    c == ' ' || c == '\n'
}

/// The trailing trigger-like token of `text_before_cursor`, if any.
///
/// The token is the maximal run of non-whitespace ending at the cursor, and it
/// must start with the sentinel and carry at least one more character.
pub fn current_word(text_before_cursor: &str) -> Option<&str> {
    let start = text_before_cursor
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let word = &text_before_cursor[start..];
    if word.starts_with(TRIGGER_SENTINEL) && word.chars().count() > 1 {
        Some(word)
    } else {
        None
    }
}

impl ExpansionMatcher {
    pub fn new(policy: SeparatorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SeparatorPolicy {
        self.policy
    }

    /// Expand the token before the cursor as if `separator` had just been typed.
    ///
    /// Returns `None` and leaves the buffer untouched when there is no match.
    pub fn try_expand(
        &self,
        buffer: &mut TextBuffer,
        registry: &TriggerRegistry,
        separator: char,
    ) -> Option<Expansion> {
        let word = current_word(buffer.text_before_cursor())?;
        let entry = registry.find_trigger(word)?;

        let word_len = word.chars().count();
        let trigger = word.to_string();
        let cursor = buffer.cursor();
        let start = cursor - word_len;

        let mut replacement = entry.content.clone();
        if self.policy == SeparatorPolicy::Reinsert {
            replacement.push(separator);
        }
        let new_cursor = start + replacement.chars().count();
        buffer.replace_range(start..cursor, &replacement, new_cursor);

        tracing::info!(trigger = %trigger, id = %entry.id, "AutoTexto expanded");
        Some(Expansion {
            trigger,
            content: entry.content.clone(),
            start,
            cursor: new_cursor,
        })
    }

    /// Apply one keystroke to `buffer`, expanding a trigger when a separator is typed
    pub fn handle_key(
        &self,
        buffer: &mut TextBuffer,
        registry: &TriggerRegistry,
        key: KeyInput,
    ) -> KeyOutcome {
        match key {
            KeyInput::Char(c) if is_separator(c) => self.separator(buffer, registry, c),
            KeyInput::Enter => self.separator(buffer, registry, '\n'),
            KeyInput::Char(c) => {
                buffer.insert_char(c);
                KeyOutcome::Inserted
            }
            KeyInput::Tab => {
                buffer.insert_str(TAB_INDENT);
                KeyOutcome::Indented
            }
            KeyInput::Backspace => deleted(buffer.delete_backward()),
            KeyInput::Delete => deleted(buffer.delete_forward()),
            KeyInput::Left => moved(buffer, TextBuffer::move_left),
            KeyInput::Right => moved(buffer, TextBuffer::move_right),
            KeyInput::Up => moved(buffer, TextBuffer::move_up),
            KeyInput::Down => moved(buffer, TextBuffer::move_down),
            KeyInput::Home => moved(buffer, TextBuffer::move_line_start),
            KeyInput::End => moved(buffer, TextBuffer::move_line_end),
        }
    }

    fn separator(&self, buffer: &mut TextBuffer, registry: &TriggerRegistry, c: char) -> KeyOutcome {
        match self.try_expand(buffer, registry, c) {
            Some(expansion) => KeyOutcome::Expanded(expansion),
            None => {
                buffer.insert_char(c);
                KeyOutcome::Inserted
            }
        }
    }

    /// Evaluate a change event carrying the full updated text and cursor.
    ///
    /// The surface has already inserted the keystroke, so a separator just
    /// before the cursor is the signal to look at the token preceding it.
    /// Only an insertion can fire a trigger: a change that does not grow the
    /// text relative to `previous` comes back untouched.
    pub fn on_change(
        &self,
        previous: &str,
        text: &str,
        cursor: usize,
        registry: &TriggerRegistry,
    ) -> ChangeOutcome {
        let original = TextBuffer::with_cursor(text, cursor);
        let unchanged = || ChangeOutcome {
            text: original.text().to_string(),
            cursor: original.cursor(),
            expansion: None,
        };

        if text.chars().count() <= previous.chars().count() {
            return unchanged();
        }
        let Some(separator) = original.char_before_cursor().filter(|c| is_separator(*c)) else {
            return unchanged();
        };

        let mut buffer = original.clone();
        buffer.delete_backward();
        match self.try_expand(&mut buffer, registry, separator) {
            Some(expansion) => ChangeOutcome {
                text: buffer.text().to_string(),
                cursor: buffer.cursor(),
                expansion: Some(expansion),
            },
            None => unchanged(),
        }
    }

    /// Feed `text` through [`handle_key`](Self::handle_key) one char at a time
    pub fn type_text(
        &self,
        buffer: &mut TextBuffer,
        registry: &TriggerRegistry,
        text: &str,
    ) -> Vec<Expansion> {
        let mut expansions = Vec::new();
        for c in text.chars() {
            let key = match c {
                '\n' => KeyInput::Enter,
                '\t' => KeyInput::Tab,
                c => KeyInput::Char(c),
            };
            if let KeyOutcome::Expanded(expansion) = self.handle_key(buffer, registry, key) {
                expansions.push(expansion);
            }
        }
        expansions
    }
}

fn deleted(changed: bool) -> KeyOutcome {
    if changed {
        KeyOutcome::Deleted
    } else {
        KeyOutcome::Unchanged
    }
}

fn moved(buffer: &mut TextBuffer, movement: fn(&mut TextBuffer)) -> KeyOutcome {
    let before = buffer.cursor();
    movement(buffer);
    if buffer.cursor() == before {
        KeyOutcome::Unchanged
    } else {
        KeyOutcome::Moved
    }
}
