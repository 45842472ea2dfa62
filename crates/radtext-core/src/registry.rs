use crate::config::TRIGGER_SENTINEL;
use crate::error::{RadtextError, Result};
use crate::models::{TriggerDefinition, TriggerInput};
use uuid::Uuid;

/// Ordered collection of AutoTexto triggers.
///
/// Trigger strings are unique ignoring case; mutations that would break that are
/// rejected rather than appended, so a lookup can never be shadowed by an older entry.
#[derive(Debug, Clone, Default)]
pub struct TriggerRegistry {
    triggers: Vec<TriggerDefinition>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from existing definitions, dropping later duplicates.
    pub fn from_definitions(definitions: Vec<TriggerDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            if registry.find_trigger(&definition.trigger).is_some() {
                tracing::warn!(
                    "Ignoring duplicate trigger '{}' (id {})",
                    definition.trigger,
                    definition.id
                );
                continue;
            }
            registry.triggers.push(definition);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn triggers(&self) -> &[TriggerDefinition] {
        &self.triggers
    }

    /// Exact, case-insensitive match on the full token, sentinel included
    pub fn find_trigger(&self, word: &str) -> Option<&TriggerDefinition> {
        let word = word.to_lowercase();
        self.triggers
            .iter()
            .find(|entry| entry.trigger.to_lowercase() == word)
    }

    pub fn get(&self, id: &str) -> Option<&TriggerDefinition> {
        self.triggers.iter().find(|entry| entry.id == id)
    }

    /// Triggers grouped by category, categories in first-seen order
    pub fn list_by_category(&self) -> Vec<(String, Vec<&TriggerDefinition>)> {
        let mut groups: Vec<(String, Vec<&TriggerDefinition>)> = Vec::new();
        for entry in &self.triggers {
            match groups.iter_mut().find(|(category, _)| *category == entry.category) {
                Some((_, entries)) => entries.push(entry),
                None => groups.push((entry.category.clone(), vec![entry])),
            }
        }
        groups
    }

    /// One `trigger - content` line per entry
    pub fn reference_listing(&self) -> String {
        self.triggers
            .iter()
            .map(|entry| format!("{} - {}", entry.trigger, entry.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Add a new trigger
    pub fn add(&mut self, input: TriggerInput) -> Result<TriggerDefinition> {
        check_input(&input)?;
        if self.find_trigger(&input.trigger).is_some() {
            return Err(RadtextError::DuplicateTrigger(input.trigger));
        }

        let entry = input.into_definition(Uuid::new_v4().to_string());
        tracing::debug!("Adding trigger '{}' (id {})", entry.trigger, entry.id);
        self.triggers.push(entry.clone());
        Ok(entry)
    }

    /// Update an existing trigger, keeping its id and position
    pub fn update(&mut self, id: &str, input: TriggerInput) -> Result<TriggerDefinition> {
        check_input(&input)?;
        if let Some(existing) = self.find_trigger(&input.trigger) {
            if existing.id != id {
                return Err(RadtextError::DuplicateTrigger(input.trigger));
            }
        }

        let entry = self
            .triggers
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| RadtextError::TriggerNotFound(id.to_string()))?;
        *entry = input.into_definition(id.to_string());
        Ok(entry.clone())
    }

    /// Delete a trigger by id
    pub fn delete(&mut self, id: &str) -> Result<TriggerDefinition> {
        let index = self
            .triggers
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| RadtextError::TriggerNotFound(id.to_string()))?;
        Ok(self.triggers.remove(index))
    }
}

fn check_input(input: &TriggerInput) -> Result<()> {
    let trigger = input.trigger.as_str();
    if !trigger.starts_with(TRIGGER_SENTINEL) || trigger.chars().count() < 2 {
        return Err(RadtextError::InvalidTrigger(format!(
            "'{}' must start with '{}' followed by at least one character",
            trigger, TRIGGER_SENTINEL
        )));
    }
    if trigger.chars().any(char::is_whitespace) {
        return Err(RadtextError::InvalidTrigger(format!(
            "'{}' must not contain whitespace",
            trigger
        )));
    }
    if input.content.is_empty() {
        return Err(RadtextError::InvalidTrigger(format!(
            "'{}' has no expansion content",
            trigger
        )));
    }
    Ok(())
}
