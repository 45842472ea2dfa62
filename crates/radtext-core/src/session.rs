//! The editor session: one document plus everything needed to edit it.
//!
//! A session owns the buffer, the trigger registry, the template store and the
//! measurement log, and writes their persistent parts through a [`KeyValueStore`].
//! Mutations are applied to a copy, persisted, and only then committed, so a failed
//! write leaves the session as it was.

use crate::buffer::{ReportStats, TextBuffer};
use crate::builtin::{builtin_templates, seed_triggers};
use crate::config::{
    field_values_key, EditorConfig, FAVORITE_TEMPLATES_KEY, MEASUREMENTS_KEY,
    RECENT_TEMPLATES_KEY, USER_TEMPLATES_KEY, USER_TRIGGERS_KEY,
};
use crate::error::{RadtextError, Result};
use crate::generation::{self, Generation, GenerationAction, TextGenerator};
use crate::matcher::{ChangeOutcome, Expansion, ExpansionMatcher, KeyInput, KeyOutcome};
use crate::measurements::{Measurement, MeasurementLog};
use crate::models::{FieldValue, Scalar, Template, TriggerDefinition, TriggerInput};
use crate::registry::TriggerRegistry;
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::substitution::{resolve, FieldValueMap};
use crate::templates::TemplateStore;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

pub struct EditorSession<S: KeyValueStore> {
    store: S,
    config: EditorConfig,
    matcher: ExpansionMatcher,
    buffer: TextBuffer,
    registry: TriggerRegistry,
    templates: TemplateStore,
    measurements: MeasurementLog,
}

/// Read a persisted blob, treating unreadable data as absent
fn load_or_warn<S: KeyValueStore, T: DeserializeOwned>(store: &S, key: &str) -> Option<T> {
    match load_json(store, key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring stored '{}': {}", key, e);
            None
        }
    }
}

impl<S: KeyValueStore> EditorSession<S> {
    pub fn new(store: S) -> Self {
        Self::load(store, EditorConfig::default())
    }

    /// Seed triggers and templates, then overlay whatever `store` holds
    pub fn load(store: S, config: EditorConfig) -> Self {
        let registry = match load_or_warn::<_, Vec<TriggerDefinition>>(&store, USER_TRIGGERS_KEY) {
            Some(definitions) => TriggerRegistry::from_definitions(definitions),
            None => TriggerRegistry::from_definitions(seed_triggers()),
        };

        let mut templates = TemplateStore::new(builtin_templates());
        if let Some(user) = load_or_warn::<_, Vec<Template>>(&store, USER_TEMPLATES_KEY) {
            templates.load_user_templates(user);
        }
        if let Some(ids) = load_or_warn::<_, Vec<String>>(&store, FAVORITE_TEMPLATES_KEY) {
            templates.load_favorites(ids);
        }
        if let Some(ids) = load_or_warn::<_, Vec<String>>(&store, RECENT_TEMPLATES_KEY) {
            templates.load_recent(ids);
        }

        let measurements = load_or_warn::<_, Vec<Measurement>>(&store, MEASUREMENTS_KEY)
            .map(MeasurementLog::from_entries)
            .unwrap_or_default();

        tracing::debug!(
            triggers = registry.len(),
            templates = templates.list().len(),
            measurements = measurements.len(),
            "Editor session loaded"
        );

        Self {
            store,
            config,
            matcher: ExpansionMatcher::new(config.separator_policy),
            buffer: TextBuffer::new(),
            registry,
            templates,
            measurements,
        }
    }

    pub fn config(&self) -> EditorConfig {
        self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    /// Replace the document, e.g. when opening a file
    pub fn set_text(&mut self, text: &str, cursor: usize) {
        self.buffer.set_content(text, cursor);
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn measurements(&self) -> &MeasurementLog {
        &self.measurements
    }

    pub fn stats(&self) -> ReportStats {
        self.buffer.stats()
    }

    // Editing

    pub fn handle_key(&mut self, key: KeyInput) -> KeyOutcome {
        self.matcher.handle_key(&mut self.buffer, &self.registry, key)
    }

    /// Evaluate a change event and adopt the resulting text and cursor
    pub fn on_change(&mut self, text: &str, cursor: usize) -> ChangeOutcome {
        let outcome = self
            .matcher
            .on_change(self.buffer.text(), text, cursor, &self.registry);
        self.buffer.set_content(&outcome.text, outcome.cursor);
        outcome
    }

    pub fn type_text(&mut self, text: &str) -> Vec<Expansion> {
        self.matcher.type_text(&mut self.buffer, &self.registry, text)
    }

    // Templates

    fn template(&self, id: &str) -> Result<&Template> {
        self.templates
            .get(id)
            .ok_or_else(|| RadtextError::TemplateNotFound(id.to_string()))
    }

    /// Values persisted for `template_id`, without defaults
    fn stored_values(&self, template: &Template) -> FieldValueMap {
        load_or_warn::<_, serde_json::Value>(&self.store, &field_values_key(&template.id))
            .map(|stored| FieldValueMap::from_json(template, &stored))
            .unwrap_or_default()
    }

    /// Field values for editing `id`: defaults overlaid with persisted values
    pub fn select_template(&self, id: &str) -> Result<FieldValueMap> {
        let template = self.template(id)?;
        let mut values = FieldValueMap::with_defaults(template);
        values.merge(self.stored_values(template));
        Ok(values)
    }

    pub fn set_field_value(
        &mut self,
        template_id: &str,
        field_id: &str,
        value: FieldValue,
    ) -> Result<FieldValueMap> {
        let template = self.template(template_id)?;
        let field = template.field(field_id).ok_or_else(|| {
            RadtextError::Other(format!(
                "Template '{}' has no field '{}'",
                template_id, field_id
            ))
        })?;
        if field.field_type != value.field_type() {
            return Err(RadtextError::Other(format!(
                "Field '{}' expects a {:?} value",
                field_id, field.field_type
            )));
        }
        if let FieldValue::Select(choice) = &value {
            if !field.options.contains(choice) {
                return Err(RadtextError::Other(format!(
                    "'{}' is not an option of field '{}': {}",
                    choice,
                    field.name,
                    field.options.join(", ")
                )));
            }
        }

        let mut stored = self.stored_values(template);
        stored.set(field_id, value);
        save_json(&mut self.store, &field_values_key(template_id), &stored.to_json())?;
        self.select_template(template_id)
    }

    /// Convert an untyped value with the field's type, then store it
    pub fn set_field_scalar(
        &mut self,
        template_id: &str,
        field_id: &str,
        scalar: &Scalar,
    ) -> Result<FieldValueMap> {
        let template = self.template(template_id)?;
        let field = template.field(field_id).ok_or_else(|| {
            RadtextError::Other(format!(
                "Template '{}' has no field '{}'",
                template_id, field_id
            ))
        })?;
        let value = FieldValue::from_scalar(field, scalar).ok_or_else(|| {
            RadtextError::Other(format!(
                "Invalid value for field '{}': expected {:?}",
                field.name, field.field_type
            ))
        })?;
        self.set_field_value(template_id, field_id, value)
    }

    pub fn set_section_enabled(
        &mut self,
        template_id: &str,
        section_id: &str,
        enabled: bool,
    ) -> Result<FieldValueMap> {
        let template = self.template(template_id)?;
        if template.section(section_id).is_none() {
            return Err(RadtextError::Other(format!(
                "Template '{}' has no section '{}'",
                template_id, section_id
            )));
        }

        let mut stored = self.stored_values(template);
        stored.set_section_enabled(section_id, enabled);
        save_json(&mut self.store, &field_values_key(template_id), &stored.to_json())?;
        self.select_template(template_id)
    }

    /// Render `id` with `values` without touching the document
    pub fn render_template(&self, id: &str, values: &FieldValueMap) -> Result<String> {
        Ok(resolve(self.template(id)?, values))
    }

    /// Render `id` and insert it at the cursor, separated from surrounding text by
    /// a blank line. The cursor lands after the report. Returns the inserted report text.
    pub fn insert_template(&mut self, id: &str, values: &FieldValueMap) -> Result<String> {
        let rendered = self.render_template(id, values)?;

        let before = self.buffer.text_before_cursor();
        let leading = if before.is_empty() || before.ends_with("\n\n") {
            ""
        } else if before.ends_with('\n') {
            "\n"
        } else {
            "\n\n"
        };
        let after = self.buffer.text_after_cursor();
        let trailing = if after.is_empty() || after.starts_with("\n\n") {
            ""
        } else if after.starts_with('\n') {
            "\n"
        } else {
            "\n\n"
        };

        self.buffer.insert_str(&format!("{}{}", leading, rendered));
        let cursor = self.buffer.cursor();
        self.buffer.insert_str(trailing);
        self.buffer.set_cursor(cursor);

        self.templates.mark_recent(id);
        if let Err(e) = save_json(&mut self.store, RECENT_TEMPLATES_KEY, &self.templates.recent_ids()) {
            tracing::warn!("Failed to save recent templates: {}", e);
        }

        tracing::info!(template = id, "Template inserted");
        Ok(rendered)
    }

    pub fn create_template(&mut self, input: Template) -> Result<Template> {
        let mut next = self.templates.clone();
        let template = next.create(input)?;
        save_json(&mut self.store, USER_TEMPLATES_KEY, next.user_templates())?;
        self.templates = next;
        tracing::info!(template = %template.id, "Template created");
        Ok(template)
    }

    pub fn update_template(&mut self, id: &str, input: Template) -> Result<Template> {
        let mut next = self.templates.clone();
        let template = next.update(id, input)?;
        save_json(&mut self.store, USER_TEMPLATES_KEY, next.user_templates())?;
        self.templates = next;
        Ok(template)
    }

    pub fn delete_template(&mut self, id: &str) -> Result<Template> {
        let mut next = self.templates.clone();
        let template = next.delete(id)?;
        save_json(&mut self.store, USER_TEMPLATES_KEY, next.user_templates())?;
        save_json(&mut self.store, FAVORITE_TEMPLATES_KEY, next.favorite_ids())?;
        save_json(&mut self.store, RECENT_TEMPLATES_KEY, &next.recent_ids())?;
        self.templates = next;
        tracing::info!(template = id, "Template deleted");
        Ok(template)
    }

    /// Flip the favourite flag of `id`; returns whether it is now a favourite
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        let mut next = self.templates.clone();
        let favorite = if next.remove_favorite(id) {
            false
        } else {
            next.add_favorite(id)?
        };
        save_json(&mut self.store, FAVORITE_TEMPLATES_KEY, next.favorite_ids())?;
        self.templates = next;
        Ok(favorite)
    }

    // Triggers

    fn commit_registry(&mut self, next: TriggerRegistry) -> Result<()> {
        save_json(&mut self.store, USER_TRIGGERS_KEY, next.triggers())?;
        self.registry = next;
        Ok(())
    }

    pub fn add_trigger(&mut self, input: TriggerInput) -> Result<TriggerDefinition> {
        let mut next = self.registry.clone();
        let entry = next.add(input)?;
        self.commit_registry(next)?;
        tracing::info!(trigger = %entry.trigger, "Trigger added");
        Ok(entry)
    }

    pub fn update_trigger(&mut self, id: &str, input: TriggerInput) -> Result<TriggerDefinition> {
        let mut next = self.registry.clone();
        let entry = next.update(id, input)?;
        self.commit_registry(next)?;
        Ok(entry)
    }

    pub fn delete_trigger(&mut self, id: &str) -> Result<TriggerDefinition> {
        let mut next = self.registry.clone();
        let entry = next.delete(id)?;
        self.commit_registry(next)?;
        tracing::info!(trigger = %entry.trigger, "Trigger deleted");
        Ok(entry)
    }

    // Measurements

    pub fn add_measurement(
        &mut self,
        name: &str,
        value: f64,
        unit: &str,
        date: NaiveDate,
    ) -> Result<Measurement> {
        let mut next = self.measurements.clone();
        let measurement = next.add(name, value, unit, date)?;
        save_json(&mut self.store, MEASUREMENTS_KEY, next.list())?;
        self.measurements = next;
        Ok(measurement)
    }

    pub fn delete_measurement(&mut self, id: &str) -> Result<Measurement> {
        let mut next = self.measurements.clone();
        let measurement = next.delete(id)?;
        save_json(&mut self.store, MEASUREMENTS_KEY, next.list())?;
        self.measurements = next;
        Ok(measurement)
    }

    // Generation

    /// Ask `generator` to work on the current document. The document is not changed.
    pub fn request_generation(
        &self,
        generator: &dyn TextGenerator,
        action: GenerationAction,
    ) -> Result<Generation> {
        generation::generate(generator, self.buffer.text(), action)
    }

    /// Append generated text to the document. Fallback results are never applied.
    pub fn apply_generation(&mut self, generation: &Generation) -> bool {
        if !generation.is_success() {
            return false;
        }
        self.buffer.append(&format!("\n\n{}", generation.text));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{OfflineGenerator, FALLBACK_TEXT};
    use crate::matcher::SeparatorPolicy;
    use crate::storage::MemoryStore;
    use crate::substitution::unresolved_placeholders;
    use crate::templates::{create_empty_section, create_empty_template};

    /// Store whose writes can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: bool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, blob: &str) -> Result<()> {
            if self.fail_writes {
                return Err(RadtextError::Other("disk full".to_string()));
            }
            self.inner.set(key, blob)
        }
    }

    struct Canned(&'static str);

    impl TextGenerator for Canned {
        fn generate(&self, _content: &str, _action: GenerationAction) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn session() -> EditorSession<MemoryStore> {
        EditorSession::new(MemoryStore::new())
    }

    fn user_template(name: &str) -> Template {
        let mut template = create_empty_template();
        template.name = name.to_string();
        template.description = "Abdome total".to_string();
        template.body_part = "Abdome".to_string();
        template.sections.push(create_empty_section());
        template.sections[0].title = "Achados".to_string();
        template.sections[0].content = "Fígado de dimensões normais.".to_string();
        template
    }

    #[test]
    fn test_typing_expands_with_configured_policy() {
        let mut session = session();
        session.type_text("Exame sem /n");
        session.handle_key(KeyInput::Char(' '));
        assert_eq!(session.text(), "Exame sem normal ");

        let mut session = EditorSession::load(
            MemoryStore::new(),
            EditorConfig::with_separator_policy(SeparatorPolicy::Consume),
        );
        session.type_text("Exame sem /n ");
        assert_eq!(session.text(), "Exame sem normal");
        assert_eq!(session.buffer().cursor(), 16);
    }

    #[test]
    fn test_on_change_updates_buffer() {
        let mut session = session();
        let outcome = session.on_change("Rim /d ", 7);
        assert!(outcome.expansion.is_some());
        assert_eq!(session.text(), "Rim direito ");
        assert_eq!(session.buffer().cursor(), 12);

        // deleting back to a trigger followed by a space does not expand it
        session.set_text("Rim /d x", 8);
        let outcome = session.on_change("Rim /d ", 7);
        assert!(outcome.expansion.is_none());
        assert_eq!(session.text(), "Rim /d ");
    }

    #[test]
    fn test_insert_template_into_empty_buffer() {
        let mut session = session();
        let values = session.select_template("ct-chest-normal").unwrap();
        session.insert_template("ct-chest-normal", &values).unwrap();

        let text = session.text();
        assert!(text.starts_with("Técnica:\n"));
        assert!(text.rsplit("\n\n").next().unwrap().starts_with("Impressão:\n"));
        assert!(unresolved_placeholders(text).is_empty());
        assert_eq!(session.buffer().cursor(), session.buffer().len_chars());
        assert_eq!(session.templates().recent_ids(), vec!["ct-chest-normal".to_string()]);
    }

    #[test]
    fn test_insert_template_separates_from_existing_text() {
        let mut session = session();
        session.type_text("Paciente em jejum.");
        let values = FieldValueMap::new();
        let rendered = session.insert_template("mri-brain-normal", &values).unwrap();
        assert_eq!(session.text(), format!("Paciente em jejum.\n\n{}", rendered));

        assert!(matches!(
            session.insert_template("missing", &values),
            Err(RadtextError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_insert_template_mid_text_keeps_following_text_apart() {
        let mut session = session();
        session.set_text("Achados.Conclusão.", 8);
        let rendered = session
            .insert_template("mri-brain-normal", &FieldValueMap::new())
            .unwrap();

        assert_eq!(
            session.text(),
            format!("Achados.\n\n{}\n\nConclusão.", rendered)
        );
        assert_eq!(
            session.buffer().cursor(),
            "Achados.\n\n".chars().count() + rendered.chars().count()
        );

        session.set_text("Fim.\n\nNotas.", 4);
        let rendered = session
            .insert_template("mri-brain-normal", &FieldValueMap::new())
            .unwrap();
        assert_eq!(session.text(), format!("Fim.\n\n{}\n\nNotas.", rendered));
    }

    #[test]
    fn test_set_field_scalar_types_the_value() {
        let mut session = session();
        let values = session
            .set_field_scalar("xr-chest-normal", "cardio-thoracic-index", &Scalar::Text("48,5".to_string()))
            .unwrap();
        assert_eq!(
            values.get("cardio-thoracic-index"),
            Some(&FieldValue::Measurement(48.5, "%".to_string()))
        );

        for raw in ["largo", "NaN"] {
            assert!(session
                .set_field_scalar("xr-chest-normal", "cardio-thoracic-index", &Scalar::Text(raw.to_string()))
                .is_err());
        }
        assert!(session
            .set_field_scalar("xr-chest-normal", "missing", &Scalar::Bool(true))
            .is_err());
    }

    #[test]
    fn test_field_values_persist_and_overlay_defaults() {
        let mut session = session();
        session
            .set_field_value("ct-chest-covid", "involvement", FieldValue::Select("25-50%".to_string()))
            .unwrap();
        session
            .set_section_enabled("ct-chest-normal", "comparison", true)
            .unwrap();

        let reopened = EditorSession::new(session.store().clone());
        let values = reopened.select_template("ct-chest-covid").unwrap();
        assert_eq!(values.get("involvement"), Some(&FieldValue::Select("25-50%".to_string())));
        assert_eq!(values.get("pattern"), Some(&FieldValue::Select("Típico".to_string())));
        assert!(reopened
            .select_template("ct-chest-normal")
            .unwrap()
            .is_section_enabled("comparison"));
    }

    #[test]
    fn test_set_field_value_checks_type() {
        let mut session = session();
        assert!(session
            .set_field_value("ct-chest-covid", "involvement", FieldValue::Boolean(true))
            .is_err());
        assert!(session
            .set_field_value("ct-chest-covid", "nope", FieldValue::Text("x".to_string()))
            .is_err());
        assert!(session
            .set_field_value("ct-chest-covid", "involvement", FieldValue::Select("90%".to_string()))
            .is_err());
        assert!(session.store().get("templateDynamicValues-ct-chest-covid").unwrap().is_none());
    }

    #[test]
    fn test_triggers_persist() {
        let mut session = session();
        let added = session
            .add_trigger(TriggerInput::new("/hep", "hepatomegalia").with_category("phrases"))
            .unwrap();
        assert!(matches!(
            session.add_trigger(TriggerInput::new("/HEP", "x")),
            Err(RadtextError::DuplicateTrigger(_))
        ));
        session.delete_trigger("normal").unwrap();

        let mut reopened = EditorSession::new(session.store().clone());
        assert_eq!(reopened.registry().get(&added.id).unwrap().content, "hepatomegalia");
        assert!(reopened.registry().find_trigger("/n").is_none());
        reopened.type_text("/hep ");
        assert_eq!(reopened.text(), "hepatomegalia ");
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let mut session = EditorSession::new(FlakyStore::default());
        let before = session.registry().len();
        session.store.fail_writes = true;

        assert!(session.add_trigger(TriggerInput::new("/zz", "zz")).is_err());
        assert_eq!(session.registry().len(), before);
        assert!(session.create_template(user_template("Abdome")).is_err());
        assert!(session.templates().user_templates().is_empty());
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(session.add_measurement("Baço", 10.0, "cm", date).is_err());
        assert!(session.measurements().is_empty());
    }

    #[test]
    fn test_template_lifecycle() {
        let mut session = session();
        let created = session.create_template(user_template("Abdome normal")).unwrap();
        assert!(created.id.starts_with("user-"));
        assert!(session.toggle_favorite(&created.id).unwrap());

        let mut invalid = created.clone();
        invalid.name.clear();
        assert!(matches!(
            session.update_template(&created.id, invalid),
            Err(RadtextError::ValidationFailure(_))
        ));
        assert_eq!(session.templates().get(&created.id).unwrap().name, "Abdome normal");

        assert!(matches!(
            session.delete_template("ct-chest-normal"),
            Err(RadtextError::BuiltinTemplate(_))
        ));
        session.delete_template(&created.id).unwrap();

        let reopened = EditorSession::new(session.store().clone());
        assert!(reopened.templates().user_templates().is_empty());
        assert!(reopened.templates().favorite_ids().is_empty());
    }

    #[test]
    fn test_corrupt_blobs_are_ignored() {
        let mut store = MemoryStore::new();
        store.set(USER_TRIGGERS_KEY, "{oops").unwrap();
        store.set(MEASUREMENTS_KEY, "42").unwrap();
        let session = EditorSession::new(store);
        assert_eq!(session.registry().len(), seed_triggers().len());
        assert!(session.measurements().is_empty());
    }

    #[test]
    fn test_generation_fallback_never_touches_buffer() {
        let mut session = session();
        assert!(matches!(
            session.request_generation(&OfflineGenerator, GenerationAction::GenerateReport),
            Err(RadtextError::EmptyContent)
        ));

        session.type_text("Fígado normal.");
        let generation = session
            .request_generation(&OfflineGenerator, GenerationAction::GenerateImpressions)
            .unwrap();
        assert_eq!(generation.text, FALLBACK_TEXT);
        assert!(!session.apply_generation(&generation));
        assert_eq!(session.text(), "Fígado normal.");

        let generation = session
            .request_generation(&Canned("Sem alterações."), GenerationAction::GenerateImpressions)
            .unwrap();
        assert!(session.apply_generation(&generation));
        assert_eq!(session.text(), "Fígado normal.\n\nSem alterações.");
    }

    #[test]
    fn test_measurements_and_stats() {
        let mut session = session();
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let m = session.add_measurement("Nódulo", 7.0, "mm", date).unwrap();
        assert_eq!(session.measurements().len(), 1);
        session.delete_measurement(&m.id).unwrap();
        assert!(session.measurements().is_empty());

        session.type_text("Exame sem /nc");
        let stats = session.stats();
        assert_eq!(stats.words, 3);
        assert_eq!(stats.progress, 3);
    }
}
