//! Editor state and key handling, independent of the terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use radtext_core::models::{format_number, FieldType};
use radtext_core::substitution::unresolved_placeholders;
use radtext_core::{
    EditorSession, FieldValue, Generation, GenerationAction, KeyInput, KeyOutcome, KeyValueStore,
    RadtextError, Result, Scalar, Template, TemplateFilter, TextGenerator,
};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplatePicker {
    pub query: String,
    pub selected: usize,
}

/// A row of the template form: a section, or one of its fields (section, field index)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormRow {
    Section(usize),
    Field(usize, usize),
}

/// Sections in order, each followed by its fields
pub fn form_rows(template: &Template) -> Vec<FormRow> {
    let mut rows = Vec::new();
    for (s, section) in template.sections.iter().enumerate() {
        rows.push(FormRow::Section(s));
        rows.extend((0..section.dynamic_fields.len()).map(|f| FormRow::Field(s, f)));
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInput {
    pub field_id: String,
    pub text: String,
}

/// Field values of one template, edited before it is inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateForm {
    pub template_id: String,
    pub selected: usize,
    pub input: Option<FieldInput>,
    /// Picker state restored on Esc
    pub picker: TemplatePicker,
}

impl TemplateForm {
    pub fn new(template_id: impl Into<String>, picker: TemplatePicker) -> Self {
        Self {
            template_id: template_id.into(),
            selected: 0,
            input: None,
            picker,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    Templates(TemplatePicker),
    TemplateForm(TemplateForm),
    Triggers { scroll: u16 },
    GenerationMenu { selected: usize },
    GenerationResult(Generation),
}

pub struct EditorApp<'a, S: KeyValueStore> {
    pub session: &'a mut EditorSession<S>,
    generator: &'a dyn TextGenerator,
    pub popup: Option<Popup>,
    pub status: Option<StatusMessage>,
    pub file: Option<PathBuf>,
    pub dirty: bool,
    pub exiting: bool,
    quit_pending: bool,
}

/// Translate a terminal key into an editor keystroke; control chords are not keystrokes
pub fn map_key(key: KeyEvent) -> Option<KeyInput> {
    if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
        return None;
    }
    let input = match key.code {
        KeyCode::Char(c) => KeyInput::Char(c),
        KeyCode::Enter => KeyInput::Enter,
        KeyCode::Tab => KeyInput::Tab,
        KeyCode::Backspace => KeyInput::Backspace,
        KeyCode::Delete => KeyInput::Delete,
        KeyCode::Left => KeyInput::Left,
        KeyCode::Right => KeyInput::Right,
        KeyCode::Up => KeyInput::Up,
        KeyCode::Down => KeyInput::Down,
        KeyCode::Home => KeyInput::Home,
        KeyCode::End => KeyInput::End,
        _ => return None,
    };
    Some(input)
}

fn ctrl(key: &KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(c)
}

impl<'a, S: KeyValueStore> EditorApp<'a, S> {
    pub fn new(
        session: &'a mut EditorSession<S>,
        generator: &'a dyn TextGenerator,
        file: Option<PathBuf>,
    ) -> Self {
        Self {
            session,
            generator,
            popup: None,
            status: None,
            file,
            dirty: false,
            exiting: false,
            quit_pending: false,
        }
    }

    /// Load the document from the file, if one was given and exists
    pub fn open(&mut self) -> Result<()> {
        if let Some(path) = &self.file {
            if path.exists() {
                let content = fs::read_to_string(path)?;
                let end = content.chars().count();
                self.session.set_text(&content, end);
                tracing::info!("Opened {}", path.display());
            }
        }
        Ok(())
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind: StatusKind::Info,
        });
    }

    fn success(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind: StatusKind::Success,
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind: StatusKind::Error,
        });
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) {
        match self.popup.take() {
            None => self.handle_editor_key(key),
            Some(Popup::Templates(picker)) => self.handle_picker_key(picker, key),
            Some(Popup::TemplateForm(form)) => self.handle_form_key(form, key),
            Some(Popup::Triggers { scroll }) => self.handle_triggers_key(scroll, key),
            Some(Popup::GenerationMenu { selected }) => self.handle_generation_menu_key(selected, key),
            Some(Popup::GenerationResult(generation)) => {
                self.handle_generation_result_key(generation, key)
            }
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc || ctrl(&key, 'q') {
            if self.dirty && !self.quit_pending {
                self.quit_pending = true;
                self.error("Unsaved changes: press Esc or Ctrl+Q again to quit, Ctrl+S to save");
                return;
            }
            self.exiting = true;
            return;
        }
        if self.quit_pending {
            self.quit_pending = false;
            self.status = None;
        }
        if ctrl(&key, 's') {
            if let Err(e) = self.save() {
                self.error(format!("Error: {}", e));
            }
            return;
        }
        if ctrl(&key, 't') {
            self.popup = Some(Popup::Templates(TemplatePicker::default()));
            return;
        }
        if key.code == KeyCode::F(1) || ctrl(&key, 'k') {
            self.popup = Some(Popup::Triggers { scroll: 0 });
            return;
        }
        if ctrl(&key, 'g') {
            self.popup = Some(Popup::GenerationMenu { selected: 0 });
            return;
        }
        if ctrl(&key, 'y') {
            let text = self.session.text().to_string();
            self.copy(&text, "Report copied to clipboard");
            return;
        }

        let Some(input) = map_key(key) else {
            return;
        };
        match self.session.handle_key(input) {
            KeyOutcome::Expanded(expansion) => {
                self.dirty = true;
                self.success(expansion.notice());
            }
            KeyOutcome::Inserted | KeyOutcome::Indented | KeyOutcome::Deleted => {
                self.dirty = true;
            }
            KeyOutcome::Moved | KeyOutcome::Unchanged => {}
        }
    }

    /// Templates matching the picker query, favourites first
    pub fn template_results(&self, query: &str) -> Vec<&Template> {
        let templates = self.session.templates();
        let mut results = templates.search(query, &TemplateFilter::default());
        results.sort_by_key(|t| !templates.favorite_ids().contains(&t.id));
        results
    }

    fn handle_picker_key(&mut self, mut picker: TemplatePicker, key: KeyEvent) {
        let count = self.template_results(&picker.query).len();
        match key.code {
            KeyCode::Esc => return,
            KeyCode::Up => picker.selected = picker.selected.saturating_sub(1),
            KeyCode::Down => {
                if picker.selected + 1 < count {
                    picker.selected += 1;
                }
            }
            KeyCode::Enter => {
                let id = self
                    .template_results(&picker.query)
                    .get(picker.selected)
                    .map(|t| t.id.clone());
                match id {
                    Some(id) => {
                        if let Err(e) = self.insert_template(&id) {
                            self.error(format!("Error: {}", e));
                        }
                        return;
                    }
                    None => self.info("No template matches"),
                }
            }
            KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                let id = self
                    .template_results(&picker.query)
                    .get(picker.selected)
                    .map(|t| t.id.clone());
                match id {
                    Some(id) => {
                        self.popup = Some(Popup::TemplateForm(TemplateForm::new(id, picker)));
                        return;
                    }
                    None => self.info("No template matches"),
                }
            }
            KeyCode::Char('f') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                let id = self
                    .template_results(&picker.query)
                    .get(picker.selected)
                    .map(|t| t.id.clone());
                if let Some(id) = id {
                    match self.session.toggle_favorite(&id) {
                        Ok(true) => self.info("Added to favourites"),
                        Ok(false) => self.info("Removed from favourites"),
                        Err(e) => self.error(format!("Error: {}", e)),
                    }
                    picker.selected = 0;
                }
            }
            KeyCode::Backspace => {
                picker.query.pop();
                picker.selected = 0;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                picker.query.push(c);
                picker.selected = 0;
            }
            _ => {}
        }
        self.popup = Some(Popup::Templates(picker));
    }

    fn handle_form_key(&mut self, mut form: TemplateForm, key: KeyEvent) {
        if let Some(mut input) = form.input.take() {
            match key.code {
                KeyCode::Esc => {}
                KeyCode::Enter => {
                    let scalar = Scalar::Text(input.text);
                    if let Err(e) =
                        self.session
                            .set_field_scalar(&form.template_id, &input.field_id, &scalar)
                    {
                        self.error(format!("Error: {}", e));
                    }
                }
                KeyCode::Backspace => {
                    input.text.pop();
                    form.input = Some(input);
                }
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    input.text.push(c);
                    form.input = Some(input);
                }
                _ => form.input = Some(input),
            }
            self.popup = Some(Popup::TemplateForm(form));
            return;
        }

        let Some(template) = self.session.templates().get(&form.template_id).cloned() else {
            self.error(format!("Template not found: {}", form.template_id));
            return;
        };
        let rows = form_rows(&template);
        match key.code {
            KeyCode::Esc => {
                self.popup = Some(Popup::Templates(form.picker));
                return;
            }
            KeyCode::Tab => {
                if let Err(e) = self.insert_template(&template.id) {
                    self.error(format!("Error: {}", e));
                }
                return;
            }
            KeyCode::Up => form.selected = form.selected.saturating_sub(1),
            KeyCode::Down => {
                if form.selected + 1 < rows.len() {
                    form.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(row) = rows.get(form.selected) {
                    match self.change_row(&template, *row) {
                        Ok(input) => form.input = input,
                        Err(e) => self.error(format!("Error: {}", e)),
                    }
                }
            }
            _ => {}
        }
        self.popup = Some(Popup::TemplateForm(form));
    }

    /// Toggle a section or boolean, cycle a select; text and measurements start an input
    fn change_row(&mut self, template: &Template, row: FormRow) -> Result<Option<FieldInput>> {
        let values = self.session.select_template(&template.id)?;
        match row {
            FormRow::Section(s) => {
                let section = &template.sections[s];
                if section.is_optional {
                    let enabled = !values.is_section_enabled(&section.id);
                    self.session
                        .set_section_enabled(&template.id, &section.id, enabled)?;
                } else {
                    self.info(format!("'{}' is always included", section.title));
                }
                Ok(None)
            }
            FormRow::Field(s, f) => {
                let field = &template.sections[s].dynamic_fields[f];
                let current = values.get(&field.id);
                let value = match field.field_type {
                    FieldType::Boolean => {
                        FieldValue::Boolean(!matches!(current, Some(FieldValue::Boolean(true))))
                    }
                    FieldType::Select if !field.options.is_empty() => {
                        let next = match current {
                            Some(FieldValue::Select(choice)) => field
                                .options
                                .iter()
                                .position(|o| o == choice)
                                .map_or(0, |i| (i + 1) % field.options.len()),
                            _ => 0,
                        };
                        FieldValue::Select(field.options[next].clone())
                    }
                    FieldType::Select => return Ok(None),
                    FieldType::Text | FieldType::Measurement => {
                        let text = match current {
                            Some(FieldValue::Measurement(n, _)) => format_number(*n),
                            Some(value) => value.render(None),
                            None => String::new(),
                        };
                        return Ok(Some(FieldInput {
                            field_id: field.id.clone(),
                            text,
                        }));
                    }
                };
                self.session.set_field_value(&template.id, &field.id, value)?;
                Ok(None)
            }
        }
    }

    fn insert_template(&mut self, id: &str) -> Result<()> {
        let values = self.session.select_template(id)?;
        let rendered = self.session.insert_template(id, &values)?;
        self.dirty = true;

        let name = self
            .session
            .templates()
            .get(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| id.to_string());
        let unresolved = unresolved_placeholders(&rendered);
        if unresolved.is_empty() {
            self.success(format!("Template '{}' inserted", name));
        } else {
            self.info(format!(
                "Template '{}' inserted, fill in {}",
                name,
                unresolved.join(", ")
            ));
        }
        Ok(())
    }

    fn handle_triggers_key(&mut self, scroll: u16, key: KeyEvent) {
        let scroll = match key.code {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Enter => return,
            KeyCode::Char('k') if key.modifiers.contains(KeyModifiers::CONTROL) => return,
            KeyCode::Up => scroll.saturating_sub(1),
            KeyCode::Down => scroll.saturating_add(1),
            KeyCode::PageUp => scroll.saturating_sub(10),
            KeyCode::PageDown => scroll.saturating_add(10),
            _ => scroll,
        };
        self.popup = Some(Popup::Triggers { scroll });
    }

    fn handle_generation_menu_key(&mut self, selected: usize, key: KeyEvent) {
        let selected = match key.code {
            KeyCode::Esc => return,
            KeyCode::Up => selected.saturating_sub(1),
            KeyCode::Down => (selected + 1).min(GenerationAction::ALL.len() - 1),
            KeyCode::Enter => {
                let action = GenerationAction::ALL[selected];
                match self.session.request_generation(self.generator, action) {
                    Ok(generation) => {
                        if let Some(notice) = &generation.notice {
                            self.error(notice.clone());
                        }
                        self.popup = Some(Popup::GenerationResult(generation));
                    }
                    Err(RadtextError::EmptyContent) => {
                        self.error("Write something in the report before using the assistant")
                    }
                    Err(e) => self.error(format!("Error: {}", e)),
                }
                return;
            }
            _ => selected,
        };
        self.popup = Some(Popup::GenerationMenu { selected });
    }

    fn handle_generation_result_key(&mut self, generation: Generation, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {}
            KeyCode::Enter | KeyCode::Char('a') => {
                if self.session.apply_generation(&generation) {
                    self.dirty = true;
                    self.success(format!("{} added to the report", generation.title()));
                } else {
                    self.info("Nothing was added to the report");
                }
            }
            KeyCode::Char('c') => {
                self.copy(&generation.text, "Generated text copied to clipboard");
                self.popup = Some(Popup::GenerationResult(generation));
            }
            _ => self.popup = Some(Popup::GenerationResult(generation)),
        }
    }

    fn copy(&mut self, text: &str, message: &str) {
        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
        match result {
            Ok(()) => self.success(message),
            Err(e) => self.error(format!("Clipboard error: {}", e)),
        }
    }

    /// Write the document to its file
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .file
            .clone()
            .ok_or_else(|| RadtextError::Other("No file to save to, start with --file".to_string()))?;
        fs::write(&path, self.session.text())?;
        self.dirty = false;
        tracing::info!("Saved {}", path.display());
        self.success(format!("Saved {}", path.display()));
        Ok(())
    }
}
