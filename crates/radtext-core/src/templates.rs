//! Template store: built-in and user templates, search, validation and the
//! import/export helpers used by the surfaces.

use crate::error::{RadtextError, Result};
use crate::models::{FieldType, Modality, Template, TemplateSection, TemplateType};
#[cfg(test)]
use crate::models::DynamicField;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;
use uuid::Uuid;

/// Number of templates kept in the recently-used list
pub const MAX_RECENT_TEMPLATES: usize = 10;

/// Exact-match filters combined with the free-text query in [`TemplateStore::search`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFilter {
    pub modality: Option<Modality>,
    pub body_part: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<TemplateType>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Modality,
    BodyPart,
    Type,
}

impl FromStr for SortKey {
    type Err = RadtextError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "modality" => Ok(SortKey::Modality),
            "body-part" | "bodypart" => Ok(SortKey::BodyPart),
            "type" => Ok(SortKey::Type),
            other => Err(RadtextError::Other(format!("Unknown sort key '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    builtins: Vec<Template>,
    user: Vec<Template>,
    favorites: Vec<String>,
    recent: VecDeque<String>,
}

impl TemplateStore {
    pub fn new(builtins: Vec<Template>) -> Self {
        Self {
            builtins,
            user: Vec::new(),
            favorites: Vec::new(),
            recent: VecDeque::new(),
        }
    }

    /// Replace the user templates, e.g. with the persisted list.
    ///
    /// Entries that fail validation or reuse a built-in id are skipped.
    pub fn load_user_templates(&mut self, templates: Vec<Template>) {
        self.user.clear();
        for template in templates {
            let errors = validate(&template);
            if !errors.is_empty() {
                tracing::warn!(
                    "Skipping stored template '{}': {}",
                    template.id,
                    errors.join(", ")
                );
                continue;
            }
            if self.get(&template.id).is_some() {
                tracing::warn!("Skipping stored template with duplicate id '{}'", template.id);
                continue;
            }
            self.user.push(template);
        }
    }

    /// Built-ins first, then user templates
    pub fn list(&self) -> Vec<&Template> {
        self.builtins.iter().chain(self.user.iter()).collect()
    }

    pub fn user_templates(&self) -> &[Template] {
        &self.user
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.builtins
            .iter()
            .chain(self.user.iter())
            .find(|t| t.id == id)
    }

    pub fn is_builtin(&self, id: &str) -> bool {
        self.builtins.iter().any(|t| t.id == id)
    }

    pub fn search(&self, query: &str, filter: &TemplateFilter) -> Vec<&Template> {
        self.list()
            .into_iter()
            .filter(|t| matches_query(t, query) && matches_filter(t, filter))
            .collect()
    }

    /// Validate `input` and store it as a new user template with a fresh id
    pub fn create(&mut self, input: Template) -> Result<Template> {
        let errors = validate(&input);
        if !errors.is_empty() {
            tracing::debug!("Rejected template '{}': {}", input.name, errors.join(", "));
            return Err(RadtextError::ValidationFailure(errors));
        }

        let now = Utc::now();
        let mut template = input;
        template.id = format!("user-{}", Uuid::new_v4());
        template.is_custom = true;
        template.created_at = Some(now);
        template.updated_at = Some(now);
        assign_missing_ids(&mut template);

        self.user.push(template.clone());
        Ok(template)
    }

    /// Replace a user template, keeping its id and creation time
    pub fn update(&mut self, id: &str, input: Template) -> Result<Template> {
        if self.is_builtin(id) {
            return Err(RadtextError::BuiltinTemplate(id.to_string()));
        }
        let errors = validate(&input);
        if !errors.is_empty() {
            return Err(RadtextError::ValidationFailure(errors));
        }

        let existing = self
            .user
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RadtextError::TemplateNotFound(id.to_string()))?;

        let created_at = existing.created_at;
        let mut template = input;
        template.id = id.to_string();
        template.is_custom = true;
        template.created_at = created_at;
        template.updated_at = Some(Utc::now());
        assign_missing_ids(&mut template);

        *existing = template.clone();
        Ok(template)
    }

    pub fn delete(&mut self, id: &str) -> Result<Template> {
        if self.is_builtin(id) {
            return Err(RadtextError::BuiltinTemplate(id.to_string()));
        }
        let index = self
            .user
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| RadtextError::TemplateNotFound(id.to_string()))?;

        self.favorites.retain(|f| f != id);
        self.recent.retain(|r| r != id);
        Ok(self.user.remove(index))
    }

    pub fn favorites(&self) -> Vec<&Template> {
        self.favorites.iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn favorite_ids(&self) -> &[String] {
        &self.favorites
    }

    /// Returns false when the template was already a favourite
    pub fn add_favorite(&mut self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            return Err(RadtextError::TemplateNotFound(id.to_string()));
        }
        if self.favorites.iter().any(|f| f == id) {
            return Ok(false);
        }
        self.favorites.push(id.to_string());
        Ok(true)
    }

    pub fn remove_favorite(&mut self, id: &str) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|f| f != id);
        before != self.favorites.len()
    }

    /// Most recently used first
    pub fn recent(&self) -> Vec<&Template> {
        self.recent.iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn recent_ids(&self) -> Vec<String> {
        self.recent.iter().cloned().collect()
    }

    pub fn mark_recent(&mut self, id: &str) {
        self.recent.retain(|r| r != id);
        self.recent.push_front(id.to_string());
        self.recent.truncate(MAX_RECENT_TEMPLATES);
    }

    pub fn load_favorites(&mut self, ids: Vec<String>) {
        self.favorites.clear();
        for id in ids {
            if !self.favorites.contains(&id) {
                self.favorites.push(id);
            }
        }
    }

    pub fn load_recent(&mut self, ids: Vec<String>) {
        self.recent = ids.into_iter().take(MAX_RECENT_TEMPLATES).collect();
    }
}

fn matches_query(template: &Template, query: &str) -> bool {
    let query = query.to_lowercase();
    template.name.to_lowercase().contains(&query)
        || template.description.to_lowercase().contains(&query)
        || template
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&query))
}

fn matches_filter(template: &Template, filter: &TemplateFilter) -> bool {
    if let Some(modality) = filter.modality {
        if template.modality != modality {
            return false;
        }
    }
    if let Some(body_part) = &filter.body_part {
        if &template.body_part != body_part {
            return false;
        }
    }
    if let Some(template_type) = filter.template_type {
        if template.template_type != template_type {
            return false;
        }
    }
    filter.tags.iter().all(|tag| template.tags.contains(tag))
}

fn assign_missing_ids(template: &mut Template) {
    for section in &mut template.sections {
        if section.id.is_empty() {
            section.id = Uuid::new_v4().to_string();
        }
        for field in &mut section.dynamic_fields {
            if field.id.is_empty() {
                field.id = Uuid::new_v4().to_string();
            }
        }
    }
}

/// Check a template before it is stored; an empty list means it is valid.
///
/// Modality and type are typed, so they are present whenever a template exists.
pub fn validate(template: &Template) -> Vec<String> {
    let mut errors = Vec::new();

    if template.name.trim().is_empty() {
        errors.push("Template name is required".to_string());
    }
    if template.description.trim().is_empty() {
        errors.push("Template description is required".to_string());
    }
    if template.body_part.trim().is_empty() {
        errors.push("Template body part is required".to_string());
    }
    if template.sections.is_empty() {
        errors.push("Template must have at least one section".to_string());
    }

    for (index, section) in template.sections.iter().enumerate() {
        let label = section_label(index, section);
        if section.title.trim().is_empty() {
            errors.push(format!("{} title is required", label));
        }
        if section.content.trim().is_empty() {
            errors.push(format!("{} content is required", label));
        }

        for (field_index, field) in section.dynamic_fields.iter().enumerate() {
            let field_label = if field.name.trim().is_empty() {
                format!("Field {}", field_index + 1)
            } else {
                format!("Field {} ('{}')", field_index + 1, field.name)
            };
            if field.name.trim().is_empty() {
                errors.push(format!("{} in {} name is required", field_label, label));
            }
            if field.field_type == FieldType::Select && field.options.is_empty() {
                errors.push(format!("{} in {} must have options", field_label, label));
            }
        }
    }

    errors
}

fn section_label(index: usize, section: &TemplateSection) -> String {
    if section.title.trim().is_empty() {
        format!("Section {}", index + 1)
    } else {
        format!("Section {} ('{}')", index + 1, section.title)
    }
}

pub fn export_template(template: &Template) -> Result<String> {
    Ok(serde_json::to_string_pretty(template)?)
}

/// Parse and validate an exported template
pub fn import_template(json: &str) -> Result<Template> {
    let template: Template = serde_json::from_str(json)?;
    let errors = validate(&template);
    if !errors.is_empty() {
        return Err(RadtextError::ValidationFailure(errors));
    }
    Ok(template)
}

pub fn generate_template_id(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
pub fn create_empty_template() -> Template {
    Template {
        id: generate_template_id("new-template"),
        name: String::new(),
        description: String::new(),
        modality: Modality::Ct,
        body_part: String::new(),
        template_type: TemplateType::Normal,
        tags: vec![],
        sections: vec![],
        shortcut: None,
        is_custom: true,
        created_at: None,
        updated_at: None,
    }
}

#[cfg(test)]
pub fn create_empty_section() -> TemplateSection {
    TemplateSection {
        id: Uuid::new_v4().to_string(),
        title: String::new(),
        content: String::new(),
        is_optional: false,
        dynamic_fields: vec![],
    }
}

#[cfg(test)]
pub fn create_dynamic_field() -> DynamicField {
    DynamicField {
        id: Uuid::new_v4().to_string(),
        name: String::new(),
        field_type: FieldType::Text,
        options: vec![],
        default_value: None,
        unit: None,
    }
}

/// Copy of `template` with "(Copy)" appended to its name and fresh section/field ids
pub fn clone_template(template: &Template) -> Template {
    let mut copy = template.clone();
    copy.id = generate_template_id(&format!("{}-copy", template.name));
    copy.name = format!("{} (Copy)", template.name);
    copy.is_custom = true;
    for section in &mut copy.sections {
        section.id = Uuid::new_v4().to_string();
        for field in &mut section.dynamic_fields {
            field.id = Uuid::new_v4().to_string();
        }
    }
    copy
}

/// `first` with the sections of `second` appended and the tags of both, de-duplicated.
/// Appended sections and their fields get fresh ids.
pub fn merge_templates(first: &Template, second: &Template) -> Template {
    let mut merged = first.clone();
    merged.sections.extend(second.sections.iter().cloned().map(|mut section| {
        section.id = Uuid::new_v4().to_string();
        for field in &mut section.dynamic_fields {
            field.id = Uuid::new_v4().to_string();
        }
        section
    }));
    for tag in &second.tags {
        if !merged.tags.contains(tag) {
            merged.tags.push(tag.clone());
        }
    }
    merged
}

pub fn sort_templates<'a>(
    templates: &[&'a Template],
    key: SortKey,
    order: SortOrder,
) -> Vec<&'a Template> {
    let sort_value = |t: &Template| -> String {
        match key {
            SortKey::Name => t.name.to_lowercase(),
            SortKey::Modality => t.modality.as_str().to_lowercase(),
            SortKey::BodyPart => t.body_part.to_lowercase(),
            SortKey::Type => t.template_type.as_str().to_string(),
        }
    };

    let mut sorted = templates.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = sort_value(*a).cmp(&sort_value(*b));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}

pub fn group_by_modality<'a>(templates: &[&'a Template]) -> BTreeMap<Modality, Vec<&'a Template>> {
    let mut groups: BTreeMap<Modality, Vec<&Template>> = BTreeMap::new();
    for template in templates {
        groups.entry(template.modality).or_default().push(*template);
    }
    groups
}

pub fn group_by_body_part<'a>(templates: &[&'a Template]) -> BTreeMap<String, Vec<&'a Template>> {
    let mut groups: BTreeMap<String, Vec<&Template>> = BTreeMap::new();
    for template in templates {
        groups
            .entry(template.body_part.clone())
            .or_default()
            .push(*template);
    }
    groups
}
