//! Plain-text listings printed by the subcommands.

use crate::cli::TemplateGrouping;
use radtext_core::templates::{group_by_body_part, group_by_modality};
use radtext_core::{FieldValueMap, Measurement, MeasurementLog, Template, TriggerRegistry};

/// Triggers grouped by category, one `trigger  content  [id]` row each
pub fn trigger_listing(registry: &TriggerRegistry) -> String {
    let mut out = String::new();
    for (category, triggers) in registry.list_by_category() {
        out.push_str(&format!("{}\n", category));
        for entry in triggers {
            out.push_str(&format!(
                "  {:<8} {}  [{}]\n",
                entry.trigger,
                entry.content.replace('\n', " ↵ "),
                entry.id
            ));
        }
    }
    out
}

/// One row per template, optionally under modality or body part headings
pub fn template_listing(
    templates: &[&Template],
    favorites: &[String],
    grouping: Option<TemplateGrouping>,
) -> String {
    let rows = |templates: &[&Template]| -> String {
        templates
            .iter()
            .map(|t| format!("{}\n", template_row(t, favorites.contains(&t.id))))
            .collect()
    };

    match grouping {
        None => rows(templates),
        Some(TemplateGrouping::Modality) => group_by_modality(templates)
            .into_iter()
            .map(|(modality, group)| format!("{}\n{}", modality, rows(&group)))
            .collect(),
        Some(TemplateGrouping::BodyPart) => group_by_body_part(templates)
            .into_iter()
            .map(|(body_part, group)| format!("{}\n{}", body_part, rows(&group)))
            .collect(),
    }
}

/// Sections and their fields, with ids to pass to `set-field` and `enable-section`
pub fn field_listing(template: &Template, values: &FieldValueMap) -> String {
    let mut out = String::new();
    for section in &template.sections {
        let state = match (section.is_optional, values.is_section_enabled(&section.id)) {
            (false, _) => "",
            (true, true) => " (optional, enabled)",
            (true, false) => " (optional, disabled)",
        };
        out.push_str(&format!("{} [{}]{}\n", section.title, section.id, state));

        for field in &section.dynamic_fields {
            let options = if field.options.is_empty() {
                String::new()
            } else {
                format!(" ({})", field.options.join(" | "))
            };
            let current = values
                .get(&field.id)
                .map(|value| value.render(field.unit.as_deref()))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "  {} [{}] {}{} = {}\n",
                field.name,
                field.id,
                field.field_type.as_str(),
                options,
                current
            ));
        }
    }
    out
}

fn template_row(template: &Template, favorite: bool) -> String {
    format!(
        "{}{:<24} {}  ({} · {} · {})",
        if favorite { "★ " } else { "  " },
        template.id,
        template.name,
        template.modality,
        template.body_part,
        template.template_type
    )
}

/// Measurements grouped by name, oldest first within a group
pub fn measurement_listing(log: &MeasurementLog) -> String {
    let mut out = String::new();
    for (name, entries) in log.grouped() {
        out.push_str(&format!("{}\n", name));
        for entry in entries {
            out.push_str(&format!("  {}  [{}]\n", measurement_row(entry), entry.id));
        }
    }
    out
}

fn measurement_row(entry: &Measurement) -> String {
    format!("{} {} ({})", radtext_core::models::format_number(entry.value), entry.unit, entry.date)
}
