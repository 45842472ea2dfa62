//! Field substitution: turns a template plus field values into report text.

use crate::models::{FieldValue, Scalar, Template, TemplateSection};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const SECTION_FLAG_PREFIX: &str = "section_";
const SECTION_FLAG_SUFFIX: &str = "_enabled";

/// Values chosen for one template instantiation, keyed by field id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValueMap {
    values: BTreeMap<String, FieldValue>,
    enabled_sections: BTreeSet<String>,
}

impl FieldValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every field of `template` set to its default, where it has one
    pub fn with_defaults(template: &Template) -> Self {
        let mut map = Self::new();
        for field in template.sections.iter().flat_map(|s| s.dynamic_fields.iter()) {
            if let Some(value) = field.default_field_value() {
                map.values.insert(field.id.clone(), value);
            }
        }
        map
    }

    pub fn get(&self, field_id: &str) -> Option<&FieldValue> {
        self.values.get(field_id)
    }

    pub fn set(&mut self, field_id: impl Into<String>, value: FieldValue) {
        self.values.insert(field_id.into(), value);
    }

    pub fn remove(&mut self, field_id: &str) -> Option<FieldValue> {
        self.values.remove(field_id)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.enabled_sections.is_empty()
    }

    pub fn is_section_enabled(&self, section_id: &str) -> bool {
        self.enabled_sections.contains(section_id)
    }

    pub fn set_section_enabled(&mut self, section_id: impl Into<String>, enabled: bool) {
        let section_id = section_id.into();
        if enabled {
            self.enabled_sections.insert(section_id);
        } else {
            self.enabled_sections.remove(&section_id);
        }
    }

    /// Overlay `other` on top of these values
    pub fn merge(&mut self, other: FieldValueMap) {
        self.values.extend(other.values);
        self.enabled_sections.extend(other.enabled_sections);
    }

    /// Stored form: field ids mapped to plain scalars plus `section_<id>_enabled` flags
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (id, value) in &self.values {
            let scalar = match value.to_scalar() {
                Scalar::Bool(b) => Value::Bool(b),
                Scalar::Number(n) => serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                Scalar::Text(s) => Value::String(s),
            };
            object.insert(id.clone(), scalar);
        }
        for section_id in &self.enabled_sections {
            object.insert(section_flag_key(section_id), Value::Bool(true));
        }
        Value::Object(object)
    }

    /// Read the stored form back, typing each value with the template's fields.
    ///
    /// Keys naming unknown fields and values of the wrong type are dropped.
    pub fn from_json(template: &Template, stored: &Value) -> Self {
        let mut map = Self::new();
        let Some(object) = stored.as_object() else {
            tracing::warn!("Ignoring stored values for '{}': not an object", template.id);
            return map;
        };

        for (key, raw) in object {
            if let Some(section_id) = parse_section_flag(key) {
                if raw.as_bool() == Some(true) && template.section(section_id).is_some() {
                    map.enabled_sections.insert(section_id.to_string());
                }
                continue;
            }

            let Some(field) = template.field(key) else {
                tracing::debug!("Ignoring stored value for unknown field '{}'", key);
                continue;
            };
            let scalar: Option<Scalar> = serde_json::from_value(raw.clone()).ok();
            match scalar.and_then(|s| FieldValue::from_scalar(field, &s)) {
                Some(value) => {
                    map.values.insert(key.clone(), value);
                }
                None => tracing::debug!("Ignoring stored value {} for field '{}'", raw, key),
            }
        }
        map
    }
}

fn section_flag_key(section_id: &str) -> String {
    format!("{}{}{}", SECTION_FLAG_PREFIX, section_id, SECTION_FLAG_SUFFIX)
}

fn parse_section_flag(key: &str) -> Option<&str> {
    key.strip_prefix(SECTION_FLAG_PREFIX)?
        .strip_suffix(SECTION_FLAG_SUFFIX)
}

/// Render `template` with `values`.
///
/// Optional sections are included only when enabled in `values`. Each placeholder
/// `{name}` takes the value from `values`, else the field default; placeholders
/// with neither stay literal.
pub fn resolve(template: &Template, values: &FieldValueMap) -> String {
    let mut report = String::new();

    for section in &template.sections {
        if section.is_optional && !values.is_section_enabled(&section.id) {
            continue;
        }

        report.push_str(&section.title);
        report.push_str(":\n");
        report.push_str(&substitute(section, values));
        report.push_str("\n\n");
    }

    report.truncate(report.trim_end().len());
    report
}

/// One left-to-right pass over the section content. Substituted text is never rescanned.
fn substitute(section: &TemplateSection, values: &FieldValueMap) -> String {
    let mut content = String::with_capacity(section.content.len());
    let mut rest = section.content.as_str();

    while let Some(start) = rest.find('{') {
        content.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let replacement = candidate.find('}').and_then(|end| {
            let token = &candidate[..=end];
            let field = section
                .dynamic_fields
                .iter()
                .find(|field| field.placeholder() == token)?;
            let value = values
                .get(&field.id)
                .cloned()
                .or_else(|| field.default_field_value())?;
            Some((value.render(field.unit.as_deref()), end + 1))
        });

        match replacement {
            Some((text, consumed)) => {
                content.push_str(&text);
                rest = &candidate[consumed..];
            }
            None => {
                content.push('{');
                rest = &candidate[1..];
            }
        }
    }

    content.push_str(rest);
    content
}

/// Every `{...}` token still present in rendered text, in order of appearance
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find(['{', '}']) {
            Some(end) if after[end..].starts_with('}') && end > 0 => {
                found.push(format!("{{{}}}", &after[..end]));
                rest = &after[end + 1..];
            }
            Some(end) => rest = &after[end..],
            None => break,
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::builtin_templates;
    use crate::models::{DynamicField, FieldType};

    /// Section titles of rendered text: the first line of each blank-line-separated
    /// block, when it ends with a colon
    fn section_titles(rendered: &str) -> Vec<String> {
        rendered
            .split("\n\n")
            .filter_map(|block| block.lines().next())
            .filter_map(|line| line.strip_suffix(':'))
            .map(str::to_string)
            .collect()
    }

    fn template(id: &str) -> Template {
        builtin_templates()
            .into_iter()
            .find(|t| t.id == id)
            .unwrap()
    }

    #[test]
    fn test_ct_chest_normal_with_defaults() {
        let report = resolve(&template("ct-chest-normal"), &FieldValueMap::new());
        assert!(report.starts_with("Técnica:\n"));
        assert!(report.contains("sem administração endovenosa de contraste iodado."));
        let last_block = report.rsplit("\n\n").next().unwrap();
        assert!(last_block.starts_with("Impressão:\n"));
        assert!(unresolved_placeholders(&report).is_empty());
        assert!(!report.ends_with('\n'));
    }

    #[test]
    fn test_optional_section_needs_explicit_flag() {
        let t = template("ct-chest-normal");
        assert!(!resolve(&t, &FieldValueMap::new()).contains("Comparação:"));

        let mut values = FieldValueMap::new();
        values.set_section_enabled("comparison", true);
        let report = resolve(&t, &values);
        assert!(report.contains("Comparação:\n"));
        // no default for the date, so the placeholder stays
        assert_eq!(
            unresolved_placeholders(&report),
            vec!["{Data do exame anterior}".to_string()]
        );

        values.set("prior-exam-date", FieldValue::Text("12/03/2024".to_string()));
        let report = resolve(&t, &values);
        assert!(report.contains("Em comparação com exame de 12/03/2024,"));
        assert!(unresolved_placeholders(&report).is_empty());
    }

    #[test]
    fn test_values_override_defaults() {
        let t = template("ct-chest-covid");
        let mut values = FieldValueMap::with_defaults(&t);
        values.set("involvement", FieldValue::Select("50-75%".to_string()));
        let report = resolve(&t, &values);
        assert!(report.contains("acometendo 50-75% do parênquima"));
        assert!(report.contains("Padrão tomográfico: Típico."));
    }

    #[test]
    fn test_measurement_appends_unit() {
        let t = template("xr-chest-normal");
        assert!(resolve(&t, &FieldValueMap::new()).contains("Índice cardiotorácico de 50%,"));

        let mut values = FieldValueMap::new();
        values.set("cardio-thoracic-index", FieldValue::Measurement(48.5, String::new()));
        assert!(resolve(&t, &values).contains("Índice cardiotorácico de 48.5%,"));
    }

    #[test]
    fn test_placeholder_is_matched_by_name_and_replaced_everywhere() {
        let mut t = template("xr-chest-normal");
        t.sections[1].content = "{ICT} / {ICT} / {cardio-thoracic-index} / {Outro}".to_string();
        let report = resolve(&t, &FieldValueMap::new());
        assert!(report.ends_with("50% / 50% / {cardio-thoracic-index} / {Outro}"));
    }

    #[test]
    fn test_values_are_inserted_verbatim() {
        let t = template("ct-chest-covid");
        let mut values = FieldValueMap::with_defaults(&t);
        values.set("involvement", FieldValue::Select("{Padrão}".to_string()));
        let report = resolve(&t, &values);
        assert!(report.contains("acometendo {Padrão} do parênquima"));
        assert!(report.contains("Padrão tomográfico: Típico."));
    }

    #[test]
    fn test_nested_braces_still_resolve_inner_placeholder() {
        let mut t = template("xr-chest-normal");
        t.sections[1].content = "{a {ICT}} {ICT".to_string();
        let report = resolve(&t, &FieldValueMap::new());
        assert!(report.ends_with("{a 50%} {ICT"));
    }

    #[test]
    fn test_resolve_keeps_static_content_verbatim() {
        for t in builtin_templates() {
            let report = resolve(&t, &FieldValueMap::new());
            for section in t.sections.iter().filter(|s| !s.is_optional) {
                if !section.content.contains('{') {
                    assert!(report.contains(&section.content), "{} / {}", t.id, section.id);
                }
            }
        }
    }

    #[test]
    fn test_section_titles_round_trip_ordering() {
        for t in builtin_templates() {
            let report = resolve(&t, &FieldValueMap::new());
            let expected: Vec<String> = t
                .sections
                .iter()
                .filter(|s| !s.is_optional)
                .map(|s| s.title.clone())
                .collect();
            assert_eq!(section_titles(&report), expected, "{}", t.id);
        }
    }

    #[test]
    fn test_stored_values_round_trip() {
        let t = template("ct-chest-normal");
        let mut values = FieldValueMap::with_defaults(&t);
        values.set("has-nodules", FieldValue::Boolean(true));
        values.set_section_enabled("comparison", true);

        let stored = values.to_json();
        assert_eq!(stored["has-nodules"], Value::Bool(true));
        assert_eq!(stored["section_comparison_enabled"], Value::Bool(true));
        assert_eq!(FieldValueMap::from_json(&t, &stored), values);
    }

    #[test]
    fn test_from_json_drops_unusable_entries() {
        let t = template("xr-chest-normal");
        let stored = serde_json::json!({
            "cardio-thoracic-index": "wide",
            "unknown-field": 3,
            "section_missing_enabled": true
        });
        assert!(FieldValueMap::from_json(&t, &stored).is_empty());

        let stored = serde_json::json!({ "cardio-thoracic-index": "52" });
        let values = FieldValueMap::from_json(&t, &stored);
        assert_eq!(
            values.get("cardio-thoracic-index"),
            Some(&FieldValue::Measurement(52.0, "%".to_string()))
        );
    }

    #[test]
    fn test_field_without_default_or_value_is_left_literal() {
        let mut t = template("mri-brain-normal");
        t.sections[1].dynamic_fields.push(DynamicField {
            id: "extra".to_string(),
            name: "Extra".to_string(),
            field_type: FieldType::Text,
            options: vec![],
            default_value: None,
            unit: None,
        });
        t.sections[1].content.push_str(" {Extra}");
        let report = resolve(&t, &FieldValueMap::new());
        assert!(report.contains("dimensões normais."));
        assert_eq!(unresolved_placeholders(&report), vec!["{Extra}".to_string()]);
    }

    #[test]
    fn test_unresolved_placeholders_ignores_unbalanced_braces() {
        assert_eq!(
            unresolved_placeholders("a { b {C} d {} e {F"),
            vec!["{C}".to_string()]
        );
    }
}
