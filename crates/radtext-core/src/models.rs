//! Data model shared by the registry, the template store and the substitution engine.
//!
//! JSON field names are camelCase so exported templates and persisted blobs keep
//! the layout browser front-ends already read and write.

use crate::error::RadtextError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One AutoTexto entry: a trigger token and the literal text it expands to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub id: String,
    pub trigger: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

/// Everything about a trigger except its id, used for add and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInput {
    pub trigger: String,
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl TriggerInput {
    pub fn new(trigger: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn into_definition(self, id: String) -> TriggerDefinition {
        TriggerDefinition {
            id,
            trigger: self.trigger,
            content: self.content,
            category: self.category,
            tags: self.tags,
            conditions: self.conditions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Ct,
    Mri,
    Xr,
    Us,
    Nm,
}

impl Modality {
    pub const ALL: [Modality; 5] = [
        Modality::Ct,
        Modality::Mri,
        Modality::Xr,
        Modality::Us,
        Modality::Nm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Ct => "CT",
            Modality::Mri => "MRI",
            Modality::Xr => "XR",
            Modality::Us => "US",
            Modality::Nm => "NM",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = RadtextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RadtextError::Other(format!("Unknown modality '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Normal,
    Findings,
    Emergency,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Normal => "normal",
            TemplateType::Findings => "findings",
            TemplateType::Emergency => "emergency",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateType {
    type Err = RadtextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(TemplateType::Normal),
            "findings" => Ok(TemplateType::Findings),
            "emergency" => Ok(TemplateType::Emergency),
            other => Err(RadtextError::Other(format!(
                "Unknown template type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Measurement,
    Select,
    Text,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Measurement => "measurement",
            FieldType::Select => "select",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
        }
    }
}

/// Untyped value as it appears in JSON: exported templates and stored field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Typed value of a dynamic field, one variant per [`FieldType`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Numeric value and its unit; an empty unit falls back to the field's unit.
    Measurement(f64, String),
    Select(String),
    Text(String),
    Boolean(bool),
}

impl FieldValue {
    /// Convert a stored scalar into the typed value `field` expects.
    ///
    /// Returns `None` when the scalar cannot represent that type, e.g. a
    /// non-numeric string for a measurement.
    pub fn from_scalar(field: &DynamicField, scalar: &Scalar) -> Option<FieldValue> {
        let unit = field.unit.clone().unwrap_or_default();
        match (field.field_type, scalar) {
            (FieldType::Measurement, Scalar::Number(n)) => {
                n.is_finite().then(|| FieldValue::Measurement(*n, unit))
            }
            (FieldType::Measurement, Scalar::Text(s)) => s
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|n| FieldValue::Measurement(n, unit)),
            (FieldType::Measurement, Scalar::Bool(_)) => None,
            (FieldType::Select, Scalar::Text(s)) => Some(FieldValue::Select(s.clone())),
            (FieldType::Select, Scalar::Number(n)) => Some(FieldValue::Select(format_number(*n))),
            (FieldType::Select, Scalar::Bool(_)) => None,
            (FieldType::Text, Scalar::Text(s)) => Some(FieldValue::Text(s.clone())),
            (FieldType::Text, Scalar::Number(n)) => Some(FieldValue::Text(format_number(*n))),
            (FieldType::Text, Scalar::Bool(b)) => Some(FieldValue::Text(b.to_string())),
            (FieldType::Boolean, Scalar::Bool(b)) => Some(FieldValue::Boolean(*b)),
            (FieldType::Boolean, Scalar::Text(s)) => s.trim().parse::<bool>().ok().map(FieldValue::Boolean),
            (FieldType::Boolean, Scalar::Number(_)) => None,
        }
    }

    pub fn to_scalar(&self) -> Scalar {
        match self {
            FieldValue::Measurement(n, _) => Scalar::Number(*n),
            FieldValue::Select(s) | FieldValue::Text(s) => Scalar::Text(s.clone()),
            FieldValue::Boolean(b) => Scalar::Bool(*b),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Measurement(..) => FieldType::Measurement,
            FieldValue::Select(_) => FieldType::Select,
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Boolean(_) => FieldType::Boolean,
        }
    }

    /// Text substituted for the placeholder.
    pub fn render(&self, field_unit: Option<&str>) -> String {
        match self {
            FieldValue::Measurement(n, unit) => {
                let unit = if unit.is_empty() {
                    field_unit.unwrap_or("")
                } else {
                    unit.as_str()
                };
                format!("{}{}", format_number(*n), unit)
            }
            FieldValue::Select(s) | FieldValue::Text(s) => s.clone(),
            FieldValue::Boolean(b) => b.to_string(),
        }
    }
}

/// Shortest decimal form: `50` rather than `50.0`.
pub fn format_number(n: f64) -> String {
    format!("{}", n)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl DynamicField {
    /// The field's default converted to its typed value, if it has a usable one
    pub fn default_field_value(&self) -> Option<FieldValue> {
        self.default_value
            .as_ref()
            .and_then(|scalar| FieldValue::from_scalar(self, scalar))
    }

    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSection {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub dynamic_fields: Vec<DynamicField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: String,
    pub modality: Modality,
    pub body_part: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sections: Vec<TemplateSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Template {
    pub fn section(&self, section_id: &str) -> Option<&TemplateSection> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    /// Find a dynamic field by id across all sections
    pub fn field(&self, field_id: &str) -> Option<&DynamicField> {
        self.sections
            .iter()
            .flat_map(|s| s.dynamic_fields.iter())
            .find(|f| f.id == field_id)
    }
}
