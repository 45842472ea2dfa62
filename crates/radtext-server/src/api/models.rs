//! Data models for API requests and responses.

use radtext_core::{
    ChangeOutcome, Expansion, KeyInput, Modality, RadtextError, Result, Scalar, TemplateFilter,
    TemplateType, TriggerDefinition, TriggerInput,
};
use serde::{Deserialize, Serialize};

/// Standard API response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Triggers of one category, in registry order
#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerCategory {
    pub category: String,
    pub triggers: Vec<TriggerDefinition>,
}

/// Body of `POST /api/triggers` and `PUT /api/triggers`; `id` is required for updates
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub id: Option<String>,
    #[serde(flatten)]
    pub input: TriggerInput,
}

/// Query naming one entity by id
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: String,
}

/// Query of `GET /api/templates`. `tags` is comma separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateQuery {
    pub query: Option<String>,
    pub modality: Option<String>,
    pub body_part: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<String>,
    pub tags: Option<String>,
}

impl TemplateQuery {
    pub fn filter(&self) -> Result<TemplateFilter> {
        let modality = self
            .modality
            .as_deref()
            .map(str::parse::<Modality>)
            .transpose()?;
        let template_type = self
            .template_type
            .as_deref()
            .map(str::parse::<TemplateType>)
            .transpose()?;
        let tags = self
            .tags
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();

        Ok(TemplateFilter {
            modality,
            body_part: self.body_part.clone().filter(|b| !b.is_empty()),
            template_type,
            tags,
        })
    }

    pub fn text(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

/// Body of `POST /api/templates/render`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub template_id: String,
    /// Stored-form values: field id to scalar, plus `section_<id>_enabled` flags
    pub values: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTemplate {
    pub template_id: String,
    pub text: String,
    pub unresolved: Vec<String>,
}

/// Body of `PUT /api/templates/values`: a field value, or a section flag
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValuesRequest {
    pub template_id: String,
    pub field_id: Option<String>,
    pub value: Option<Scalar>,
    pub section_id: Option<String>,
    /// Defaults to true when `sectionId` is given
    pub enabled: Option<bool>,
}

/// Current values of a template in stored form
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateValues {
    pub template_id: String,
    pub values: serde_json::Value,
}

/// Body of `POST /api/editor/keystroke`
#[derive(Debug, Deserialize)]
pub struct KeystrokeRequest {
    pub text: String,
    pub cursor: usize,
    pub key: KeyInput,
}

/// Body of `POST /api/editor/change`
#[derive(Debug, Deserialize)]
pub struct ChangeRequest {
    pub text: String,
    pub cursor: usize,
}

/// Document state after an editor event
#[derive(Debug, Serialize, Deserialize)]
pub struct EditorState {
    pub text: String,
    pub cursor: usize,
    pub expansion: Option<Expansion>,
    pub notice: Option<String>,
}

impl From<ChangeOutcome> for EditorState {
    fn from(outcome: ChangeOutcome) -> Self {
        let notice = outcome.expansion.as_ref().map(Expansion::notice);
        Self {
            text: outcome.text,
            cursor: outcome.cursor,
            expansion: outcome.expansion,
            notice,
        }
    }
}

pub(crate) fn missing_id() -> RadtextError {
    RadtextError::Other("Field 'id' is required".to_string())
}
