use crate::api::models::{
    missing_id, ApiResponse, ChangeRequest, EditorState, FieldValuesRequest, KeystrokeRequest,
    RenderRequest, RenderedTemplate, TemplateQuery, TemplateValues, TriggerCategory,
    TriggerRequest,
};
use radtext_core::substitution::unresolved_placeholders;
use radtext_core::{
    EditorSession, FieldValueMap, KeyOutcome, KeyValueStore, RadtextError, Result, Template,
    TriggerDefinition,
};
use std::sync::{Arc, Mutex};

/// The one editor session behind the server; requests are serialised on the lock
pub type SharedSession<S> = Arc<Mutex<EditorSession<S>>>;

/// Run `f` against the locked session and wrap the outcome
fn with_session<S, T, F>(shared: &SharedSession<S>, action: &str, f: F) -> ApiResponse<T>
where
    S: KeyValueStore,
    F: FnOnce(&mut EditorSession<S>) -> Result<T>,
{
    let mut session = match shared.lock() {
        Ok(session) => session,
        Err(_) => return ApiResponse::error("Editor session is unavailable".to_string()),
    };
    match f(&mut session) {
        Ok(data) => ApiResponse::success(data),
        Err(e) => {
            tracing::debug!("Failed to {}: {}", action, e);
            ApiResponse::error(format!("Failed to {}: {}", action, e))
        }
    }
}

/// Get all triggers
pub fn get_triggers<S: KeyValueStore>(shared: &SharedSession<S>) -> ApiResponse<Vec<TriggerDefinition>> {
    with_session(shared, "load triggers", |session| {
        Ok(session.registry().triggers().to_vec())
    })
}

/// Get triggers grouped by category
pub fn get_trigger_categories<S: KeyValueStore>(
    shared: &SharedSession<S>,
) -> ApiResponse<Vec<TriggerCategory>> {
    with_session(shared, "load triggers", |session| {
        Ok(session
            .registry()
            .list_by_category()
            .into_iter()
            .map(|(category, triggers)| TriggerCategory {
                category,
                triggers: triggers.into_iter().cloned().collect(),
            })
            .collect())
    })
}

/// Add a new trigger
pub fn add_trigger_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    request: TriggerRequest,
) -> ApiResponse<TriggerDefinition> {
    with_session(shared, "add trigger", |session| session.add_trigger(request.input))
}

/// Update an existing trigger
pub fn update_trigger_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    request: TriggerRequest,
) -> ApiResponse<TriggerDefinition> {
    with_session(shared, "update trigger", |session| {
        let id = request.id.ok_or_else(missing_id)?;
        session.update_trigger(&id, request.input)
    })
}

/// Delete a trigger
pub fn delete_trigger_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    id: String,
) -> ApiResponse<TriggerDefinition> {
    with_session(shared, "delete trigger", |session| session.delete_trigger(&id))
}

/// Search templates by free text and filters
pub fn get_templates<S: KeyValueStore>(
    shared: &SharedSession<S>,
    query: TemplateQuery,
) -> ApiResponse<Vec<Template>> {
    with_session(shared, "search templates", |session| {
        let filter = query.filter()?;
        Ok(session
            .templates()
            .search(query.text(), &filter)
            .into_iter()
            .cloned()
            .collect())
    })
}

/// Get a specific template by id
pub fn get_template<S: KeyValueStore>(
    shared: &SharedSession<S>,
    id: &str,
) -> ApiResponse<Option<Template>> {
    with_session(shared, "load template", |session| {
        Ok(session.templates().get(id).cloned())
    })
}

/// Create a user template
pub fn create_template_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    template: Template,
) -> ApiResponse<Template> {
    with_session(shared, "create template", |session| session.create_template(template))
}

/// Replace a user template
pub fn update_template_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    id: String,
    template: Template,
) -> ApiResponse<Template> {
    with_session(shared, "update template", |session| session.update_template(&id, template))
}

/// Defaults overlaid with the stored values of a template
pub fn get_template_values<S: KeyValueStore>(
    shared: &SharedSession<S>,
    id: String,
) -> ApiResponse<TemplateValues> {
    with_session(shared, "load field values", |session| {
        let values = session.select_template(&id)?;
        Ok(TemplateValues {
            template_id: id,
            values: values.to_json(),
        })
    })
}

/// Store one field value or section flag; each edit is persisted immediately
pub fn update_values_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    request: FieldValuesRequest,
) -> ApiResponse<TemplateValues> {
    with_session(shared, "update field values", |session| {
        let values = match (&request.field_id, &request.section_id) {
            (Some(field_id), _) => {
                let value = request
                    .value
                    .as_ref()
                    .ok_or_else(|| RadtextError::Other("Field 'value' is required".to_string()))?;
                session.set_field_scalar(&request.template_id, field_id, value)?
            }
            (None, Some(section_id)) => session.set_section_enabled(
                &request.template_id,
                section_id,
                request.enabled.unwrap_or(true),
            )?,
            (None, None) => {
                return Err(RadtextError::Other(
                    "Either 'fieldId' or 'sectionId' is required".to_string(),
                ))
            }
        };
        Ok(TemplateValues {
            template_id: request.template_id.clone(),
            values: values.to_json(),
        })
    })
}

/// Delete a user template
pub fn delete_template_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    id: String,
) -> ApiResponse<Template> {
    with_session(shared, "delete template", |session| session.delete_template(&id))
}

/// Render a template with its stored values, overlaid with any values sent along
pub fn render_template_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    request: RenderRequest,
) -> ApiResponse<RenderedTemplate> {
    with_session(shared, "render template", |session| {
        let mut values = session.select_template(&request.template_id)?;
        if let Some(raw) = &request.values {
            let template = session
                .templates()
                .get(&request.template_id)
                .ok_or_else(|| RadtextError::TemplateNotFound(request.template_id.clone()))?;
            values.merge(FieldValueMap::from_json(template, raw));
        }
        let text = session.render_template(&request.template_id, &values)?;
        Ok(RenderedTemplate {
            template_id: request.template_id,
            unresolved: unresolved_placeholders(&text),
            text,
        })
    })
}

/// Apply one keystroke to the sent document
pub fn keystroke_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    request: KeystrokeRequest,
) -> ApiResponse<EditorState> {
    with_session(shared, "apply keystroke", |session| {
        session.set_text(&request.text, request.cursor);
        let expansion = match session.handle_key(request.key) {
            KeyOutcome::Expanded(expansion) => Some(expansion),
            _ => None,
        };
        Ok(EditorState {
            text: session.text().to_string(),
            cursor: session.buffer().cursor(),
            notice: expansion.as_ref().map(|e| e.notice()),
            expansion,
        })
    })
}

/// Evaluate a change event from an editing surface
pub fn change_handler<S: KeyValueStore>(
    shared: &SharedSession<S>,
    request: ChangeRequest,
) -> ApiResponse<EditorState> {
    with_session(shared, "apply change", |session| {
        Ok(session.on_change(&request.text, request.cursor).into())
    })
}
