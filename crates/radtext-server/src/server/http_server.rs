//! HTTP server implementation for the radtext API.

use crate::api::{
    add_trigger_handler, change_handler, create_template_handler, delete_template_handler,
    delete_trigger_handler, get_template, get_template_values, get_templates,
    get_trigger_categories, get_triggers, keystroke_handler, render_template_handler,
    update_template_handler, update_trigger_handler, update_values_handler, ChangeRequest,
    FieldValuesRequest, IdQuery, KeystrokeRequest, RenderRequest, SharedSession, TemplateQuery,
    TriggerRequest,
};
use crate::server::utils::{port_is_available, remove_api_port, save_api_port};

use radtext_core::{KeyValueStore, RadtextError, Result, Template};
use std::net::SocketAddr;
use warp::Filter;

/// All API routes over one shared editor session
pub fn routes<S>(
    session: SharedSession<S>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone
where
    S: KeyValueStore + Send + 'static,
{
    let state = warp::any().map(move || session.clone());

    // CORS for browser front-ends
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["Content-Type"])
        .allow_methods(vec!["GET", "POST", "DELETE", "PUT"]);

    let get_triggers_route = warp::path!("api" / "triggers")
        .and(warp::get())
        .and(state.clone())
        .map(|session: SharedSession<S>| warp::reply::json(&get_triggers(&session)));

    let trigger_categories_route = warp::path!("api" / "triggers" / "categories")
        .and(warp::get())
        .and(state.clone())
        .map(|session: SharedSession<S>| warp::reply::json(&get_trigger_categories(&session)));

    let add_trigger_route = warp::path!("api" / "triggers")
        .and(warp::post())
        .and(warp::body::json())
        .and(state.clone())
        .map(|body: TriggerRequest, session: SharedSession<S>| {
            warp::reply::json(&add_trigger_handler(&session, body))
        });

    let update_trigger_route = warp::path!("api" / "triggers")
        .and(warp::put())
        .and(warp::body::json())
        .and(state.clone())
        .map(|body: TriggerRequest, session: SharedSession<S>| {
            warp::reply::json(&update_trigger_handler(&session, body))
        });

    let delete_trigger_route = warp::path!("api" / "triggers")
        .and(warp::delete())
        .and(warp::query::<IdQuery>())
        .and(state.clone())
        .map(|query: IdQuery, session: SharedSession<S>| {
            warp::reply::json(&delete_trigger_handler(&session, query.id))
        });

    let get_templates_route = warp::path!("api" / "templates")
        .and(warp::get())
        .and(warp::query::<TemplateQuery>())
        .and(state.clone())
        .map(|query: TemplateQuery, session: SharedSession<S>| {
            warp::reply::json(&get_templates(&session, query))
        });

    let get_template_route = warp::path!("api" / "template")
        .and(warp::get())
        .and(warp::query::<IdQuery>())
        .and(state.clone())
        .map(|query: IdQuery, session: SharedSession<S>| {
            warp::reply::json(&get_template(&session, &query.id))
        });

    let create_template_route = warp::path!("api" / "templates")
        .and(warp::post())
        .and(warp::body::json())
        .and(state.clone())
        .map(|body: Template, session: SharedSession<S>| {
            warp::reply::json(&create_template_handler(&session, body))
        });

    let update_template_route = warp::path!("api" / "templates")
        .and(warp::put())
        .and(warp::query::<IdQuery>())
        .and(warp::body::json())
        .and(state.clone())
        .map(|query: IdQuery, body: Template, session: SharedSession<S>| {
            warp::reply::json(&update_template_handler(&session, query.id, body))
        });

    let get_values_route = warp::path!("api" / "templates" / "values")
        .and(warp::get())
        .and(warp::query::<IdQuery>())
        .and(state.clone())
        .map(|query: IdQuery, session: SharedSession<S>| {
            warp::reply::json(&get_template_values(&session, query.id))
        });

    let update_values_route = warp::path!("api" / "templates" / "values")
        .and(warp::put())
        .and(warp::body::json())
        .and(state.clone())
        .map(|body: FieldValuesRequest, session: SharedSession<S>| {
            warp::reply::json(&update_values_handler(&session, body))
        });

    let delete_template_route = warp::path!("api" / "templates")
        .and(warp::delete())
        .and(warp::query::<IdQuery>())
        .and(state.clone())
        .map(|query: IdQuery, session: SharedSession<S>| {
            warp::reply::json(&delete_template_handler(&session, query.id))
        });

    let render_template_route = warp::path!("api" / "templates" / "render")
        .and(warp::post())
        .and(warp::body::json())
        .and(state.clone())
        .map(|body: RenderRequest, session: SharedSession<S>| {
            warp::reply::json(&render_template_handler(&session, body))
        });

    let keystroke_route = warp::path!("api" / "editor" / "keystroke")
        .and(warp::post())
        .and(warp::body::json())
        .and(state.clone())
        .map(|body: KeystrokeRequest, session: SharedSession<S>| {
            warp::reply::json(&keystroke_handler(&session, body))
        });

    let change_route = warp::path!("api" / "editor" / "change")
        .and(warp::post())
        .and(warp::body::json())
        .and(state)
        .map(|body: ChangeRequest, session: SharedSession<S>| {
            warp::reply::json(&change_handler(&session, body))
        });

    // Health check endpoint
    let health_route = warp::path!("health").map(|| "radtext API is running");

    get_triggers_route
        .or(trigger_categories_route)
        .or(add_trigger_route)
        .or(update_trigger_route)
        .or(delete_trigger_route)
        .or(get_templates_route)
        .or(get_template_route)
        .or(create_template_route)
        .or(update_template_route)
        .or(get_values_route)
        .or(update_values_route)
        .or(delete_template_route)
        .or(render_template_route)
        .or(keystroke_route)
        .or(change_route)
        .or(health_route)
        .with(cors)
        .with(warp::trace::request())
}

/// Start the HTTP API server on the specified port
pub async fn start_api_server<S>(port: u16, session: SharedSession<S>) -> Result<()>
where
    S: KeyValueStore + Send + 'static,
{
    if !port_is_available(port) {
        return Err(RadtextError::Other(format!("Port {} is already in use", port)));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    // Save the port to file so we can find it later
    save_api_port(port)?;

    println!("┌─────────────────────────────────────────┐");
    println!("│          radtext API Server             │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Status: Running                         │");
    println!("│ Port:   {:<33} │", port);
    println!("│ URL:    http://localhost:{:<16} │", port);
    println!("└─────────────────────────────────────────┘");

    let server = warp::serve(routes(session)).try_bind_with_graceful_shutdown(addr, async {
        tokio::signal::ctrl_c().await.ok();
        println!("Received shutdown signal, stopping API server...");
    });

    let result = match server {
        Ok((addr, server)) => {
            tracing::info!("API server listening on {}", addr);
            server.await;
            Ok(())
        }
        Err(e) => Err(RadtextError::Other(format!(
            "Failed to bind to port {}: {}",
            port, e
        ))),
    };

    if let Err(e) = remove_api_port() {
        tracing::warn!("Failed to remove API port file: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use radtext_core::{EditorSession, MemoryStore};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn shared() -> SharedSession<MemoryStore> {
        Arc::new(Mutex::new(EditorSession::new(MemoryStore::new())))
    }

    fn body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let api = routes(shared());
        let response = warp::test::request().path("/health").reply(&api).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "radtext API is running");
    }

    #[tokio::test]
    async fn test_trigger_routes() {
        let api = routes(shared());

        let response = warp::test::request()
            .method("GET")
            .path("/api/triggers/categories")
            .reply(&api)
            .await;
        let json = body(response.body());
        assert_eq!(json["success"], true);
        assert_eq!(json["data"][0]["category"], "common");

        let response = warp::test::request()
            .method("POST")
            .path("/api/triggers")
            .json(&json!({ "trigger": "/hep", "content": "hepatomegalia", "category": "phrases" }))
            .reply(&api)
            .await;
        let json = body(response.body());
        assert_eq!(json["success"], true);
        let id = json["data"]["id"].as_str().unwrap().to_string();

        let response = warp::test::request()
            .method("POST")
            .path("/api/triggers")
            .json(&json!({ "trigger": "/HEP", "content": "x" }))
            .reply(&api)
            .await;
        let json = body(response.body());
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("already exists"));

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/triggers?id={}", id))
            .reply(&api)
            .await;
        assert_eq!(body(response.body())["data"]["trigger"], "/hep");
    }

    #[tokio::test]
    async fn test_template_search_and_render() {
        let api = routes(shared());

        let response = warp::test::request()
            .method("GET")
            .path("/api/templates?modality=CT&type=findings")
            .reply(&api)
            .await;
        let json = body(response.body());
        let ids: Vec<&str> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["ct-chest-covid"]);

        let response = warp::test::request()
            .method("GET")
            .path("/api/templates?modality=PET")
            .reply(&api)
            .await;
        assert_eq!(body(response.body())["success"], false);

        let response = warp::test::request()
            .method("POST")
            .path("/api/templates/render")
            .json(&json!({ "templateId": "ct-chest-covid", "values": { "involvement": "> 75%" } }))
            .reply(&api)
            .await;
        let json = body(response.body());
        let text = json["data"]["text"].as_str().unwrap();
        assert!(text.starts_with("Técnica:\n"));
        assert!(text.contains("acometendo > 75% do parênquima"));
        assert_eq!(json["data"]["unresolved"], json!([]));
    }

    #[tokio::test]
    async fn test_editor_routes_expand_triggers() {
        let api = routes(shared());

        let response = warp::test::request()
            .method("POST")
            .path("/api/editor/keystroke")
            .json(&json!({ "text": "Exame sem /n", "cursor": 12, "key": { "key": "char", "char": " " } }))
            .reply(&api)
            .await;
        let json = body(response.body());
        assert_eq!(json["data"]["text"], "Exame sem normal ");
        assert_eq!(json["data"]["cursor"], 17);
        assert_eq!(json["data"]["notice"], "AutoTexto: /n expanded");

        let response = warp::test::request()
            .method("POST")
            .path("/api/editor/change")
            .json(&json!({ "text": "/nonexistent ", "cursor": 13 }))
            .reply(&api)
            .await;
        let json = body(response.body());
        assert_eq!(json["data"]["text"], "/nonexistent ");
        assert_eq!(json["data"]["expansion"], Value::Null);
    }

    #[tokio::test]
    async fn test_field_values_route_persists_each_edit() {
        let session = shared();
        let api = routes(session.clone());

        let response = warp::test::request()
            .method("PUT")
            .path("/api/templates/values")
            .json(&json!({ "templateId": "ct-chest-normal", "sectionId": "comparison" }))
            .reply(&api)
            .await;
        let json = body(response.body());
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["values"]["section_comparison_enabled"], true);

        let response = warp::test::request()
            .method("PUT")
            .path("/api/templates/values")
            .json(&json!({ "templateId": "ct-chest-normal", "fieldId": "prior-exam-date", "value": "12/03/2024" }))
            .reply(&api)
            .await;
        assert_eq!(body(response.body())["data"]["values"]["prior-exam-date"], "12/03/2024");

        let response = warp::test::request()
            .method("POST")
            .path("/api/templates/render")
            .json(&json!({ "templateId": "ct-chest-normal" }))
            .reply(&api)
            .await;
        let json = body(response.body());
        assert!(json["data"]["text"]
            .as_str()
            .unwrap()
            .contains("Em comparação com exame de 12/03/2024,"));

        let stored = session
            .lock()
            .unwrap()
            .store()
            .get("templateDynamicValues-ct-chest-normal")
            .unwrap();
        assert!(stored.unwrap().contains("12/03/2024"));

        let response = warp::test::request()
            .method("PUT")
            .path("/api/templates/values")
            .json(&json!({ "templateId": "ct-chest-covid", "fieldId": "involvement", "value": "90%" }))
            .reply(&api)
            .await;
        assert_eq!(body(response.body())["success"], false);

        let response = warp::test::request()
            .method("GET")
            .path("/api/templates/values?id=ct-chest-covid")
            .reply(&api)
            .await;
        assert_eq!(body(response.body())["data"]["values"]["involvement"], "10-25%");
    }

    #[tokio::test]
    async fn test_update_user_template() {
        let api = routes(shared());

        let response = warp::test::request()
            .method("GET")
            .path("/api/template?id=mri-brain-normal")
            .reply(&api)
            .await;
        let mut template = body(response.body())["data"].clone();
        template["name"] = json!("RM Crânio");

        let response = warp::test::request()
            .method("POST")
            .path("/api/templates")
            .json(&template)
            .reply(&api)
            .await;
        let id = body(response.body())["data"]["id"].as_str().unwrap().to_string();

        template["name"] = json!("RM Crânio revisado");
        let response = warp::test::request()
            .method("PUT")
            .path(&format!("/api/templates?id={}", id))
            .json(&template)
            .reply(&api)
            .await;
        let json = body(response.body());
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["name"], "RM Crânio revisado");
        assert_eq!(json["data"]["id"], id.as_str());

        let response = warp::test::request()
            .method("PUT")
            .path("/api/templates?id=mri-brain-normal")
            .json(&template)
            .reply(&api)
            .await;
        assert_eq!(body(response.body())["success"], false);
    }

    #[tokio::test]
    async fn test_builtin_template_cannot_be_deleted() {
        let api = routes(shared());
        let response = warp::test::request()
            .method("DELETE")
            .path("/api/templates?id=ct-chest-normal")
            .reply(&api)
            .await;
        let json = body(response.body());
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("built in"));
    }
}
