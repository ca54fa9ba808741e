use axum::{http::StatusCode, response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::enrichment::{ContactField, FieldSuggestion, PriorityTier};
use crate::handlers;
use crate::models::{
    Contact, ContactDetail, ContactFields, CreateContactRequest, ImportRecord, ImportRequest,
    ImportResponse, QueueResponse, ReplaceTagsRequest, Tag, TagCategory, TagInput,
};
use crate::queue::{QueueEntry, QueueStats};

/// Path of the generated OpenAPI document.
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Better Contacts API",
        description = "Contact enrichment scoring, prioritization and queueing"
    ),
    paths(
        handlers::health,
        handlers::create_contact,
        handlers::get_contact,
        handlers::update_contact,
        handlers::delete_contact,
        handlers::replace_tags,
        handlers::enrich_contact,
        handlers::get_suggestions,
        handlers::import_contacts,
        handlers::enrichment_queue,
    ),
    components(schemas(
        Contact,
        ContactDetail,
        ContactField,
        ContactFields,
        CreateContactRequest,
        FieldSuggestion,
        ImportRecord,
        ImportRequest,
        ImportResponse,
        PriorityTier,
        QueueEntry,
        QueueResponse,
        QueueStats,
        ReplaceTagsRequest,
        Tag,
        TagCategory,
        TagInput,
    )),
    tags(
        (name = "contacts", description = "Contact records and tags"),
        (name = "enrichment", description = "Enrichment sessions, suggestions and the queue"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Serves the generated OpenAPI document as JSON.
pub async fn serve_openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Serves the Swagger UI HTML page.
///
/// The page loads the Swagger UI bundle from a CDN and points it at
/// [`OPENAPI_JSON_PATH`].
pub async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Better Contacts API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/health",
            "/api/v1/contacts",
            "/api/v1/contacts/{id}",
            "/api/v1/contacts/{id}/tags",
            "/api/v1/contacts/{id}/enrich",
            "/api/v1/contacts/{id}/suggestions",
            "/api/v1/contacts/import",
            "/api/v1/enrichment/queue",
        ] {
            assert!(paths.contains(&expected), "missing path {}", expected);
        }
    }

    #[test]
    fn test_document_serializes() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "Better Contacts API");
        assert!(json["components"]["schemas"]["ContactDetail"].is_object());
    }
}
