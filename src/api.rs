//! REST API for the pack decomposition service.
//!
//! Provides HTTP endpoints for the web UI and other clients.
//! Uses Axum as the web framework and supports CORS.

use std::sync::{Arc, OnceLock};

use axum::extract::{Path, Query, State};
use axum::{
    Json, Router,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::config::ApiConfig;
use crate::model::{PackPlan, QuantityError, parse_quantity};
use crate::optimizer::{PackOptimizer, SolverMode, UnknownSolverMode};

#[derive(Clone)]
struct ApiState {
    optimizer: Arc<PackOptimizer>,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>pack-shark API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded Web Assets (HTML, CSS, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// Optional query parameters of the plan endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlanQuery {
    /// Solver to use for this request (`greedy` or `exact`).
    #[param(example = "exact")]
    pub mode: Option<String>,
}

/// Catalog and solver information.
#[derive(Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "pack_sizes": [250, 500, 1000, 2000, 5000],
    "mode": "greedy",
    "mode_override": true
}))]
pub struct CatalogResponse {
    pub pack_sizes: Vec<u64>,
    pub mode: SolverMode,
    pub mode_override: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

/// Request rejections; the decomposer is never invoked for any of them.
#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    InvalidQuantity(#[from] QuantityError),
    #[error(transparent)]
    InvalidMode(#[from] UnknownSolverMode),
    #[error("this service only answers with the {0} solver")]
    ModeOverrideDisabled(SolverMode),
    #[error("the exact solver is not available for this pack catalog")]
    ModeUnavailable,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidQuantity(_) | ApiError::InvalidMode(_) => StatusCode::BAD_REQUEST,
            ApiError::ModeOverrideDisabled(_) => StatusCode::FORBIDDEN,
            ApiError::ModeUnavailable => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::InvalidQuantity(_) => "Invalid quantity",
            ApiError::InvalidMode(_) => "Invalid solver mode",
            ApiError::ModeOverrideDisabled(_) => "Solver selection disabled",
            ApiError::ModeUnavailable => "Solver unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.title().to_string(),
            details: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Solver requested via `?mode=`, `None` when the default applies.
fn requested_mode(
    optimizer: &PackOptimizer,
    query: &PlanQuery,
) -> Result<Option<SolverMode>, ApiError> {
    let Some(raw) = query.mode.as_deref() else {
        return Ok(None);
    };

    let mode = raw.parse::<SolverMode>()?;
    if mode != optimizer.default_mode() && !optimizer.allows_mode_override() {
        return Err(ApiError::ModeOverrideDisabled(optimizer.default_mode()));
    }
    if !optimizer.supports(mode) {
        return Err(ApiError::ModeUnavailable);
    }
    Ok(Some(mode))
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_plan, handle_catalog, handle_health),
    components(schemas(PackPlan, CatalogResponse, HealthResponse, ErrorResponse, SolverMode)),
    tags((name = "packs", description = "Pack decomposition for orders"))
)]
struct ApiDoc;

/// Builds the application router around a prepared optimizer.
pub fn router(optimizer: Arc<PackOptimizer>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState { optimizer };

    Router::new()
        // API endpoints
        .route("/v1/packs", get(handle_catalog))
        .route("/v1/packs/{count}", get(handle_plan))
        .route("/health", get(handle_health))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        // Web-UI (embedded)
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
pub async fn start_api_server(
    config: ApiConfig,
    optimizer: Arc<PackOptimizer>,
) -> std::io::Result<()> {
    let app = router(optimizer);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        "server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        tracing::info!("local access: http://localhost:{}", config.port());
    }
    tracing::info!("endpoints: GET /v1/packs/{{count}}, GET /v1/packs, GET /health, GET /docs");

    axum::serve(listener, app).await
}

/// Handler for GET /v1/packs/{count}.
///
/// Answers how many packs of each size to ship for `count` units.
#[utoipa::path(
    get,
    path = "/v1/packs/{count}",
    params(
        ("count" = String, Path, description = "Number of units ordered"),
        PlanQuery
    ),
    responses(
        (status = 200, description = "Pack size to number of packs", body = PackPlan),
        (status = BAD_REQUEST, description = "Invalid quantity or solver mode", body = ErrorResponse),
        (status = FORBIDDEN, description = "Solver selection disabled", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Solver unavailable for this catalog", body = ErrorResponse)
    ),
    tag = "packs"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    Path(count): Path<String>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<PackPlan>, ApiError> {
    let requested = parse_quantity(&count).inspect_err(|err| {
        tracing::debug!(raw = %count, "rejected quantity: {err}");
    })?;
    let optimizer = &state.optimizer;
    let (plan, mode) = match requested_mode(optimizer, &query)? {
        Some(mode) => (optimizer.plan_with_mode(requested, mode), mode),
        None => (optimizer.plan(requested), optimizer.default_mode()),
    };
    tracing::info!(
        requested,
        %mode,
        packs = %plan.pack_count(),
        shipped = %plan.total_units(),
        "plan computed"
    );
    tracing::debug!(packs = ?plan.largest_first().collect::<Vec<_>>(), "plan contents");
    Ok(Json(plan))
}

/// Handler for GET /v1/packs: the configured pack sizes.
#[utoipa::path(
    get,
    path = "/v1/packs",
    responses((status = 200, description = "Configured pack catalog", body = CatalogResponse)),
    tag = "packs"
)]
async fn handle_catalog(State(state): State<ApiState>) -> Json<CatalogResponse> {
    let optimizer = &state.optimizer;
    Json(CatalogResponse {
        pack_sizes: optimizer.catalog().sizes().to_vec(),
        mode: optimizer.default_mode(),
        mode_override: optimizer.allows_mode_override(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "packs"
)]
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Serves the index.html main page
async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Serves static assets (JS, CSS, etc.)
async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackCatalog;
    use crate::optimizer::SolverConfig;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(sizes: &[u64], config: SolverConfig) -> Router {
        let catalog = PackCatalog::new(sizes.to_vec()).unwrap();
        router(Arc::new(PackOptimizer::new(catalog, config).unwrap()))
    }

    fn default_app() -> Router {
        test_app(&PackCatalog::DEFAULT_SIZES, SolverConfig::default())
    }

    async fn send_get(app: Router, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let paths = &openapi_doc().paths.paths;
        for path in ["/v1/packs/{count}", "/v1/packs", "/health"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {path} path"
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let components = openapi_doc()
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["PackPlan", "CatalogResponse", "ErrorResponse"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{name}' is missing from OpenAPI spec"
            );
        }
    }

    #[tokio::test]
    async fn plan_endpoint_returns_size_keyed_counts() {
        let resp = send_get(default_app(), "/v1/packs/12001").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({"250": 1, "2000": 1, "5000": 2})
        );
    }

    #[tokio::test]
    async fn plan_endpoint_returns_empty_object_for_zero() {
        let resp = send_get(default_app(), "/v1/packs/0").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({}));
    }

    #[tokio::test]
    async fn plan_endpoint_rejects_invalid_quantities() {
        for uri in ["/v1/packs/-5", "/v1/packs/abc", "/v1/packs/1.5", "/v1/packs/99999999999999999999"] {
            let resp = send_get(default_app(), uri).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = body_json(resp).await;
            assert_eq!(body["error"], "Invalid quantity");
        }
    }

    #[tokio::test]
    async fn plan_endpoint_honours_mode_parameter() {
        let resp = send_get(test_app(&[1, 3, 4], SolverConfig::default()), "/v1/packs/6").await;
        assert_eq!(body_json(resp).await, json!({"1": 2, "4": 1}));

        let resp = send_get(
            test_app(&[1, 3, 4], SolverConfig::default()),
            "/v1/packs/6?mode=exact",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"3": 2}));

        let resp = send_get(default_app(), "/v1/packs/6?mode=fastest").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn plan_endpoint_uses_exact_default_without_mode_parameter() {
        let config = SolverConfig::builder().mode(SolverMode::Exact).build();
        let resp = send_get(test_app(&[1, 3, 4], config), "/v1/packs/6").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"3": 2}));

        let resp = send_get(test_app(&[1, 3, 4], config), "/v1/packs").await;
        assert_eq!(body_json(resp).await["mode"], "exact");
    }

    #[tokio::test]
    async fn plan_endpoint_refuses_override_when_disabled() {
        let config = SolverConfig::builder().allow_mode_override(false).build();
        let resp = send_get(test_app(&[1, 3, 4], config), "/v1/packs/6?mode=exact").await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = send_get(test_app(&[1, 3, 4], config), "/v1/packs/6?mode=greedy").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn plan_endpoint_reports_unavailable_exact_solver() {
        let config = SolverConfig::builder().exact_max_states(10).build();
        let resp = send_get(test_app(&[1, 3, 4], config), "/v1/packs/6?mode=exact").await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn catalog_endpoint_lists_sizes_and_mode() {
        let resp = send_get(default_app(), "/v1/packs").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({
                "pack_sizes": [250, 500, 1000, 2000, 5000],
                "mode": "greedy",
                "mode_override": true
            })
        );
    }

    #[tokio::test]
    async fn health_and_index_are_served() {
        let resp = send_get(default_app(), "/health").await;
        assert_eq!(body_json(resp).await, json!({"status": "ok"}));

        let resp = send_get(default_app(), "/").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send_get(default_app(), "/missing.js").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_headers_are_present() {
        let req = Request::builder()
            .uri("/v1/packs/1")
            .header(header::ORIGIN, "https://example.com")
            .body(Body::empty())
            .unwrap();
        let resp = default_app().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .map(|value| value.as_bytes()),
            Some(&b"*"[..])
        );
    }
}
