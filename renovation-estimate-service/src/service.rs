use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn,
    response::Json,
    routing::{get, post},
};
use renovation_core::visualization::{HttpFallbackRenderer, HttpImageProvider};
use renovation_core::{
    CostEstimationEngine, EstimateRequest, FallbackRenderer, RoomType,
    VisualizationJobOrchestrator, VisualizationPipeline,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    assessor::{LlmSpaceAssessor, SpaceAssessor},
    config::ServiceConfig,
    handler::EstimateRequestHandler,
    models::EstimateResponse,
    storage::{EstimateStore, InMemoryEstimateStore},
    telemetry::correlation_id_middleware,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "estimate_id": id
        })),
    )
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub handler: EstimateRequestHandler,
    pub store: Arc<dyn EstimateStore>,
}

impl AppState {
    pub fn new(handler: EstimateRequestHandler) -> Self {
        let store = handler.store().clone();
        Self { handler, store }
    }
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let app_state = create_app_state(config)?;
    Ok(build_router(app_state))
}

pub fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let tables = config.load_factor_tables()?;
    let engine = CostEstimationEngine::new(Arc::new(tables));

    let primary = match &config.provider {
        Some(settings) => {
            info!(base_url = %settings.base_url, "Image provider configured");
            let provider = HttpImageProvider::new(settings.clone())?;
            Some(
                VisualizationJobOrchestrator::new(Arc::new(provider))
                    .with_config(config.orchestrator.clone()),
            )
        }
        None => {
            warn!("IMAGE_PROVIDER_BASE_URL or IMAGE_PROVIDER_API_KEY not set, primary visualization disabled");
            None
        }
    };

    let fallback: Option<Arc<dyn FallbackRenderer>> = match &config.fallback {
        Some(settings) => Some(Arc::new(HttpFallbackRenderer::new(settings.clone())?)),
        None => {
            warn!("FALLBACK_RENDER_URL or FALLBACK_RENDER_API_KEY not set, fallback renderer disabled");
            None
        }
    };

    let store: Arc<dyn EstimateStore> = Arc::new(InMemoryEstimateStore::new());
    let mut handler =
        EstimateRequestHandler::new(engine, VisualizationPipeline::new(primary, fallback), store);

    match &config.assessor {
        Some(settings) => {
            info!(model = %settings.model, "Space assessor configured");
            let assessor: Arc<dyn SpaceAssessor> =
                Arc::new(LlmSpaceAssessor::new(settings.clone())?);
            handler = handler.with_assessor(assessor);
        }
        None => warn!("OPENROUTER_API_KEY not set, estimates will use default assessments"),
    }

    Ok(AppState::new(handler))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/estimates", post(create_estimate))
        .route("/estimates/{estimate_id}", get(get_estimate))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Renovation Estimate Service",
        "version": "1.0.0",
        "description": "Cost estimates and renovated-room visualizations from a photo and a few answers",
        "endpoints": {
            "POST /estimates": "Create an estimate",
            "GET /estimates/{estimate_id}": "Fetch a previously created estimate",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_estimate(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<EstimateResponse> {
    let request = parse_estimate_request(&body)?;
    info!(room_type = %request.room_type, "Creating estimate");

    let response = state.handler.handle(request).await;
    Ok(Json(response))
}

fn parse_estimate_request(body: &[u8]) -> Result<EstimateRequest, ApiError> {
    let request: EstimateRequest = serde_json::from_slice(body).map_err(|e| {
        error!(error = %e, "Unparseable estimate request");
        internal_error(&format!("Invalid estimate request: {}", e))
    })?;

    if matches!(&request.room_type, RoomType::Other(label) if label.trim().is_empty()) {
        error!("Estimate request without roomType");
        return Err(internal_error("roomType is required"));
    }

    Ok(request)
}

async fn get_estimate(
    State(state): State<AppState>,
    Path(estimate_id): Path<String>,
) -> ApiResult<EstimateResponse> {
    match state.store.get(&estimate_id).await {
        Ok(Some(record)) => Ok(Json(record.response)),
        Ok(None) => Err(not_found_error("Estimate not found", &estimate_id)),
        Err(e) => {
            error!(estimate_id = %estimate_id, error = %e, "Failed to load estimate");
            Err(internal_error("Failed to load estimate"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::{StubAssessor, fallback};
    use axum::{body::Body, http::Request};
    use renovation_core::{Complexity, FactorTables, SpaceAssessment};
    use tower::ServiceExt;

    fn test_app(pipeline: VisualizationPipeline) -> Router {
        let handler = EstimateRequestHandler::new(
            CostEstimationEngine::new(Arc::new(FactorTables::standard())),
            pipeline,
            Arc::new(InMemoryEstimateStore::new()),
        )
        .with_assessor(Arc::new(StubAssessor::answering(SpaceAssessment {
            square_footage: Some(150.0),
            complexity: Some(Complexity::Medium),
            notes: "Tight layout with a tub-shower combo.".to_string(),
            ..SpaceAssessment::default()
        })));
        build_router(AppState::new(handler))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/estimates")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn creates_and_fetches_estimate() {
        let app = test_app(VisualizationPipeline::new(
            None,
            Some(fallback(Some("https://cdn.example.com/render.png"))),
        ));

        let response = app
            .clone()
            .oneshot(post_json(
                r#"{
                    "roomType": "Bathroom Remodeling",
                    "imageUrl": "https://cdn.example.com/bath.jpg",
                    "selectedFinishes": {},
                    "userAnswers": { "squareFootageRange": "100-200 sq ft", "email": "pat@example.com" }
                }"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-correlation-id"));
        let body = read_json(response).await;
        assert_eq!(body["squareFootage"], 150.0);
        assert_eq!(body["totalMin"], 30332);
        assert_eq!(body["totalMax"], 35759);
        assert_eq!(body["estimatedWeeks"], 5);
        assert_eq!(body["visualizationUrl"], "https://cdn.example.com/render.png");
        assert_eq!(body["visualizationSource"], "fallback");
        assert_eq!(body["costBreakdown"]["materials"]["cost"], 15875);
        assert_eq!(body["projectDetails"]["userAnswers"]["email"], "pat@example.com");

        let estimate_id = body["estimateId"].as_str().unwrap().to_string();
        let fetched = app
            .oneshot(
                Request::builder()
                    .uri(format!("/estimates/{}", estimate_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(read_json(fetched).await, body);
    }

    #[tokio::test]
    async fn failed_visualization_still_returns_estimate() {
        let app = test_app(VisualizationPipeline::new(None, Some(fallback(None))));

        let response = app
            .oneshot(post_json(
                r#"{"roomType": "Bathroom Remodeling", "imageUrl": "https://cdn.example.com/bath.jpg"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["visualizationUrl"], Value::Null);
        assert_eq!(body["visualizationSource"], Value::Null);
        assert_eq!(body["totalMin"], 30332);
    }

    #[tokio::test]
    async fn malformed_body_is_internal_error() {
        let app = test_app(VisualizationPipeline::disabled());

        let response = app.oneshot(post_json("{ not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid estimate request"));
    }

    #[tokio::test]
    async fn missing_or_blank_room_type_is_internal_error() {
        for payload in [r#"{"imageUrl": "https://cdn.example.com/a.jpg"}"#, r#"{"roomType": "  "}"#] {
            let app = test_app(VisualizationPipeline::disabled());
            let response = app.oneshot(post_json(payload)).await.unwrap();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(read_json(response).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn unknown_room_type_is_priced_not_rejected() {
        let app = test_app(VisualizationPipeline::disabled());

        let response = app
            .oneshot(post_json(r#"{"roomType": "Wine Cellar"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert!(body["totalMin"].as_u64().unwrap() <= body["totalMax"].as_u64().unwrap());
        assert_eq!(body["projectDetails"]["roomType"], "Wine Cellar");
    }

    #[tokio::test]
    async fn unknown_estimate_is_not_found() {
        let app = test_app(VisualizationPipeline::disabled());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/estimates/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(response).await["estimate_id"], "does-not-exist");
    }

    #[tokio::test]
    async fn health_and_root_respond() {
        let app = test_app(VisualizationPipeline::disabled());

        let health = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(read_json(health).await["status"], "healthy");

        let root = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(read_json(root).await["endpoints"]["POST /estimates"].is_string());
    }

    #[test]
    fn state_builds_from_empty_config() {
        let config = ServiceConfig::from_lookup(|_| None).unwrap();
        assert!(create_app_state(&config).is_ok());
    }
}
