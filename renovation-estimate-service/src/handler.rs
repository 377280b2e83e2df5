use renovation_core::{
    CostEstimate, CostEstimationEngine, EstimateRequest, RenderBrief, SpaceAssessment,
    Visualization, VisualizationPipeline,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assessor::SpaceAssessor;
use crate::models::EstimateResponse;
use crate::storage::{EstimateRecord, EstimateStore};

/// Everything produced for one request, before response assembly.
#[derive(Debug, Clone)]
pub struct EstimateOutcome {
    pub assessment: SpaceAssessment,
    pub estimate: CostEstimate,
    pub visualization: Visualization,
}

/// Runs one estimate request end to end:
/// assessment, pricing, visualization, then persistence.
#[derive(Clone)]
pub struct EstimateRequestHandler {
    assessor: Option<Arc<dyn SpaceAssessor>>,
    engine: CostEstimationEngine,
    visualization: VisualizationPipeline,
    store: Arc<dyn EstimateStore>,
}

impl EstimateRequestHandler {
    pub fn new(
        engine: CostEstimationEngine,
        visualization: VisualizationPipeline,
        store: Arc<dyn EstimateStore>,
    ) -> Self {
        Self {
            assessor: None,
            engine,
            visualization,
            store,
        }
    }

    pub fn with_assessor(mut self, assessor: Arc<dyn SpaceAssessor>) -> Self {
        self.assessor = Some(assessor);
        self
    }

    pub fn store(&self) -> &Arc<dyn EstimateStore> {
        &self.store
    }

    pub async fn evaluate(&self, request: &EstimateRequest) -> EstimateOutcome {
        let assessment = self.assess(request).await;

        // Pricing never waits on, or depends on, visualization.
        let estimate = self.engine.estimate(request, &assessment);
        info!(
            room_type = %request.room_type,
            min = estimate.min,
            max = estimate.max,
            weeks = estimate.estimated_weeks,
            "Estimate priced"
        );

        let visualization = match RenderBrief::from_request(request) {
            Some(brief) => self.visualization.visualize(&brief).await,
            None => {
                info!("No photo supplied, skipping visualization");
                Visualization::Unavailable
            }
        };

        EstimateOutcome {
            assessment,
            estimate,
            visualization,
        }
    }

    pub async fn handle(&self, request: EstimateRequest) -> EstimateResponse {
        let outcome = self.evaluate(&request).await;
        let estimate_id = Uuid::new_v4().to_string();

        let response = EstimateResponse::assemble(
            estimate_id,
            &request,
            &outcome.assessment,
            &outcome.estimate,
            &outcome.visualization,
        );

        if let Err(e) = self.store.save(EstimateRecord::new(response.clone())).await {
            warn!(estimate_id = %response.estimate_id, error = %e, "Failed to store estimate");
        }

        response
    }

    async fn assess(&self, request: &EstimateRequest) -> SpaceAssessment {
        let Some(assessor) = &self.assessor else {
            return SpaceAssessment::default();
        };

        match assessor.assess(request).await {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(error = %e, "Space assessment failed, continuing with defaults");
                SpaceAssessment::default()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::InMemoryEstimateStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use renovation_core::{Complexity, FactorTables, FallbackRenderer, RoomType, StyleHints};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Assessor returning a fixed answer, or failing when given none.
    pub(crate) struct StubAssessor {
        pub assessment: Option<SpaceAssessment>,
        pub calls: AtomicU32,
    }

    impl StubAssessor {
        pub(crate) fn answering(assessment: SpaceAssessment) -> Self {
            Self {
                assessment: Some(assessment),
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                assessment: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SpaceAssessor for StubAssessor {
        async fn assess(&self, _request: &EstimateRequest) -> anyhow::Result<SpaceAssessment> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.assessment
                .clone()
                .ok_or_else(|| anyhow!("model unavailable"))
        }
    }

    pub(crate) struct FixedFallback {
        pub url: Option<String>,
        pub calls: AtomicU32,
    }

    #[async_trait]
    impl FallbackRenderer for FixedFallback {
        async fn render(
            &self,
            _image_url: &str,
            _room_type: &RoomType,
            _style: &StyleHints,
        ) -> renovation_core::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.url.clone().ok_or_else(|| {
                renovation_core::VisualizationError::Fallback("HTTP 503".to_string())
            })
        }
    }

    pub(crate) fn fallback(url: Option<&str>) -> Arc<FixedFallback> {
        Arc::new(FixedFallback {
            url: url.map(str::to_string),
            calls: AtomicU32::new(0),
        })
    }

    fn engine() -> CostEstimationEngine {
        CostEstimationEngine::new(Arc::new(FactorTables::standard()))
    }

    fn bathroom_with_photo() -> EstimateRequest {
        let mut request = EstimateRequest::new(RoomType::Bathroom);
        request.image_url = Some("https://cdn.example.com/bath.jpg".to_string());
        request
    }

    fn assessed(sqft: f64) -> SpaceAssessment {
        SpaceAssessment {
            square_footage: Some(sqft),
            complexity: Some(Complexity::Medium),
            notes: "Compact layout.".to_string(),
            ..SpaceAssessment::default()
        }
    }

    #[tokio::test]
    async fn assessment_feeds_the_engine() {
        let assessor = Arc::new(StubAssessor::answering(assessed(150.0)));
        let handler = EstimateRequestHandler::new(
            engine(),
            VisualizationPipeline::disabled(),
            Arc::new(InMemoryEstimateStore::new()),
        )
        .with_assessor(assessor.clone());

        let outcome = handler.evaluate(&bathroom_with_photo()).await;

        assert_eq!(assessor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.estimate.total_base, 31928);
        assert_eq!(outcome.visualization, Visualization::Unavailable);
    }

    #[tokio::test]
    async fn assessor_failure_degrades_to_defaults() {
        let handler = EstimateRequestHandler::new(
            engine(),
            VisualizationPipeline::disabled(),
            Arc::new(InMemoryEstimateStore::new()),
        )
        .with_assessor(Arc::new(StubAssessor::failing()));

        let outcome = handler.evaluate(&bathroom_with_photo()).await;

        assert_eq!(outcome.assessment, SpaceAssessment::default());
        // Bathroom typical size applies.
        assert_eq!(outcome.estimate.square_footage, 75.0);
    }

    #[tokio::test]
    async fn visualization_outcome_does_not_change_numbers() {
        let store = Arc::new(InMemoryEstimateStore::new());
        let assessor: Arc<dyn SpaceAssessor> = Arc::new(StubAssessor::answering(assessed(150.0)));

        let with_fallback = EstimateRequestHandler::new(
            engine(),
            VisualizationPipeline::new(None, Some(fallback(Some("https://cdn.example.com/f.png")))),
            store.clone(),
        )
        .with_assessor(assessor.clone());
        let failing = EstimateRequestHandler::new(
            engine(),
            VisualizationPipeline::new(None, Some(fallback(None))),
            store.clone(),
        )
        .with_assessor(assessor);

        let rendered = with_fallback.evaluate(&bathroom_with_photo()).await;
        let unavailable = failing.evaluate(&bathroom_with_photo()).await;

        assert_eq!(rendered.visualization.source(), Some("fallback"));
        assert_eq!(unavailable.visualization, Visualization::Unavailable);
        assert_eq!(rendered.estimate, unavailable.estimate);
    }

    #[tokio::test]
    async fn no_photo_skips_visualization() {
        let renderer = fallback(Some("https://cdn.example.com/f.png"));
        let handler = EstimateRequestHandler::new(
            engine(),
            VisualizationPipeline::new(None, Some(renderer.clone())),
            Arc::new(InMemoryEstimateStore::new()),
        );

        let mut request = EstimateRequest::new(RoomType::Kitchen);
        request.image_url = Some("   ".to_string());
        let outcome = handler.evaluate(&request).await;

        assert_eq!(outcome.visualization, Visualization::Unavailable);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handled_estimates_are_stored() {
        let store = Arc::new(InMemoryEstimateStore::new());
        let handler = EstimateRequestHandler::new(
            engine(),
            VisualizationPipeline::disabled(),
            store.clone(),
        );

        let response = handler.handle(bathroom_with_photo()).await;

        assert_eq!(store.len(), 1);
        let record = store.get(&response.estimate_id).await.unwrap().unwrap();
        assert_eq!(record.response, response);
        assert!(Uuid::parse_str(&response.estimate_id).is_ok());
    }
}
