use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::layout::analyzer::{analyze, LayoutAnalysis};
use crate::layout::fitting::{fit_translation, AdjustedRegion};
use crate::models::{DocumentStructure, PageStructure, TextRegion, TranslatedText, TranslationMap};
use crate::reconstruction::LayoutReport;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub page: PageStructure,
}

#[derive(Deserialize)]
pub struct FitRequest {
    pub region: TextRegion,
    pub translation: TranslatedText,
}

#[derive(Deserialize)]
pub struct ReconstructRequest {
    pub document: DocumentStructure,
    #[serde(default)]
    pub translations: TranslationMap,
    /// Overrides the configured strict mode for this job.
    pub strict: Option<bool>,
}

#[derive(Serialize)]
pub struct ReconstructResponse {
    pub document: DocumentStructure,
    pub report: LayoutReport,
}

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<LayoutAnalysis>, AppError> {
    let config = state.engine.fitting().clone();
    let analysis = tokio::task::spawn_blocking(move || analyze(&req.page, &config))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in analysis: {e}")))??;
    Ok(Json(analysis))
}

/// POST /api/v1/fit
pub async fn handle_fit(
    State(state): State<AppState>,
    Json(req): Json<FitRequest>,
) -> Result<Json<AdjustedRegion>, AppError> {
    if req.region.bounding_box.area() <= 0.0 {
        return Err(AppError::Validation(format!(
            "region '{}' has zero area",
            req.region.id
        )));
    }
    let font_size = req.region.formatting.font_size;
    if !font_size.is_finite() || font_size <= 0.0 {
        return Err(AppError::Validation(format!(
            "region '{}' has a non-positive font size",
            req.region.id
        )));
    }
    let config = state.engine.fitting().clone();
    let adjusted =
        tokio::task::spawn_blocking(move || fit_translation(&req.region, &req.translation, &config))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in fitting: {e}")))?;
    Ok(Json(adjusted))
}

/// POST /api/v1/reconstruct
pub async fn handle_reconstruct(
    State(state): State<AppState>,
    Json(req): Json<ReconstructRequest>,
) -> Result<Json<ReconstructResponse>, AppError> {
    let strict = req.strict.unwrap_or(state.engine.config().strict);
    let engine = state.engine.as_ref().clone().with_strict(strict);
    let reconstruction = engine.reconstruct(req.document, req.translations).await?;
    Ok(Json(ReconstructResponse {
        document: reconstruction.document,
        report: reconstruction.report,
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::{Config, EngineConfig};
    use crate::reconstruction::ReconstructionEngine;
    use crate::routes::build_router;
    use crate::state::AppState;

    fn make_app() -> Router {
        let engine_config = EngineConfig {
            worker_concurrency: 2,
            ..EngineConfig::default()
        };
        let config = Config {
            port: 0,
            rust_log: "info".to_string(),
            engine: engine_config.clone(),
        };
        let engine = ReconstructionEngine::new(engine_config).unwrap();
        build_router(AppState::new(config, engine))
    }

    fn make_region(id: &str, y: f32) -> Value {
        json!({
            "id": id,
            "bounding_box": {"x": 0, "y": y, "width": 100, "height": 20},
            "text_content": "aaaaaaaaaa",
            "formatting": {"font_family": "Courier", "font_size": 10}
        })
    }

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = make_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "layout-engine");
    }

    #[tokio::test]
    async fn test_analyze_returns_reading_order() {
        let page = json!({
            "page_number": 1,
            "dimensions": {"width": 220, "height": 200},
            "text_regions": [make_region("second", 100.0), make_region("first", 0.0)]
        });
        let (status, body) = post(make_app(), "/api/v1/analyze", json!({ "page": page })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reading_order"], json!(["first", "second"]));
    }

    #[tokio::test]
    async fn test_analyze_rejects_degenerate_region() {
        let mut region = make_region("flat", 0.0);
        region["bounding_box"]["height"] = json!(0);
        let page = json!({
            "page_number": 1,
            "dimensions": {"width": 220, "height": 200},
            "text_regions": [region]
        });
        let (status, body) = post(make_app(), "/api/v1/analyze", json!({ "page": page })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
    }

    #[tokio::test]
    async fn test_fit_shrinks_long_translation() {
        let req = json!({
            "region": make_region("r", 0.0),
            "translation": {"text": "aaaaaaaaaa bbbbbbbbbb", "confidence": 0.8}
        });
        let (status, body) = post(make_app(), "/api/v1/fit", req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["strategy"], "shrink");
        assert!(body["font_scale"].as_f64().unwrap() < 1.0);
    }

    #[tokio::test]
    async fn test_reconstruct_returns_document_and_report() {
        let req = json!({
            "document": {
                "format": "pdf",
                "pages": [{
                    "page_number": 1,
                    "dimensions": {"width": 220, "height": 200},
                    "text_regions": [make_region("r", 0.0)]
                }]
            },
            "translations": {"r": {"text": "bbbbbbbbbb", "confidence": 0.9}}
        });
        let (status, body) = post(make_app(), "/api/v1/reconstruct", req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["document"]["pages"][0]["text_regions"][0]["translated_text"],
            "bbbbbbbbbb"
        );
        assert_eq!(body["report"]["score"]["verdict"], "preserved");
    }

    #[tokio::test]
    async fn test_reconstruct_strict_override_rejects_conflicts() {
        let req = json!({
            "document": {
                "format": "pdf",
                "pages": [{
                    "page_number": 1,
                    "dimensions": {"width": 220, "height": 200},
                    "text_regions": [make_region("r", 0.0)],
                    "visual_elements": [{
                        "id": "img",
                        "element_type": "image",
                        "bounding_box": {"x": 0, "y": 5, "width": 100, "height": 16}
                    }]
                }]
            },
            "translations": {"r": {"text": "aaaaaaaaaa bbbbbbbbbb"}},
            "strict": true
        });
        let (status, _) = post(make_app(), "/api/v1/reconstruct", req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
