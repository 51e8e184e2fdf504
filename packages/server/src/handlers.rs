//! HTTP handler functions for the solar siting API.

use actix_web::{HttpResponse, web};
use solar_siting_server_models::{AnalysisRequest, AnalysisResponse, ApiClass, ApiError, ApiHealth};
use solar_siting_suitability::SuitabilityError;
use solar_siting_suitability_models::SuitabilityClass;

use crate::AppState;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: if state.backend.is_ready() {
            "ready"
        } else {
            "unavailable"
        }
        .to_string(),
    })
}

/// `GET /api/classes`
///
/// Returns the suitability legend.
pub async fn classes() -> HttpResponse {
    let legend: Vec<ApiClass> = SuitabilityClass::all()
        .iter()
        .copied()
        .map(ApiClass::from)
        .collect();

    HttpResponse::Ok().json(legend)
}

/// `POST /perform_analysis`
///
/// Runs the suitability pipeline for the submitted area of interest.
pub async fn perform_analysis(
    state: web::Data<AppState>,
    body: web::Json<AnalysisRequest>,
) -> HttpResponse {
    let coordinates = body.aoi_coordinates.as_deref();
    if let Some(rings) = coordinates {
        log::info!(
            "Analysis requested for AOI with {} points",
            rings.first().map_or(0, Vec::len)
        );
    }

    match state.pipeline.analyze(&state.backend, coordinates).await {
        Ok(report) => HttpResponse::Ok().json(AnalysisResponse::from(report)),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &SuitabilityError) -> HttpResponse {
    match err {
        SuitabilityError::Validation { message } => {
            log::warn!("Rejected analysis request: {message}");
            HttpResponse::BadRequest().json(ApiError {
                error: message.clone(),
            })
        }
        SuitabilityError::BackendUnavailable { message } => {
            log::error!("Analysis requested while raster backend is unavailable");
            HttpResponse::InternalServerError().json(ApiError {
                error: message.clone(),
            })
        }
        SuitabilityError::Compute(_) | SuitabilityError::Config { .. } => {
            log::error!("Failed to perform analysis: {err:?}");
            HttpResponse::InternalServerError().json(ApiError {
                error: format!("Failed to perform analysis: {err}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};
    use solar_siting_raster::memory::{Grid, MemoryBackend};
    use solar_siting_raster::{
        BackendError, LayerSource, RasterBackend, RasterImage, ReduceParams, Reducer,
        Statistics, Visualization,
    };
    use solar_siting_suitability::BackendHandle;
    use solar_siting_suitability::config::PipelineConfig;
    use solar_siting_suitability::pipeline::SuitabilityPipeline;
    use solar_siting_suitability_models::{AreaOfInterest, LayerName};

    use crate::routes;

    use super::*;

    fn state(backend: BackendHandle) -> web::Data<AppState> {
        web::Data::new(AppState {
            backend,
            pipeline: SuitabilityPipeline::new(PipelineConfig::embedded()),
        })
    }

    fn memory_backend() -> BackendHandle {
        let grid = |value: f64| Grid::from_fn(0.0, 0.01, 0.001, 10, 10, move |_, _| value);
        BackendHandle::ready(
            MemoryBackend::new()
                .with_layer(LayerName::Elevation, grid(100.0))
                .unwrap()
                .with_layer(LayerName::LandCover, grid(60.0))
                .unwrap()
                .with_layer(LayerName::SolarRadiation, grid(1.5e7))
                .unwrap(),
        )
    }

    fn square() -> Value {
        json!({
            "aoi_coordinates": [[
                [0.0, 0.0], [0.01, 0.0], [0.01, 0.01], [0.0, 0.01], [0.0, 0.0]
            ]]
        })
    }

    struct FailingBackend;

    #[async_trait::async_trait]
    impl RasterBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn layer_source(&self, name: LayerName) -> Result<LayerSource, BackendError> {
            Ok(LayerSource::Named { name })
        }

        async fn reduce_region(
            &self,
            _image: &RasterImage,
            _aoi: &AreaOfInterest,
            _reducer: Reducer,
            _params: &ReduceParams,
        ) -> Result<Statistics, BackendError> {
            Err(BackendError::Remote {
                status: 400,
                message: "Geometry has too many edges".to_string(),
            })
        }

        async fn tile_url(
            &self,
            _image: &RasterImage,
            _visualization: &Visualization,
        ) -> Result<String, BackendError> {
            Ok(String::new())
        }
    }

    #[actix_web::test]
    async fn analysis_succeeds_on_memory_backend() {
        let app = test::init_service(
            App::new()
                .app_data(state(memory_backend()))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/perform_analysis")
            .set_json(square())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["chart_data"].as_array().unwrap().len(), 4);
        assert_eq!(body["chart_data"][0]["Suitability"], "Most Suitable");
        assert_eq!(body["chart_data"][0]["Area"], 1.24);
        assert_eq!(body["map_zoom"], 15);
        assert_eq!(body["elevation_min"], 100.0);
        assert!(body["num_panels"].as_u64().unwrap() > 1_700_000);
    }

    #[actix_web::test]
    async fn missing_coordinates_are_a_client_error() {
        let app = test::init_service(
            App::new()
                .app_data(state(memory_backend()))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/perform_analysis")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "AOI coordinates are required." }));
    }

    #[actix_web::test]
    async fn malformed_body_is_a_client_error() {
        let app = test::init_service(
            App::new()
                .app_data(state(memory_backend()))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/perform_analysis")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn unavailable_backend_is_a_server_error() {
        let app = test::init_service(
            App::new()
                .app_data(state(BackendHandle::unavailable("no credentials")))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/perform_analysis")
            .set_json(square())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["error"],
            solar_siting_suitability::BACKEND_UNAVAILABLE_MESSAGE
        );
    }

    #[actix_web::test]
    async fn compute_failure_returns_cause_without_partial_fields() {
        let app = test::init_service(
            App::new()
                .app_data(state(BackendHandle::ready(FailingBackend)))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/perform_analysis")
            .set_json(square())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 1);
        let message = object["error"].as_str().unwrap();
        assert!(message.starts_with("Failed to perform analysis: "));
        assert!(message.contains("Geometry has too many edges"));
    }

    #[actix_web::test]
    async fn health_reports_backend_state() {
        let app = test::init_service(
            App::new()
                .app_data(state(BackendHandle::unavailable("offline")))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["backend"], "unavailable");
    }

    #[actix_web::test]
    async fn classes_lists_legend() {
        let app = test::init_service(
            App::new()
                .app_data(state(memory_backend()))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/classes").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 4);
        assert_eq!(body[0]["color"], "#52E929");
        assert_eq!(body[3]["name"], "Not Suitable");
    }
}
