use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    middleware::from_fn,
    response::Json,
    routing::{get, post},
};
use report_fusion::{
    Collaborators, EnrichedRecord, LiteratureEnricher, PatientCase, ReportFusionPipeline,
    Throttled, ViewKind,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};

use crate::adapters::{
    HttpClassifier, LlmSummarizer, PubMedSearch, VisionReportGenerator,
    openrouter::OpenRouterClient,
};
use crate::config::ServiceConfig;
use crate::models::{CaseResult, CaseStatus, FuseBatchRequest};
use crate::paths::ImageRoot;
use crate::telemetry::correlation_id_middleware;
use crate::uploads::{StagedUploads, UploadedImage};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: ReportFusionPipeline,
    pub enricher: LiteratureEnricher,
    pub upload_dir: PathBuf,
    pub image_root: ImageRoot,
    pub default_max_studies: usize,
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let app_state = create_app_state(config)?;
    Ok(build_router(app_state, config.max_upload_bytes))
}

fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let http = reqwest::Client::new();
    // The three models take turns on the same inference budget
    let permits = Arc::new(Semaphore::new(config.inference_permits));

    let classifier = HttpClassifier::new(http.clone(), &config.classifier_url);
    let report_generator = VisionReportGenerator::new(
        OpenRouterClient::new(http.clone(), &config.openrouter_api_key),
        &config.report_model,
    );
    let summarizer = LlmSummarizer::new(&config.openrouter_api_key, &config.summary_model);

    let collaborators = Collaborators::new(
        Arc::new(Throttled::sharing(classifier, permits.clone())),
        Arc::new(Throttled::sharing(report_generator, permits.clone())),
        Arc::new(Throttled::sharing(summarizer, permits)),
    );
    let pipeline = ReportFusionPipeline::new(collaborators, config.fusion.clone())?;
    let enricher = LiteratureEnricher::new(Arc::new(PubMedSearch::new(
        http,
        &config.pubmed_base_url,
    )));

    Ok(AppState {
        pipeline,
        enricher,
        upload_dir: config.upload_dir.clone(),
        image_root: ImageRoot::new(&config.image_root),
        default_max_studies: config.default_max_studies,
    })
}

pub fn build_router(app_state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/get-prediction", post(get_prediction))
        .route("/fuse", post(fuse_batch))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Radiology Report Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Chest radiograph findings and impression from frontal/lateral views, with supporting literature",
        "endpoints": {
            "POST /get-prediction": "Multipart upload (uid, frontalImage, lateralImage, indications, maxStudies)",
            "POST /fuse": "Fuse a batch of cases whose images are already on disk",
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

#[derive(Debug, Default)]
struct PredictionForm {
    uid: Option<String>,
    indications: Option<String>,
    max_studies: Option<usize>,
    images: Vec<UploadedImage>,
}

async fn read_prediction_form(mut multipart: Multipart) -> Result<PredictionForm, ApiError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        error!("Malformed multipart request: {}", e);
        bad_request_error(&format!("Malformed form data: {}", e))
    };

    let mut form = PredictionForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "uid" => form.uid = Some(field.text().await.map_err(malformed)?),
            "indications" => form.indications = Some(field.text().await.map_err(malformed)?),
            "maxStudies" => {
                let raw = field.text().await.map_err(malformed)?;
                let max_studies = raw
                    .trim()
                    .parse()
                    .map_err(|_| bad_request_error("maxStudies must be a non-negative integer"))?;
                form.max_studies = Some(max_studies);
            }
            "frontalImage" | "lateralImage" => {
                let view = if name == "frontalImage" {
                    ViewKind::Frontal
                } else {
                    ViewKind::Lateral
                };
                let filename = field.file_name().unwrap_or("image").to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                if bytes.is_empty() {
                    debug!("Skipping empty {} upload", view);
                    continue;
                }
                form.images.push(UploadedImage {
                    view,
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            other => debug!("Ignoring unknown form field {}", other),
        }
    }

    Ok(form)
}

async fn get_prediction(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Vec<EnrichedRecord>> {
    let form = read_prediction_form(multipart).await?;

    let uid = form
        .uid
        .filter(|uid| !uid.trim().is_empty())
        .ok_or_else(|| bad_request_error("uid is required"))?;
    let indications = form
        .indications
        .ok_or_else(|| bad_request_error("indications is required"))?;
    let max_studies = form.max_studies.unwrap_or(state.default_max_studies);

    info!(uid = %uid, images = form.images.len(), max_studies, "Received prediction request");

    let staged = StagedUploads::stage(&state.upload_dir, &uid, form.images)
        .await
        .map_err(|e| {
            error!("Failed to stage uploads for {}: {:#}", uid, e);
            internal_error("Failed to save uploaded images", &format!("{:#}", e))
        })?;

    let case = PatientCase::new(
        uid,
        staged.frontal().to_vec(),
        staged.lateral().to_vec(),
        &indications,
    );

    let record = state.pipeline.fuse(&case).await.map_err(|e| {
        error!("Report fusion failed for {}: {}", case.uid(), e);
        internal_error("Report fusion failed", &e.to_string())
    })?;

    let enriched = state.enricher.enrich(&case, record, max_studies).await;

    // Uploads are only needed until the pipeline and enrichment are done
    drop(staged);

    Ok(Json(vec![enriched]))
}

async fn fuse_batch(
    State(state): State<AppState>,
    Json(request): Json<FuseBatchRequest>,
) -> ApiResult<Vec<CaseResult>> {
    if request.cases.is_empty() {
        return Err(bad_request_error("At least one case is required"));
    }

    info!(cases = request.cases.len(), "Received batch fusion request");

    let mut cases = Vec::with_capacity(request.cases.len());
    for case in request.cases {
        let rejected = |e: crate::paths::ImagePathError| {
            error!("Rejected image path for {}: {}", case.uid, e);
            bad_request_error(&e.to_string())
        };
        let frontal = state
            .image_root
            .resolve_all(&case.frontal_images)
            .await
            .map_err(rejected)?;
        let lateral = state
            .image_root
            .resolve_all(&case.lateral_images)
            .await
            .map_err(rejected)?;
        cases.push(PatientCase::new(case.uid, frontal, lateral, &case.indications));
    }
    let results = state.pipeline.fuse_batch(&cases).await;

    let response = cases
        .iter()
        .zip(results)
        .map(|(case, result)| match result {
            Ok(record) => CaseResult {
                uid: case.uid().to_string(),
                status: CaseStatus::Ok,
                record: Some(record),
                error: None,
            },
            Err(e) => CaseResult {
                uid: case.uid().to_string(),
                status: CaseStatus::Error,
                record: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::CORRELATION_HEADER;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use report_fusion::{
        Classifier, FusionConfig, LiteratureSearch, PathologyScoreMap, ReportGenerator, Study,
        SummaryBudget, Summarizer, ViewReport, ViewStatus,
    };
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "cxr-test-boundary";

    struct HighEdemaClassifier;

    #[async_trait]
    impl Classifier for HighEdemaClassifier {
        async fn analyze(&self, image: &Path) -> PathologyScoreMap {
            if image.exists() {
                [("Edema", 0.9), ("Pneumonia", 0.2)].into_iter().collect()
            } else {
                PathologyScoreMap::new()
            }
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        images: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ReportGenerator for RecordingGenerator {
        async fn generate(&self, image: &Path, _indication: &str, view: ViewKind) -> ViewReport {
            self.images.lock().unwrap().push(image.to_path_buf());
            if !image.exists() {
                return ViewReport::failed(ViewStatus::FileNotFound);
            }
            if image.file_stem().is_some_and(|stem| stem == "explode") {
                return ViewReport::ok("explode", "explode");
            }
            ViewReport::ok(format!("{} view opacity", view), "Possible edema")
        }
    }

    struct EchoSummarizer;

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, text: &str, _budget: SummaryBudget) -> anyhow::Result<String> {
            if text.contains("explode") {
                anyhow::bail!("summarizer crashed");
            }
            Ok(text.trim().to_string())
        }
    }

    struct StaticSearch;

    #[async_trait]
    impl LiteratureSearch for StaticSearch {
        async fn query(&self, _text: &str, max_results: usize) -> Vec<Study> {
            (0..max_results)
                .map(|i| Study {
                    title: format!("Edema study {i}"),
                    authors: vec!["Marie Curie".to_string()],
                    abstract_text: "Abstract".to_string(),
                    link: format!("https://pubmed.ncbi.nlm.nih.gov/{i}/"),
                })
                .collect()
        }
    }

    struct TestApp {
        router: Router,
        generator: Arc<RecordingGenerator>,
        upload_dir: PathBuf,
        image_root: PathBuf,
        _dir: TempDir,
    }

    fn test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let upload_dir = dir.path().join("uploads");
        let image_root = dir.path().join("images");
        std::fs::create_dir(&image_root).unwrap();
        let generator = Arc::new(RecordingGenerator::default());

        let collaborators = Collaborators::new(
            Arc::new(HighEdemaClassifier),
            generator.clone(),
            Arc::new(EchoSummarizer),
        );
        let state = AppState {
            pipeline: ReportFusionPipeline::new(collaborators, FusionConfig::default()).unwrap(),
            enricher: LiteratureEnricher::new(Arc::new(StaticSearch)),
            upload_dir: upload_dir.clone(),
            image_root: ImageRoot::new(&image_root),
            default_max_studies: 5,
        };

        TestApp {
            router: build_router(state, 1024 * 1024),
            generator,
            upload_dir,
            image_root,
            _dir: dir,
        }
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, filename, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn prediction_request(parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/get-prediction")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let response = app
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(CORRELATION_HEADER));
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_prediction_fuses_enriches_and_cleans_up() {
        let app = test_app();
        let request = prediction_request(&[
            Part::Text("uid", "case-42"),
            Part::Text("indications", "XXXX with dyspnea"),
            Part::Text("maxStudies", "2"),
            Part::File("frontalImage", "pa.png", &[1u8; 64]),
            Part::File("lateralImage", "lat.png", &[1u8; 32]),
        ]);

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let record = &body[0];
        assert_eq!(record["uid"], "case-42");
        assert_eq!(
            record["findings"],
            "Frontal view opacity. \nLateral view opacity. \nPathologies Found are andedema."
        );
        assert_eq!(record["medical_studies"].as_array().unwrap().len(), 2);

        let seen = app.generator.images.lock().unwrap().clone();
        let names: Vec<_> = seen.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(names, vec!["case-42_frontal_pa.png", "case-42_lateral_lat.png"]);
        assert!(seen.iter().all(|p| p.starts_with(&app.upload_dir)));
        let leftovers = std::fs::read_dir(&app.upload_dir).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_prediction_requires_uid() {
        let app = test_app();
        let request = prediction_request(&[
            Part::Text("indications", "cough"),
            Part::File("frontalImage", "pa.png", &[1u8; 8]),
        ]);

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "uid is required");
        assert!(app.generator.images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prediction_rejects_bad_max_studies() {
        let app = test_app();
        let request = prediction_request(&[
            Part::Text("uid", "case-1"),
            Part::Text("indications", ""),
            Part::Text("maxStudies", "lots"),
        ]);

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_reports_each_case_independently() {
        let app = test_app();
        std::fs::write(app.image_root.join("explode.png"), [0u8; 4]).unwrap();

        let request_body = json!({
            "cases": [
                { "uid": "bad", "frontal_images": ["explode.png"], "indications": "" },
                { "uid": "good", "indications": "routine" }
            ]
        });
        let request = Request::post("/fuse")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(request_body.to_string()))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body[0]["uid"], "bad");
        assert_eq!(body[0]["status"], "error");
        assert!(body[0].get("record").is_none());
        assert_eq!(body[1]["uid"], "good");
        assert_eq!(body[1]["status"], "ok");
        assert_eq!(body[1]["record"]["findings"], "");
    }

    #[tokio::test]
    async fn test_batch_paths_outside_image_root_are_rejected() {
        let app = test_app();
        let outside = app.upload_dir.parent().unwrap().join("secret.png");
        std::fs::write(&outside, [0u8; 4]).unwrap();

        for path in ["../secret.png".to_string(), outside.to_string_lossy().into_owned()] {
            let request_body = json!({
                "cases": [{ "uid": "x", "frontal_images": [path], "indications": "" }]
            });
            let request = Request::post("/fuse")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap();

            let response = app.router.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert!(app.generator.images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let app = test_app();
        let request = Request::post("/fuse")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"cases": []}"#))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
