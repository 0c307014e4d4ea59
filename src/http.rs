//! HTTP entry points.
//!
//! | Method   | Path                     | Success |
//! |----------|--------------------------|---------|
//! | `POST`   | `/v1/interactives`       | 202     |
//! | `GET`    | `/v1/interactives`       | 200     |
//! | `GET`    | `/v1/interactives/:id`   | 200     |
//! | `PUT`    | `/v1/interactives/:id`   | 200     |
//! | `DELETE` | `/v1/interactives/:id`   | 200     |
//!
//! Write routes are only mounted while publishing is enabled. Failures are
//! rendered as `{"errors": [...]}`.

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use interactives_config::PaginationConfig;
use interactives_db::{Filter, Pagination};
use interactives_lifecycle::Manager;
use interactives_models::{Interactive, InteractiveView};
use interactives_upload::{Expectations, FormData, Validator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
    pub validator: Arc<Validator>,
    /// Root of the public links in responses.
    pub site_domain: Arc<str>,
    pub pagination: PaginationConfig,
    pub publishing_enabled: bool,
}

impl AppState {
    fn view(&self, interactive: Interactive) -> InteractiveView {
        InteractiveView::new(interactive, &self.site_domain)
    }
}

pub fn router(state: AppState) -> Router {
    let (collection, item) = match state.publishing_enabled {
        true => (get(list).post(create), get(fetch).put(update).delete(remove)),
        false => (get(list), get(fetch)),
    };
    Router::new()
        .route("/v1/interactives", collection)
        .route("/v1/interactives/:id", item)
        // Upload size is enforced while streaming the multipart body.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A failed request, as the client sees it.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    errors: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    errors: Vec<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, errors: vec![message.into()] }
    }
}

impl From<interactives_lifecycle::error::Error> for ApiError {
    fn from(err: interactives_lifecycle::error::Error) -> Self {
        if !err.is_client_error() {
            tracing::error!(error = ?err, "request failed");
        }
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self { status, errors: err.messages() }
    }
}

impl From<interactives_upload::error::Error> for ApiError {
    fn from(err: interactives_upload::error::Error) -> Self {
        match err.violations() {
            Some(violations) => Self {
                status: StatusCode::BAD_REQUEST,
                errors: violations.iter().map(ToString::to_string).collect(),
            },
            None => {
                tracing::error!(error = ?err, "could not read upload");
                Self { status: StatusCode::INTERNAL_SERVER_ERROR, errors: vec![err.to_string()] }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { errors: self.errors })).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn read_form(state: &AppState, headers: &HeaderMap, body: Body, expect: &Expectations) -> ApiResult<FormData> {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok());
    Ok(state.validator.validate(content_type, body.into_data_stream(), expect).await?)
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<(StatusCode, Json<InteractiveView>)> {
    let form = read_form(&state, &headers, body, &Expectations::create()).await?;
    let created = state.manager.create(form).await?;
    Ok((StatusCode::ACCEPTED, Json(state.view(created))))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<InteractiveView>> {
    let form = read_form(&state, &headers, body, &Expectations::update()).await?;
    let updated = state.manager.update(&id, form).await?;
    Ok(Json(state.view(updated)))
}

async fn fetch(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<InteractiveView>> {
    let interactive = state.manager.get(&id).await?;
    Ok(Json(state.view(interactive)))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<InteractiveView>> {
    let deleted = state.manager.delete(&id).await?;
    Ok(Json(state.view(deleted)))
}

/// Raw query; numbers are parsed by hand so bad values get the usual error body.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    offset: Option<String>,
    limit: Option<String>,
    resource_id: Option<String>,
    collection_id: Option<String>,
    title: Option<String>,
}

impl ListQuery {
    fn window(&self, config: &PaginationConfig) -> ApiResult<Pagination> {
        let offset = parse_count("offset", self.offset.as_deref(), config.default_offset)?;
        let limit = parse_count("limit", self.limit.as_deref(), config.default_limit)?;
        Ok(Pagination { offset, limit: limit.min(config.max_limit) })
    }

    fn filter(self) -> Filter {
        let present = |value: Option<String>| value.filter(|v| !v.is_empty());
        Filter {
            resource_id: present(self.resource_id),
            collection_id: present(self.collection_id),
            title: present(self.title),
            published_only: false,
        }
    }
}

fn parse_count(name: &str, value: Option<&str>, default: u32) -> ApiResult<u32> {
    match value {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("{name}: must be a non-negative integer, got {raw:?}"))),
    }
}

#[derive(Debug, Serialize)]
struct Page {
    items: Vec<InteractiveView>,
    count: usize,
    offset: u32,
    limit: u32,
    total_count: u64,
}

async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<Json<Page>> {
    let window = query.window(&state.pagination)?;
    let listing = state.manager.list(query.filter(), window).await?;
    let items: Vec<_> = listing.items.into_iter().map(|i| state.view(i)).collect();
    Ok(Json(Page {
        count: items.len(),
        items,
        offset: window.offset,
        limit: window.limit,
        total_count: listing.total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use interactives_db::MockRepository;
    use interactives_lifecycle::{ChannelNotifier, Settings};
    use interactives_models::{Archive, Metadata, State as RecordState};
    use interactives_storage::backend::MockBackend;
    use rstest::rstest;
    use serde_json::Value;
    use std::io::{Cursor, Write};
    use tokio::sync::mpsc;
    use tower::ServiceExt;
    use zip::write::SimpleFileOptions;

    const BOUNDARY: &str = "X-INTERACTIVES-BOUNDARY";
    const MULTIPART: &str = "multipart/form-data; boundary=X-INTERACTIVES-BOUNDARY";

    struct TestApp {
        router: Router,
        events: mpsc::Receiver<Vec<u8>>,
    }

    fn app_with(publishing_enabled: bool, records: Vec<Interactive>) -> TestApp {
        let (notifier, events) = ChannelNotifier::new(8);
        let settings = Settings { published_only: !publishing_enabled, ..Settings::default() };
        let manager = Manager::new(
            Arc::new(MockBackend::default()),
            Arc::new(MockRepository::with_records(records)),
            Arc::new(notifier),
            settings,
        );
        let state = AppState {
            manager: Arc::new(manager),
            validator: Arc::new(Validator::default()),
            site_domain: "http://localhost:27400".into(),
            pagination: PaginationConfig::default(),
            publishing_enabled,
        };
        TestApp { router: router(state), events }
    }

    fn app() -> TestApp {
        app_with(true, Vec::new())
    }

    fn zip_bundle() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("index.html", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"<html></html>").unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn multipart(file: Option<&[u8]>, metadata: Option<&str>) -> Body {
        let mut body = Vec::new();
        if let Some(data) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"bundle.zip\"\r\nContent-Type: application/zip\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(json) = metadata {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"interactive\"\r\n\r\n{json}\r\n").as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn metadata_json(title: &str, label: &str) -> String {
        format!(r#"{{"metadata": {{"title": "{title}", "label": "{label}", "internal_id": "id1"}}}}"#)
    }

    async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Body>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header(header::CONTENT_TYPE, MULTIPART);
        }
        let request = request.body(body.unwrap_or_else(Body::empty)).unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = match bytes.is_empty() {
            true => Value::Null,
            false => serde_json::from_slice(&bytes).unwrap(),
        };
        (status, json)
    }

    async fn create(app: &TestApp, title: &str) -> Value {
        let body = multipart(Some(&zip_bundle()), Some(&metadata_json(title, "label1")));
        let (status, json) = send(app, "POST", "/v1/interactives", Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED, "{json}");
        json
    }

    fn record(id: &str, published: bool) -> Interactive {
        Interactive {
            id: id.to_string(),
            sha: format!("sha-{id}"),
            metadata: Metadata {
                title: format!("title {id}"),
                label: "label1".to_string(),
                internal_id: "int1".to_string(),
                collection_id: None,
                slug: "label1".to_string(),
                resource_id: format!("Rsrc{id:0>4}"),
            },
            archive: Archive::default(),
            state: RecordState::ImportSuccess,
            active: true,
            published,
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let mut app = app();
        let created = create(&app, "t1").await;
        assert_eq!(created["state"], "ArchiveUploaded");
        assert_eq!(created["published"], false);
        assert_eq!(created["metadata"]["slug"], "label1");
        assert!(created.get("sha").is_none());
        assert!(created.get("active").is_none());
        let uri = created["uri"].as_str().unwrap();
        assert!(uri.starts_with("/interactives/label1-"));
        assert_eq!(created["url"], format!("http://localhost:27400{uri}/embed"));
        assert_eq!(created["archive"]["files"][0]["name"], "index.html");
        assert!(app.events.recv().await.is_some());

        let id = created["id"].as_str().unwrap();
        let (status, fetched) = send(&app, "GET", &format!("/v1/interactives/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], id);
    }

    #[rstest]
    #[case::no_metadata(true, None)]
    #[case::no_file(false, Some(r#"{"metadata": {"title": "t1", "label": "label1", "internal_id": "id1"}}"#))]
    #[case::no_title(true, Some(r#"{"metadata": {"label": "label1", "internal_id": "id1"}}"#))]
    #[tokio::test]
    async fn test_create_rejects_incomplete_forms(#[case] with_file: bool, #[case] metadata: Option<&str>) {
        let app = app();
        let bundle = zip_bundle();
        let body = multipart(with_file.then_some(bundle.as_slice()), metadata);
        let (status, json) = send(&app, "POST", "/v1/interactives", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!json["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_rejected() {
        let app = app();
        create(&app, "t1").await;
        let body = multipart(Some(&zip_bundle()), Some(&metadata_json("t2", "label2")));
        let (status, json) = send(&app, "POST", "/v1/interactives", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errors"][0].as_str().unwrap().contains("already uploaded"));
    }

    #[tokio::test]
    async fn test_missing_record() {
        let app = app();
        let (status, json) = send(&app, "GET", "/v1/interactives/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["errors"][0], "interactive nope not found");
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let app = app();
        let id = create(&app, "t1").await["id"].as_str().unwrap().to_string();
        let path = format!("/v1/interactives/{id}");

        let body = multipart(None, Some(&metadata_json("ignored", "newlabel")));
        let (status, updated) = send(&app, "PUT", &path, Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{updated}");
        assert_eq!(updated["metadata"]["slug"], "newlabel");
        assert_eq!(updated["metadata"]["title"], "t1");

        let (status, _) = send(&app, "DELETE", &path, None).await;
        assert_eq!(status, StatusCode::OK);
        for method in ["GET", "DELETE"] {
            let (status, _) = send(&app, method, &path, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_publishing_unimported_is_forbidden() {
        let app = app();
        let id = create(&app, "t1").await["id"].as_str().unwrap().to_string();
        let body = multipart(None, Some(r#"{"published": true}"#));
        let (status, _) = send(&app, "PUT", &format!("/v1/interactives/{id}"), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[rstest]
    #[case("", 0, 20)]
    #[case("?offset=1&limit=5", 1, 5)]
    #[case("?limit=1000", 0, 100)]
    #[tokio::test]
    async fn test_list_window(#[case] query: &str, #[case] offset: u32, #[case] limit: u32) {
        let app = app_with(true, vec![record("1", true), record("2", false)]);
        let (status, page) = send(&app, "GET", &format!("/v1/interactives{query}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["offset"], offset);
        assert_eq!(page["limit"], limit);
        assert_eq!(page["total_count"], 2);
        assert_eq!(page["count"], page["items"].as_array().unwrap().len());
    }

    #[rstest]
    #[case("?offset=-1")]
    #[case("?limit=abc")]
    #[case("?limit=-5")]
    #[tokio::test]
    async fn test_list_rejects_bad_window(#[case] query: &str) {
        let app = app();
        let (status, json) = send(&app, "GET", &format!("/v1/interactives{query}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_only_deployment() {
        let app = app_with(false, vec![record("1", true), record("2", false)]);
        let body = multipart(Some(&zip_bundle()), Some(&metadata_json("t1", "label1")));
        let (status, _) = send(&app, "POST", "/v1/interactives", Some(body)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = send(&app, "DELETE", "/v1/interactives/1", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = send(&app, "GET", "/v1/interactives/1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", "/v1/interactives/2", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, page) = send(&app, "GET", "/v1/interactives", None).await;
        assert_eq!(page["total_count"], 1);
        assert_eq!(page["items"][0]["id"], "1");
    }
}
