//! HTTP API for the catalog, order lists, orders and feedback.
//!
//! All routes live under `/api`. Errors are rendered as
//! `{ "error": <KIND>, "message": <text>, "details": <list?> }` with the
//! status derived from [`ErrorKind`].

use axum::{
	body::Bytes,
	extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use chrono::{DateTime, Utc};
use menu_config::ApiConfig;
use menu_core::{CoreError, ErrorKind, MenuEngine};
use menu_types::{Catalog, Feedback, FeedbackDraft, Order, OrderDraft, OrderList, OrderReceipt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

const CLEARED_MESSAGE: &str = "Alle Daten wurden gelöscht.";

#[derive(Clone)]
struct AppState {
	engine: Arc<MenuEngine>,
}

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	code: &'static str,
	message: String,
	details: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ErrorBody {
	error: &'static str,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	details: Option<Vec<String>>,
}

fn status_for(kind: ErrorKind) -> StatusCode {
	match kind {
		ErrorKind::NotFound => StatusCode::NOT_FOUND,
		ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
		ErrorKind::Forbidden => StatusCode::FORBIDDEN,
		ErrorKind::Conflict => StatusCode::CONFLICT,
		ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

impl From<CoreError> for ApiError {
	fn from(err: CoreError) -> Self {
		let kind = err.kind();
		Self {
			status: status_for(kind),
			code: kind.code(),
			message: err.to_string(),
			details: err.details(),
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		// Oversized bodies keep their 413; every other rejection is a bad request
		let status = match rejection.status() {
			StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
			_ => StatusCode::BAD_REQUEST,
		};
		Self {
			status,
			code: ErrorKind::BadRequest.code(),
			message: rejection.body_text(),
			details: None,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if self.status.is_server_error() {
			error!("Request failed: {}", self.message);
		}
		let body = ErrorBody {
			error: self.code,
			message: self.message,
			details: self.details,
		};
		(self.status, Json(body)).into_response()
	}
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct CreateListRequest {
	deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct UpdateOrderRequest {
	#[serde(flatten)]
	order: OrderDraft,
	#[serde(rename = "editKey")]
	edit_key: String,
}

#[derive(Debug, Deserialize)]
struct EditKeyRequest {
	#[serde(rename = "editKey")]
	edit_key: String,
}

#[derive(Serialize)]
struct HealthResponse {
	status: &'static str,
	state: String,
}

/// Builds the application router.
///
/// The dev routes are only mounted when enabled in the config, and the
/// static directory, if any, serves every path outside `/api`.
pub fn router(engine: Arc<MenuEngine>, config: &ApiConfig) -> Router {
	let mut api = Router::new()
		.route("/health", get(health))
		.route("/items", get(get_items))
		.route("/scrape", post(scrape))
		.route("/lists", post(create_list))
		.route("/lists/{list_id}", get(get_list).delete(delete_list))
		.route("/lists/{list_id}/orders", post(create_order))
		.route(
			"/lists/{list_id}/orders/{order_id}",
			get(get_order).put(update_order).delete(delete_order),
		)
		.route("/feedback", post(submit_feedback));

	if config.enable_dev_routes {
		warn!("Dev routes are enabled");
		api = api.route("/dev/clearall", get(clear_all));
	}

	let mut app = Router::new().nest("/api", api);
	if let Some(dir) = &config.static_dir {
		info!("Serving static files from {:?}", dir);
		app = app.fallback_service(ServeDir::new(dir));
	}

	app.with_state(AppState { engine })
		.layer(DefaultBodyLimit::max(config.max_request_size))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

/// Serves the API until `shutdown` resolves.
pub async fn start_http_server(
	engine: Arc<MenuEngine>,
	config: ApiConfig,
	shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
	let app = router(engine, &config);
	let address = config.bind_address();

	let listener = tokio::net::TcpListener::bind(&address).await?;
	info!("HTTP server listening on {}", address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok",
		state: state.engine.state().to_string(),
	})
}

async fn get_items(State(state): State<AppState>) -> ApiResult<Json<Catalog>> {
	Ok(Json(state.engine.catalog().get_catalog().await?))
}

async fn scrape(State(state): State<AppState>) -> ApiResult<Json<Catalog>> {
	Ok(Json(state.engine.catalog().refresh().await?))
}

async fn create_list(
	State(state): State<AppState>,
	body: Bytes,
) -> ApiResult<(StatusCode, Json<OrderList>)> {
	// The body is optional and a malformed one only loses the deadline
	let request = if body.iter().all(u8::is_ascii_whitespace) {
		CreateListRequest::default()
	} else {
		serde_json::from_slice(&body).unwrap_or_else(|e| {
			warn!("Ignoring unreadable order list body: {}", e);
			CreateListRequest::default()
		})
	};

	let list = state.engine.orders().create_order_list(request.deadline).await?;
	Ok((StatusCode::CREATED, Json(list)))
}

async fn get_list(
	State(state): State<AppState>,
	Path(list_id): Path<String>,
) -> ApiResult<Json<OrderList>> {
	Ok(Json(state.engine.orders().get_order_list(&list_id).await?))
}

async fn delete_list(
	State(state): State<AppState>,
	Path(list_id): Path<String>,
) -> ApiResult<StatusCode> {
	state.engine.orders().delete_order_list(&list_id).await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn create_order(
	State(state): State<AppState>,
	Path(list_id): Path<String>,
	payload: Result<Json<OrderDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderReceipt>)> {
	let Json(draft) = payload?;
	let receipt = state.engine.orders().create_order(&list_id, draft).await?;
	Ok((StatusCode::CREATED, Json(receipt)))
}

async fn get_order(
	State(state): State<AppState>,
	Path((list_id, order_id)): Path<(String, String)>,
) -> ApiResult<Json<Order>> {
	Ok(Json(state.engine.orders().get_order(&list_id, &order_id).await?))
}

async fn update_order(
	State(state): State<AppState>,
	Path((list_id, order_id)): Path<(String, String)>,
	payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> ApiResult<Json<Order>> {
	let Json(request) = payload?;
	let order = state
		.engine
		.orders()
		.update_order(&list_id, &order_id, &request.edit_key, request.order)
		.await?;
	Ok(Json(order))
}

async fn delete_order(
	State(state): State<AppState>,
	Path((list_id, order_id)): Path<(String, String)>,
	payload: Result<Json<EditKeyRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
	let Json(request) = payload?;
	state
		.engine
		.orders()
		.delete_order(&list_id, &order_id, &request.edit_key)
		.await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn submit_feedback(
	State(state): State<AppState>,
	payload: Result<Json<FeedbackDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Feedback>)> {
	let Json(draft) = payload?;
	let feedback = state.engine.orders().submit_feedback(draft).await?;
	Ok((StatusCode::CREATED, Json(feedback)))
}

async fn clear_all(State(state): State<AppState>) -> ApiResult<&'static str> {
	state.engine.orders().clear_all().await?;
	Ok(CLEARED_MESSAGE)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::{header::CONTENT_TYPE, Method, Request};
	use menu_core::EngineBuilder;
	use menu_source::implementations::file::FileCatalogSource;
	use menu_storage::implementations::memory::MemoryOrderStore;
	use menu_types::{Category, StoreItem, Variant};
	use serde_json::{json, Value};
	use tempfile::TempDir;
	use tower::ServiceExt;

	struct TestApp {
		router: Router,
		_dir: TempDir,
	}

	fn test_catalog() -> Catalog {
		Catalog {
			categories: vec![Category {
				id: "pizza".into(),
				name: "Pizza".into(),
				items: vec![StoreItem {
					id: "margherita".into(),
					title: "Margherita".into(),
					description: "Tomato and mozzarella".into(),
					price: "7,50 €".into(),
					variants: vec![Variant {
						name: "large".into(),
						description: "32cm".into(),
					}],
					dips: vec!["garlic".into()],
				}],
			}],
			drinks: vec![],
		}
	}

	async fn test_app(config: ApiConfig) -> TestApp {
		let dir = TempDir::new().unwrap();
		let catalog_path = dir.path().join("catalog.json");
		std::fs::write(&catalog_path, serde_json::to_vec(&test_catalog()).unwrap()).unwrap();

		let engine = EngineBuilder::new()
			.with_source(Arc::new(FileCatalogSource::new(catalog_path)))
			.with_store(Arc::new(MemoryOrderStore::new()))
			.with_cache_path(dir.path().join("cache").join("catalog.bin"))
			.build()
			.await
			.unwrap();

		TestApp {
			router: router(Arc::new(engine), &config),
			_dir: dir,
		}
	}

	async fn send(
		app: &TestApp,
		method: Method,
		uri: &str,
		body: Option<Value>,
	) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		let body = match body {
			Some(value) => {
				request = request.header(CONTENT_TYPE, "application/json");
				Body::from(serde_json::to_vec(&value).unwrap())
			}
			None => Body::empty(),
		};

		let response = app
			.router
			.clone()
			.oneshot(request.body(body).unwrap())
			.await
			.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
			.await
			.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap_or_else(|_| {
				Value::String(String::from_utf8_lossy(&bytes).into_owned())
			})
		};
		(status, value)
	}

	fn margherita_order(creator: &str) -> Value {
		json!({
			"creator": creator,
			"store_items": [{ "id": "margherita", "variants": ["large"], "dips": ["garlic"] }],
			"drink": { "name": "Cola", "size": 1 }
		})
	}

	async fn new_list(app: &TestApp) -> String {
		let (status, list) = send(app, Method::POST, "/api/lists", None).await;
		assert_eq!(status, StatusCode::CREATED);
		list["id"].as_str().unwrap().to_string()
	}

	#[tokio::test]
	async fn test_health() {
		let app = test_app(ApiConfig::default()).await;
		let (status, body) = send(&app, Method::GET, "/api/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
	}

	#[tokio::test]
	async fn test_items_include_surprise_category() {
		let app = test_app(ApiConfig::default()).await;
		let (status, body) = send(&app, Method::GET, "/api/items", None).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["categories"][0]["id"], "__etc");
		assert_eq!(body["categories"][1]["items"][0]["id"], "margherita");
	}

	#[tokio::test]
	async fn test_scrape_returns_fresh_catalog() {
		let app = test_app(ApiConfig::default()).await;
		let (status, body) = send(&app, Method::POST, "/api/scrape", None).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["categories"][0]["id"], "pizza");
	}

	#[tokio::test]
	async fn test_create_list_with_and_without_body() {
		let app = test_app(ApiConfig::default()).await;

		let (status, list) = send(&app, Method::POST, "/api/lists", None).await;
		assert_eq!(status, StatusCode::CREATED);
		assert!(list["deadline"].is_null());

		let (status, list) = send(
			&app,
			Method::POST,
			"/api/lists",
			Some(json!({ "deadline": "2099-01-01T12:00:00Z" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(list["deadline"], "2099-01-01T12:00:00Z");

		let (status, list) =
			send(&app, Method::POST, "/api/lists", Some(json!("not an object"))).await;
		assert_eq!(status, StatusCode::CREATED);
		assert!(list["deadline"].is_null());
	}

	#[tokio::test]
	async fn test_order_flow() {
		let app = test_app(ApiConfig::default()).await;
		let list_id = new_list(&app).await;

		let (status, receipt) = send(
			&app,
			Method::POST,
			&format!("/api/lists/{}/orders", list_id),
			Some(margherita_order("alice")),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		let order_id = receipt["id"].as_str().unwrap().to_string();
		let edit_key = receipt["editKey"].as_str().unwrap().to_string();
		let order_uri = format!("/api/lists/{}/orders/{}", list_id, order_id);

		let (status, order) = send(&app, Method::GET, &order_uri, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(order["creator"], "alice");
		assert!(order.get("editKey").is_none());

		let (status, list) = send(&app, Method::GET, &format!("/api/lists/{}", list_id), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(list["orders"].as_array().unwrap().len(), 1);

		let mut update = margherita_order("bob");
		update["editKey"] = json!(edit_key);
		let (status, order) = send(&app, Method::PUT, &order_uri, Some(update)).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(order["creator"], "bob");
		assert_eq!(order["id"], order_id.as_str());

		let (status, _) = send(
			&app,
			Method::DELETE,
			&order_uri,
			Some(json!({ "editKey": edit_key })),
		)
		.await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, body) = send(&app, Method::GET, &order_uri, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "NOT_FOUND");
	}

	#[tokio::test]
	async fn test_wrong_edit_key_is_forbidden() {
		let app = test_app(ApiConfig::default()).await;
		let list_id = new_list(&app).await;
		let (_, receipt) = send(
			&app,
			Method::POST,
			&format!("/api/lists/{}/orders", list_id),
			Some(margherita_order("alice")),
		)
		.await;
		let order_uri = format!("/api/lists/{}/orders/{}", list_id, receipt["id"].as_str().unwrap());

		let (status, body) = send(
			&app,
			Method::DELETE,
			&order_uri,
			Some(json!({ "editKey": "guess" })),
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"], "FORBIDDEN");

		let (status, _) = send(&app, Method::GET, &order_uri, None).await;
		assert_eq!(status, StatusCode::OK);
	}

	#[tokio::test]
	async fn test_invalid_orders_are_bad_requests() {
		let app = test_app(ApiConfig::default()).await;
		let list_id = new_list(&app).await;
		let uri = format!("/api/lists/{}/orders", list_id);

		let unknown = json!({ "creator": "alice", "store_items": [{ "id": "calzone" }] });
		let (status, body) = send(&app, Method::POST, &uri, Some(unknown)).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "BAD_REQUEST");

		let blank = json!({ "creator": " ", "store_items": [] });
		let (status, body) = send(&app, Method::POST, &uri, Some(blank)).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert!(!body["details"].as_array().unwrap().is_empty());

		let (status, body) = send(&app, Method::POST, &uri, Some(json!([1, 2, 3]))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "BAD_REQUEST");
	}

	#[tokio::test]
	async fn test_closed_list_rejects_orders() {
		let app = test_app(ApiConfig::default()).await;
		let (_, list) = send(
			&app,
			Method::POST,
			"/api/lists",
			Some(json!({ "deadline": "2000-01-01T00:00:00Z" })),
		)
		.await;

		let (status, body) = send(
			&app,
			Method::POST,
			&format!("/api/lists/{}/orders", list["id"].as_str().unwrap()),
			Some(margherita_order("alice")),
		)
		.await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "CONFLICT");
	}

	#[tokio::test]
	async fn test_delete_list() {
		let app = test_app(ApiConfig::default()).await;
		let list_id = new_list(&app).await;
		let uri = format!("/api/lists/{}", list_id);

		let (status, _) = send(&app, Method::DELETE, &uri, None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, _) = send(&app, Method::GET, &uri, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_feedback() {
		let app = test_app(ApiConfig::default()).await;

		let (status, feedback) = send(
			&app,
			Method::POST,
			"/api/feedback",
			Some(json!({ "type": "idea", "message": "More dips", "page": "/order" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(feedback["type"], "idea");

		let (status, _) = send(
			&app,
			Method::POST,
			"/api/feedback",
			Some(json!({ "type": "", "message": "x", "page": "/" })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_dev_routes_are_opt_in() {
		let app = test_app(ApiConfig::default()).await;
		let (status, _) = send(&app, Method::GET, "/api/dev/clearall", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let app = test_app(ApiConfig {
			enable_dev_routes: true,
			..ApiConfig::default()
		})
		.await;
		let list_id = new_list(&app).await;

		let (status, body) = send(&app, Method::GET, "/api/dev/clearall", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, Value::String(CLEARED_MESSAGE.to_string()));

		let (status, _) = send(&app, Method::GET, &format!("/api/lists/{}", list_id), None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_oversized_body_is_rejected() {
		let app = test_app(ApiConfig {
			max_request_size: 64,
			..ApiConfig::default()
		})
		.await;
		let list_id = new_list(&app).await;

		let mut order = margherita_order(&"a".repeat(128));
		order["drink"] = Value::Null;
		let (status, _) = send(
			&app,
			Method::POST,
			&format!("/api/lists/{}/orders", list_id),
			Some(order),
		)
		.await;
		assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
	}

	#[tokio::test]
	async fn test_static_files_are_served_outside_api() {
		let static_dir = TempDir::new().unwrap();
		std::fs::write(static_dir.path().join("index.html"), "<h1>menu</h1>").unwrap();

		let app = test_app(ApiConfig {
			static_dir: Some(static_dir.path().to_path_buf()),
			..ApiConfig::default()
		})
		.await;

		let (status, body) = send(&app, Method::GET, "/index.html", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, Value::String("<h1>menu</h1>".to_string()));
	}
}
