//! In-process mock of the remote catalog API, used by the integration tests.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const TOKEN: &str = "test-token";

pub struct MockState {
    pub products: Vec<Value>,
    pub categories: Vec<Value>,
    /// Bearer token accepted on protected endpoints; `None` rejects all.
    pub accept_token: Option<String>,
    pub listing_hits: usize,
    pub search_hits: usize,
    pub create_hits: usize,
    pub searches: Vec<String>,
    /// Artificial delay before listing responses, to stage races.
    pub listing_delay: Option<Duration>,
    next_id: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            categories: vec![category("cat-1", "Lighting"), category("cat-2", "Decor")],
            accept_token: Some(TOKEN.to_string()),
            listing_hits: 0,
            search_hits: 0,
            create_hits: 0,
            searches: Vec::new(),
            listing_delay: None,
            next_id: 1,
        }
    }
}

impl MockState {
    /// A catalog with `count` seeded products, ids `p-1..p-count`.
    pub fn with_products(count: usize) -> Self {
        let mut state = Self::default();
        for _ in 0..count {
            let id = state.next_id;
            state.products.push(product(
                &format!("p-{}", id),
                &format!("Product {}", id),
                "cat-1",
            ));
            state.next_id += 1;
        }
        state
    }
}

pub fn category(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": null,
        "image": format!("https://cdn.example.com/{}.png", id),
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z",
    })
}

pub fn product(id: &str, name: &str, category_id: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": format!("Description of {}", name),
        "images": [format!("https://cdn.example.com/{}.png", id)],
        "price": 19.99,
        "slug": slugify(name),
        "category": category(category_id, "Lighting"),
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z",
    })
}

fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

pub struct MockApi {
    pub base_url: String,
    pub state: Arc<Mutex<MockState>>,
}

type Shared = Arc<Mutex<MockState>>;

pub async fn start(state: MockState) -> MockApi {
    let shared: Shared = Arc::new(Mutex::new(state));

    let app = Router::new()
        .route("/auth", post(auth))
        .route("/categories", get(categories))
        .route("/products", get(list_products).post(create_product))
        .route("/products/search", get(search_products))
        .route(
            "/products/:key",
            get(show_product).put(update_product).delete(delete_product),
        )
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockApi { base_url, state: shared }
}

fn authorized(headers: &HeaderMap, state: &MockState) -> bool {
    let Some(token) = &state.accept_token else {
        return false;
    };
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", token))
        .unwrap_or(false)
}

async fn auth(Json(body): Json<Value>) -> impl IntoResponse {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    if email.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "email required"})));
    }
    (StatusCode::OK, Json(json!({ "token": TOKEN })))
}

async fn categories(State(state): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    let state = state.lock();
    if !authorized(&headers, &state) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    (StatusCode::OK, Json(Value::Array(state.categories.clone())))
}

async fn list_products(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    // Snapshot before any delay so a mutation racing this request is not
    // reflected in the response, like a real server that already built it.
    let (page, delay) = {
        let mut state = state.lock();
        if !authorized(&headers, &state) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
        }
        state.listing_hits += 1;

        let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(10);
        let category_id = params.get("categoryId");

        let filtered: Vec<Value> = state
            .products
            .iter()
            .filter(|p| match category_id {
                Some(id) => p["category"]["id"] == json!(id),
                None => true,
            })
            .cloned()
            .collect();
        let total = filtered.len();
        let data: Vec<Value> = filtered.into_iter().skip(offset).take(limit).collect();

        (
            json!({ "data": data, "total": total, "offset": offset, "limit": limit }),
            state.listing_delay,
        )
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    (StatusCode::OK, Json(page))
}

async fn search_products(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mut state = state.lock();
    if !authorized(&headers, &state) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    let text = params.get("searchedText").cloned().unwrap_or_default();
    state.search_hits += 1;
    state.searches.push(text.clone());

    let needle = text.to_lowercase();
    let matches: Vec<Value> = state
        .products
        .iter()
        .filter(|p| {
            p["name"]
                .as_str()
                .map(|n| n.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    (StatusCode::OK, Json(Value::Array(matches)))
}

async fn show_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let state = state.lock();
    if !authorized(&headers, &state) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    match state.products.iter().find(|p| p["slug"] == json!(key)) {
        Some(product) => (StatusCode::OK, Json(product.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))),
    }
}

async fn create_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(draft): Json<Value>,
) -> impl IntoResponse {
    let mut state = state.lock();
    if !authorized(&headers, &state) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    state.create_hits += 1;

    let id = format!("p-{}", state.next_id);
    state.next_id += 1;
    let name = draft["name"].as_str().unwrap_or_default().to_string();
    let category_id = draft["categoryId"].as_str().unwrap_or("cat-1").to_string();

    let mut created = product(&id, &name, &category_id);
    created["description"] = draft["description"].clone();
    created["images"] = draft["images"].clone();
    created["price"] = draft["price"].clone();
    state.products.push(created.clone());

    (StatusCode::CREATED, Json(created))
}

async fn update_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(patch): Json<Value>,
) -> impl IntoResponse {
    let mut state = state.lock();
    if !authorized(&headers, &state) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    let Some(existing) = state.products.iter_mut().find(|p| p["id"] == json!(key)) else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})));
    };

    for field in ["name", "description", "images", "price"] {
        if let Some(value) = patch.get(field) {
            existing[field] = value.clone();
        }
    }
    if let Some(name) = patch.get("name").and_then(Value::as_str) {
        existing["slug"] = json!(slugify(name));
    }
    (StatusCode::OK, Json(existing.clone()))
}

async fn delete_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let mut state = state.lock();
    if !authorized(&headers, &state) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    let before = state.products.len();
    state.products.retain(|p| p["id"] != json!(key));
    if state.products.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})));
    }
    (StatusCode::NO_CONTENT, Json(json!(null)))
}
