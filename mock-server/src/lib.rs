use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

/// A stored document: an id plus arbitrary top-level JSON fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// One RFC 6902 operation. Only `add`, `replace` and `remove` on top-level
/// paths are supported.
#[derive(Debug, Deserialize)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    pub value: Option<Value>,
}

/// What the server saw of a request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// One part of a received multipart upload.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

type Rejection = (StatusCode, String);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/{id}",
            get(get_item)
                .put(replace_item)
                .patch(patch_item)
                .delete(delete_item),
        )
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/files/{name}", get(file))
        .route("/upload", post(upload))
        .route("/me", get(me))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(
    State(db): State<Db>,
    Json(fields): Json<Map<String, Value>>,
) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        fields,
    };
    debug!(id = %item.id, "item created");
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Item>, StatusCode> {
    let items = db.read().await;
    items.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn replace_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<Item>, StatusCode> {
    let mut items = db.write().await;
    let item = items.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    item.fields = fields;
    Ok(Json(item.clone()))
}

async fn patch_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(ops): Json<Vec<PatchOp>>,
) -> Result<Json<Item>, Rejection> {
    let mut items = db.write().await;
    let item = items
        .get_mut(&id)
        .ok_or((StatusCode::NOT_FOUND, "no such item".to_string()))?;

    // Apply to a copy so a failing op leaves the item untouched.
    let mut fields = item.fields.clone();
    for op in ops {
        let key = op
            .path
            .strip_prefix('/')
            .filter(|key| !key.is_empty() && !key.contains('/'))
            .ok_or((StatusCode::BAD_REQUEST, format!("unsupported path {}", op.path)))?;
        match (op.op.as_str(), op.value) {
            ("add" | "replace", Some(value)) => {
                fields.insert(key.to_string(), value);
            }
            ("remove", _) => {
                fields
                    .remove(key)
                    .ok_or((StatusCode::BAD_REQUEST, format!("nothing at {}", op.path)))?;
            }
            (other, _) => {
                return Err((StatusCode::BAD_REQUEST, format!("unsupported op {other}")));
            }
        }
    }
    item.fields = fields;
    debug!(%id, "item patched");
    Ok(Json(item.clone()))
}

async fn delete_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut items = db.write().await;
    items.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Answer with whatever status the path names.
async fn status(Path(code): Path<u16>) -> Result<Response, Rejection> {
    let status = StatusCode::from_u16(code)
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid status {code}")))?;
    let body = json!({"status": code, "reason": status.canonical_reason()});
    Ok((status, Json(body)).into_response())
}

async fn file(Path(name): Path<String>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        format!("contents of {name}").into_bytes(),
    )
}

async fn upload(mut multipart: Multipart) -> Result<Json<Vec<UploadedPart>>, Rejection> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        parts.push(UploadedPart {
            name,
            file_name,
            content_type,
            size: data.len(),
        });
    }
    Ok(Json(parts))
}

/// Requires a non-empty bearer token.
async fn me(headers: HeaderMap) -> Result<Json<Value>, Rejection> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or((StatusCode::UNAUTHORIZED, "missing credentials".to_string()))?;
    Ok(Json(json!({"token": token})))
}
