//! JSON handlers for the explorer UI.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cache::LoadError;
use crate::datasets::ConfigSnapshot;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::query::{
    normalize_label, rejected, resolve_params, DataSelection, QueryValueError, ResolvedParameters,
    WidgetDefaults,
};

type RawParams = Query<Vec<(String, String)>>;

/// Error response with a JSON body.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Upstream(String),
}

impl From<LoadError> for ApiError {
    fn from(error: LoadError) -> Self {
        match error {
            LoadError::NotFound(_) => Self::NotFound(error.to_string()),
            LoadError::LoaderFailure { .. } => Self::Upstream(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub datasets: usize,
    pub generation: u64,
    pub cached: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.store.current();
    Json(HealthResponse {
        status: "ok",
        datasets: snapshot.len(),
        generation: snapshot.generation,
        cached: state.cache.len(),
    })
}

#[derive(Debug, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub label: String,
    pub summary: String,
    pub path: String,
    pub index: String,
    pub loader: Option<String>,
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct DatasetList {
    pub fingerprint: Option<String>,
    pub captured_at: String,
    pub generation: u64,
    pub datasets: Vec<DatasetSummary>,
}

pub async fn list_datasets(State(state): State<AppState>) -> Json<DatasetList> {
    let snapshot = state.store.snapshot().await;
    Json(DatasetList {
        fingerprint: snapshot.fingerprint.as_ref().map(ToString::to_string),
        captured_at: snapshot.captured_at.to_rfc3339(),
        generation: snapshot.generation,
        datasets: snapshot
            .ordered()
            .map(|d| DatasetSummary {
                name: d.name.clone(),
                label: d.label.clone(),
                summary: d.summary().to_string(),
                path: d.source_path.clone(),
                index: d.index_column.clone(),
                loader: d.loader.clone(),
                fingerprint: d.fingerprint().short().to_string(),
            })
            .collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct Limits {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    pub name: String,
    pub label: String,
    pub loader: String,
    pub rows: usize,
    pub index: String,
    pub columns: Vec<String>,
    pub limits: Option<Limits>,
    pub aggregations: BTreeMap<String, String>,
    pub age_secs: u64,
    pub params: ResolvedParameters,
    pub defaults: WidgetDefaults,
    pub value_errors: Vec<String>,
}

pub async fn get_dataset(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Query(raw): RawParams,
) -> Result<Json<DatasetResponse>, ApiError> {
    let params = resolve(&state, raw);
    let (defaults, errors) = WidgetDefaults::from_bucket(&params.primary);

    let entry = state.cache.lookup(&name, &params).await.map_err(|e| {
        tracing::warn!(request_id = %request_id(&headers), dataset = %name, error = %e, "Dataset request failed");
        ApiError::from(e)
    })?;

    let frame = &entry.payload;
    Ok(Json(DatasetResponse {
        name: entry.name.clone(),
        label: entry.definition.label.clone(),
        loader: entry.loader.clone(),
        rows: frame.len(),
        index: frame.index_name().to_string(),
        columns: frame.column_names().into_iter().map(str::to_string).collect(),
        limits: frame.limits().map(|(start, end)| Limits { start, end }),
        aggregations: entry.definition.aggregations.clone(),
        age_secs: entry.age().as_secs(),
        params,
        defaults,
        value_errors: errors.iter().map(QueryValueError::to_string).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ParamsResponse {
    pub params: ResolvedParameters,
    pub defaults: WidgetDefaults,
    pub value_errors: Vec<String>,
    /// Dataset named by the `data` parameter, if it selects one.
    pub selected_dataset: Option<String>,
}

pub async fn get_params(State(state): State<AppState>, Query(raw): RawParams) -> Json<ParamsResponse> {
    let params = resolve(&state, raw);
    let (defaults, errors) = WidgetDefaults::from_bucket(&params.primary);
    let snapshot = state.store.snapshot().await;

    Json(ParamsResponse {
        selected_dataset: defaults.data.as_ref().and_then(|d| select_dataset(&snapshot, d)),
        params,
        defaults,
        value_errors: errors.iter().map(QueryValueError::to_string).collect(),
    })
}

fn resolve(state: &AppState, raw: Vec<(String, String)>) -> ResolvedParameters {
    if state.settings.query.process_query_params {
        resolve_params(raw, &state.registry)
    } else {
        rejected(raw)
    }
}

/// Match a `data` selection against the snapshot: by position, or by
/// normalized label or name.
fn select_dataset(snapshot: &ConfigSnapshot, selection: &DataSelection) -> Option<String> {
    match selection {
        DataSelection::Index(i) => snapshot.nth(*i).map(|d| d.name.clone()),
        DataSelection::Label(label) => {
            let wanted = normalize_label(label);
            snapshot
                .ordered()
                .find(|d| normalize_label(&d.label) == wanted || normalize_label(&d.name) == wanted)
                .map(|d| d.name.clone())
        }
        DataSelection::Bytes(_) | DataSelection::Range { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::parse_definitions;

    fn snapshot() -> ConfigSnapshot {
        let definitions = parse_definitions(
            b"[weather]\npath = \"w.csv\"\nindex = \"ts\"\n\
              [sales]\nlabel = \"**Store Sales**\"\npath = \"s.csv\"\nindex = \"ts\"\n",
        )
        .unwrap();
        ConfigSnapshot::from_definitions(definitions, None, 1)
    }

    #[test]
    fn test_select_dataset() {
        let snapshot = snapshot();
        assert_eq!(
            select_dataset(&snapshot, &DataSelection::Label("store sales".into())),
            Some("sales".into())
        );
        assert_eq!(
            select_dataset(&snapshot, &DataSelection::Label("`Weather`".into())),
            Some("weather".into())
        );
        assert_eq!(select_dataset(&snapshot, &DataSelection::Index(0)), Some("weather".into()));
        assert_eq!(select_dataset(&snapshot, &DataSelection::Index(1)), Some("sales".into()));
        assert_eq!(select_dataset(&snapshot, &DataSelection::Index(5)), None);
        assert_eq!(select_dataset(&snapshot, &DataSelection::Bytes(vec![1])), None);
    }

    #[test]
    fn test_error_status() {
        let not_found = ApiError::from(LoadError::NotFound("x".into())).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let upstream = ApiError::from(LoadError::LoaderFailure {
            name: "x".into(),
            source: crate::loaders::LoaderFailure::Malformed("bad".into()),
        })
        .into_response();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}
