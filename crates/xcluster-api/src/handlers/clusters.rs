//! Cluster query interface: read-only list/detail plus the one mutating
//! call, the user-driven status transition. Consumed by the UI and the RCA
//! collaborator; neither is part of this core.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use xcluster_store::{ClusterStatus, ExceptionCluster};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListClustersQuery {
    pub service_id: Option<String>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ClusterSummary {
    pub id: Uuid,
    pub service_id: String,
    pub fingerprint_static: String,
    pub exception_type: String,
    pub logger: Option<String>,
    pub size: i64,
    pub frequency_24h: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: ClusterStatus,
    pub has_rca: bool,
}

impl From<&ExceptionCluster> for ClusterSummary {
    fn from(c: &ExceptionCluster) -> Self {
        Self {
            id: c.id,
            service_id: c.service_id.clone(),
            fingerprint_static: c.fingerprint_static.clone(),
            exception_type: c.representative.exception_type.clone(),
            logger: c.logger.clone(),
            size: c.size,
            frequency_24h: c.frequency_24h,
            first_seen: c.first_seen,
            last_seen: c.last_seen,
            status: c.status,
            has_rca: c.has_rca,
        }
    }
}

pub async fn list_clusters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListClustersQuery>,
) -> Result<Json<Vec<ClusterSummary>>, ApiError> {
    let status = query.status.as_deref().and_then(ClusterStatus::from_str);
    let clusters = state
        .store
        .list_clusters(query.service_id.as_deref(), status, query.since, query.limit, query.offset)
        .await?;
    Ok(Json(clusters.iter().map(ClusterSummary::from).collect()))
}

pub async fn get_cluster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExceptionCluster>, ApiError> {
    let cluster = state.store.get_cluster(id).await?.ok_or(ApiError::ClusterNotFound(id))?;
    Ok(Json(cluster))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
    pub actor: String,
}

#[derive(Debug, Serialize)]
pub struct SetStatusResponse {
    pub id: Uuid,
    pub status: ClusterStatus,
}

pub async fn set_cluster_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<SetStatusResponse>, ApiError> {
    let status = ClusterStatus::from_str(&req.status).ok_or_else(|| ApiError::InvalidStatus(req.status.clone()))?;
    state.store.set_cluster_status(id, status, &req.actor, Utc::now()).await?;
    Ok(Json(SetStatusResponse { id, status }))
}
