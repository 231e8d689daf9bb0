use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapter::{FindOrCreate, StoreAdapter};
use crate::error::{is_retryable, StoreError, StoreResult};
use crate::types::{ClusterStatus, ExceptionCluster, IndexingResult, LogSource, Service, SourceType};
use xcluster_core::ExceptionRecord;

const MAX_CREATE_RETRIES: u32 = 5;

/// Postgres-backed store. `find_or_create_cluster` is the one operation that
/// must be serializable on `(service_id, fingerprint_static)`: the partial
/// unique index on active clusters enforces that, and this adapter retries
/// on the resulting unique violation by re-reading the row the other
/// transaction won.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))
    }
}

/// truncate to the top of the UTC hour; the unit the 24h sliding window is bucketed in.
fn hour_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp() - ts.timestamp().rem_euclid(3600);
    DateTime::from_timestamp(secs, 0).unwrap_or(ts)
}

struct ServiceRow {
    id: String,
    display_name: String,
    active: bool,
    log_processing_enabled: bool,
    fetch_interval_secs: i32,
    cleanup_interval_secs: i32,
    notification_target: Option<String>,
    last_log_fetch: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ServiceRow> for Service {
    fn from(r: ServiceRow) -> Self {
        Service {
            id: r.id,
            display_name: r.display_name,
            active: r.active,
            log_processing_enabled: r.log_processing_enabled,
            fetch_interval_secs: r.fetch_interval_secs as u64,
            cleanup_interval_secs: r.cleanup_interval_secs as u64,
            notification_target: r.notification_target,
            last_log_fetch: r.last_log_fetch,
            created_at: r.created_at,
        }
    }
}

struct LogSourceRow {
    id: Uuid,
    service_id: String,
    source_type: String,
    connection_descriptor: serde_json::Value,
    index_pattern: String,
    query_filter: Option<String>,
    fetch_enabled: bool,
    last_fetch_at: Option<DateTime<Utc>>,
    connection_status: String,
}

fn source_type_from_db(s: &str) -> Option<SourceType> {
    match s {
        "opensearch" => Some(SourceType::Opensearch),
        "elasticsearch" => Some(SourceType::Elasticsearch),
        "file" => Some(SourceType::File),
        "cloudwatch" => Some(SourceType::Cloudwatch),
        "http_push" => Some(SourceType::HttpPush),
        _ => None,
    }
}

struct ClusterRow {
    id: Uuid,
    service_id: String,
    log_source_id: Option<Uuid>,
    fingerprint_static: String,
    representative: serde_json::Value,
    logger: Option<String>,
    size: i64,
    frequency_24h: i64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    status: String,
    status_updated_at: Option<DateTime<Utc>>,
    status_updated_by: Option<String>,
    has_rca: bool,
}

fn row_to_cluster(r: ClusterRow) -> StoreResult<ExceptionCluster> {
    let representative: ExceptionRecord = serde_json::from_value(r.representative)
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;
    let status = ClusterStatus::from_str(&r.status).unwrap_or(ClusterStatus::Active);

    Ok(ExceptionCluster {
        id: r.id,
        service_id: r.service_id,
        log_source_id: r.log_source_id,
        fingerprint_static: r.fingerprint_static,
        representative,
        logger: r.logger,
        size: r.size,
        frequency_24h: r.frequency_24h,
        first_seen: r.first_seen,
        last_seen: r.last_seen,
        status,
        status_updated_at: r.status_updated_at,
        status_updated_by: r.status_updated_by,
        has_rca: r.has_rca,
    })
}

#[async_trait]
impl StoreAdapter for PgStore {
    async fn get_service(&self, id: &str) -> StoreResult<Option<Service>> {
        let row = sqlx::query_as!(
            ServiceRow,
            r#"
            select
                id, display_name, active, log_processing_enabled,
                fetch_interval_secs, cleanup_interval_secs, notification_target,
                last_log_fetch, created_at
            from services
            where id = $1
            "#,
            id,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Service::from))
    }

    async fn list_active_services(&self) -> StoreResult<Vec<Service>> {
        let rows = sqlx::query_as!(
            ServiceRow,
            r#"
            select
                id, display_name, active, log_processing_enabled,
                fetch_interval_secs, cleanup_interval_secs, notification_target,
                last_log_fetch, created_at
            from services
            where active
            order by id asc
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Service::from).collect())
    }

    async fn list_enabled_sources(&self, service_id: &str) -> StoreResult<Vec<LogSource>> {
        let rows = sqlx::query_as!(
            LogSourceRow,
            r#"
            select
                id, service_id, source_type, connection_descriptor,
                index_pattern, query_filter, fetch_enabled, last_fetch_at,
                connection_status
            from log_sources
            where service_id = $1 and fetch_enabled
            "#,
            service_id,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let source_type = source_type_from_db(&r.source_type)?;
                Some(LogSource {
                    id: r.id,
                    service_id: r.service_id,
                    source_type,
                    connection_descriptor: r.connection_descriptor,
                    index_pattern: r.index_pattern,
                    query_filter: r.query_filter,
                    fetch_enabled: r.fetch_enabled,
                    last_fetch_at: r.last_fetch_at,
                    connection_status: r.connection_status,
                })
            })
            .collect())
    }

    async fn find_or_create_cluster(
        &self,
        service_id: &str,
        log_source_id: Option<Uuid>,
        fingerprint_static: &str,
        representative: &ExceptionRecord,
    ) -> StoreResult<FindOrCreate> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = Utc::now();
            let new_id = Uuid::new_v4();
            let representative_json = serde_json::to_value(representative)
                .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;

            let insert = sqlx::query!(
                r#"
                insert into exception_clusters (
                    id, service_id, log_source_id, fingerprint_static,
                    representative, logger, size, frequency_24h,
                    first_seen, last_seen, status, has_rca
                ) values (
                    $1, $2, $3, $4, $5, $6, 1, 1, $7, $7, 'active', false
                )
                on conflict (service_id, fingerprint_static)
                do nothing
                returning id as "id!"
                "#,
                new_id,
                service_id,
                log_source_id,
                fingerprint_static,
                representative_json,
                representative.logger,
                now,
            )
            .fetch_optional(&self.pool)
            .await;

            match insert {
                Ok(Some(row)) => {
                    return Ok(FindOrCreate { cluster_id: row.id, created: true });
                }
                Ok(None) => {
                    // someone else's row won the unique slot; read it back. the
                    // key is permanent once created regardless of status, so
                    // the cluster is always found here if it was ever created.
                    let existing = sqlx::query!(
                        r#"
                        select id as "id!" from exception_clusters
                        where service_id = $1 and fingerprint_static = $2
                        "#,
                        service_id,
                        fingerprint_static,
                    )
                    .fetch_optional(&self.pool)
                    .await?;

                    if let Some(row) = existing {
                        return Ok(FindOrCreate { cluster_id: row.id, created: false });
                    }
                    // the other transaction hasn't committed visibly yet, or it
                    // rolled back; fall through and retry the insert.
                }
                Err(e) if is_retryable(&e) && attempt < MAX_CREATE_RETRIES => {
                    tracing::warn!(service_id, fingerprint_static, attempt, "cluster create conflict, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if attempt >= MAX_CREATE_RETRIES {
                return Err(StoreError::SerializationConflict(format!("{service_id}:{fingerprint_static}")));
            }
        }
    }

    async fn touch_cluster(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let bucket_start = hour_bucket(now);

        sqlx::query!(
            r#"update exception_clusters set size = size + 1, last_seen = $2 where id = $1"#,
            id,
            now,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query!(
            r#"
            insert into cluster_hourly_buckets (cluster_id, bucket_start, hit_count)
            values ($1, $2, 1)
            on conflict (cluster_id, bucket_start)
            do update set hit_count = cluster_hourly_buckets.hit_count + 1
            "#,
            id,
            bucket_start,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query!(
            r#"
            update exception_clusters
            set frequency_24h = (
                select coalesce(sum(hit_count), 0) from cluster_hourly_buckets
                where cluster_id = $1 and bucket_start > $2 - interval '24 hours'
            )
            where id = $1
            "#,
            id,
            now,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_cluster_status(
        &self,
        id: Uuid,
        status: ClusterStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query!(
            r#"
            update exception_clusters
            set status = $2, status_updated_at = $3, status_updated_by = $4
            where id = $1
            "#,
            id,
            status.as_str(),
            now,
            actor,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_cluster(&self, id: Uuid) -> StoreResult<Option<ExceptionCluster>> {
        let row = sqlx::query_as!(
            ClusterRow,
            r#"
            select
                id, service_id, log_source_id, fingerprint_static, representative,
                logger, size, frequency_24h, first_seen, last_seen, status,
                status_updated_at, status_updated_by, has_rca
            from exception_clusters
            where id = $1
            "#,
            id,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_cluster).transpose()
    }

    async fn list_clusters(
        &self,
        service_id: Option<&str>,
        status: Option<ClusterStatus>,
        since: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ExceptionCluster>> {
        let status_str = status.map(|s| s.as_str());
        let rows = sqlx::query_as!(
            ClusterRow,
            r#"
            select
                id, service_id, log_source_id, fingerprint_static, representative,
                logger, size, frequency_24h, first_seen, last_seen, status,
                status_updated_at, status_updated_by, has_rca
            from exception_clusters
            where ($1::text is null or service_id = $1)
              and ($2::text is null or status = $2)
              and ($3::timestamptz is null or last_seen >= $3)
            order by last_seen desc
            limit $4 offset $5
            "#,
            service_id,
            status_str,
            since,
            limit,
            offset,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_cluster).collect()
    }

    async fn advance_source_fetched_at(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query!(
            r#"update log_sources set last_fetch_at = $2 where id = $1"#,
            id,
            now,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_source_connection_status(&self, id: Uuid, status: &str) -> StoreResult<()> {
        sqlx::query!(
            r#"update log_sources set connection_status = $2 where id = $1"#,
            id,
            status,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_indexing_result(&self, result: IndexingResult) -> StoreResult<()> {
        sqlx::query!(
            r#"
            insert into indexing_results (service_id, commit_hash, status, error, recorded_at)
            values ($1, $2, $3, $4, now())
            "#,
            result.service_id,
            result.commit_hash,
            result.status,
            result.error,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
