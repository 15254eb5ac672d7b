//! Readiness reporting.
//!
//! The probe queries the metadata table rather than `SELECT 1`, so a pool
//! pointed at an unmigrated database reports degraded instead of ready.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use staffer_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub status: Readiness,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub database: ComponentHealth,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let database = probe_metadata_table(&state.db_pool).await;
    let status = database.status;

    let report = HealthReport { status, database, checked_at: Utc::now().to_rfc3339() };

    let code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

async fn probe_metadata_table(pool: &DbPool) -> ComponentHealth {
    let probe =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversation_metadata")
            .fetch_one(pool)
            .await;

    match probe {
        Ok(rows) => ComponentHealth {
            status: Readiness::Ready,
            detail: format!("metadata store reachable ({rows} rows)"),
        },
        Err(error) => ComponentHealth {
            status: Readiness::Degraded,
            detail: format!("metadata store probe failed: {error}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use staffer_db::{connect_with_settings, migrations};

    use super::{health, HealthState, Readiness};

    #[tokio::test]
    async fn migrated_database_reports_ready() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let (status, Json(report)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, Readiness::Ready);
        assert_eq!(report.database.status, Readiness::Ready);

        pool.close().await;
    }

    #[tokio::test]
    async fn unmigrated_database_reports_degraded() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");

        let (status, Json(report)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, Readiness::Degraded);
        assert_eq!(report.database.status, Readiness::Degraded);
    }
}
