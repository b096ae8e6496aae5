//! Helpers for the tests that need a live database (`DB_URL`).

use crate::connection::open_database;
use crate::handle::DataSource;
use configuration::DatabaseSettings;
use uuid::Uuid;

pub(crate) fn live_settings() -> DatabaseSettings {
    let url = std::env::var("DB_URL").expect("DB_URL required");
    DatabaseSettings {
        url: Some(url),
        ..Default::default()
    }
}

pub(crate) async fn live_source() -> DataSource {
    let pool = open_database(&live_settings()).await.expect("open failed");
    DataSource::new(pool)
}

/// A uniquely named table, so live tests can run side by side.
pub(crate) struct ScratchTable {
    pub(crate) name: String,
}

impl ScratchTable {
    pub(crate) async fn create(source: &DataSource) -> Self {
        let name = format!("till_scratch_{}", Uuid::new_v4().simple());
        sqlx::query(&format!(
            "CREATE TABLE {} (id BIGSERIAL PRIMARY KEY, note TEXT NOT NULL, created_at TIMESTAMP)",
            name
        ))
        .execute(source.pool())
        .await
        .expect("create scratch table failed");
        Self { name }
    }

    /// Rows visible outside any open transaction.
    pub(crate) async fn count(&self, source: &DataSource) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {}", self.name))
            .fetch_one(source.pool())
            .await
            .expect("count failed")
    }

    pub(crate) async fn remove(self, source: &DataSource) {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.name))
            .execute(source.pool())
            .await
            .expect("drop scratch table failed");
    }
}
