use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::TrackedProduct;
use crate::utils::error::{AppError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracked_products (
    id           TEXT PRIMARY KEY,
    sid          TEXT NOT NULL UNIQUE,
    site         TEXT NOT NULL,
    url          TEXT NOT NULL,
    user_email   TEXT NOT NULL,
    target_price TEXT NOT NULL,
    created_at   TEXT NOT NULL
)
"#;

/// Persistence for tracked products. The scan path only ever reads;
/// writes happen on the ingestion and deletion paths.
#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

impl ProductStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect(&config.url)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<TrackedProduct>> {
        let rows = sqlx::query(
            "SELECT id, sid, site, url, user_email, target_price, created_at \
             FROM tracked_products ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    pub async fn exists_sid(&self, sid: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM tracked_products WHERE sid = ?")
            .bind(sid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn save(&self, product: TrackedProduct) -> Result<TrackedProduct> {
        let result = sqlx::query(
            "INSERT INTO tracked_products (id, sid, site, url, user_email, target_price, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.sid)
        .bind(&product.site)
        .bind(&product.url)
        .bind(&product.user_email)
        .bind(product.target_price.to_string())
        .bind(product.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(product),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::DuplicateProduct {
                    sid: product.sid.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<TrackedProduct>> {
        let row = sqlx::query(
            "SELECT id, sid, site, url, user_email, target_price, created_at \
             FROM tracked_products WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tracked_products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("product {}", id),
            });
        }
        Ok(())
    }
}

fn row_to_product(row: &SqliteRow) -> Result<TrackedProduct> {
    let target_price: String = row.try_get("target_price")?;
    let target_price = target_price
        .parse()
        .map_err(|e| AppError::Internal(format!("Corrupt target_price in store: {}", e)))?;

    Ok(TrackedProduct {
        id: row.try_get("id")?,
        sid: row.try_get("sid")?,
        site: row.try_get("site")?,
        url: row.try_get("url")?,
        user_email: row.try_get("user_email")?,
        target_price,
        created_at: row.try_get("created_at")?,
    })
}
