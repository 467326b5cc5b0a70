use sqlx::SqlitePool;
use tracing::debug;

use crate::{PortfolioSnapshot, Result};

/// Append-only portfolio history backed by SQLite.
#[derive(Clone)]
pub struct PortfolioStore {
    db: SqlitePool,
}

impl PortfolioStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.db).await?;
        Ok(())
    }

    pub async fn save(&self, snapshot: &PortfolioSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO portfolio_history (timestamp, total, available)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(snapshot.timestamp)
        .bind(snapshot.total)
        .bind(snapshot.available)
        .execute(&self.db)
        .await?;

        debug!(total = snapshot.total, available = snapshot.available, "Portfolio snapshot saved");
        Ok(())
    }

    /// Snapshots in ascending timestamp order. With a limit, only the most
    /// recent `limit` rows are returned, still oldest first.
    pub async fn history(&self, limit: Option<i64>) -> Result<Vec<PortfolioSnapshot>> {
        let rows = match limit {
            Some(limit) => {
                sqlx::query_as::<_, PortfolioSnapshot>(
                    r#"
                    SELECT timestamp, total, available FROM (
                        SELECT id, timestamp, total, available
                        FROM portfolio_history
                        ORDER BY timestamp DESC, id DESC
                        LIMIT ?1
                    )
                    ORDER BY timestamp ASC, id ASC
                    "#,
                )
                .bind(limit.max(0))
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, PortfolioSnapshot>(
                    r#"
                    SELECT timestamp, total, available
                    FROM portfolio_history
                    ORDER BY timestamp ASC, id ASC
                    "#,
                )
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(rows)
    }

    pub async fn latest(&self) -> Result<Option<PortfolioSnapshot>> {
        let row = sqlx::query_as::<_, PortfolioSnapshot>(
            r#"
            SELECT timestamp, total, available
            FROM portfolio_history
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    /// Total equity values, oldest first. Input for the Sharpe ratio.
    pub async fn totals(&self) -> Result<Vec<f64>> {
        Ok(self
            .history(None)
            .await?
            .into_iter()
            .map(|s| s.total)
            .collect())
    }
}
