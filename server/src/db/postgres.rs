use anyhow::{Context, Result};
use async_trait::async_trait;
use refinery::config::{Config, ConfigDbType};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::info;

use super::models::*;
use super::{RecordStore, StorageResult, merge_write_results};
use crate::config::PostgresConfig;

mod migrations {
    use refinery::embed_migrations;
    embed_migrations!("./migrations");
}

const SCORE_COLUMNS: &str =
    "name, best_time, created_at, country, region, city, city_lat_long, source_ip";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Run pending migrations, then open the connection pool.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        run_migrations(config).await?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool. The schema must already be migrated.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert the player row, or replace it only when the new time is lower.
    ///
    /// `xmax = 0` is true for a freshly inserted tuple; an update that the
    /// `WHERE` clause rejects returns no row at all.
    async fn write_player(&self, identity_key: &str, record: &ScoreRecord) -> Result<UpsertOutcome> {
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO players (id, name, best_time, created_at, country, region, city, city_lat_long, source_ip)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                best_time = EXCLUDED.best_time,
                created_at = EXCLUDED.created_at,
                country = EXCLUDED.country,
                region = EXCLUDED.region,
                city = EXCLUDED.city,
                city_lat_long = EXCLUDED.city_lat_long,
                source_ip = EXCLUDED.source_ip
            WHERE EXCLUDED.best_time < players.best_time
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(identity_key)
        .bind(&record.name)
        .bind(record.best_time)
        .bind(record.created_at)
        .bind(&record.country)
        .bind(&record.region)
        .bind(&record.city)
        .bind(&record.city_lat_long)
        .bind(&record.source_ip)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert player {}", identity_key))?;

        Ok(match inserted {
            Some(true) => UpsertOutcome::Created,
            Some(false) => UpsertOutcome::Improved,
            None => UpsertOutcome::Kept,
        })
    }

    async fn append_result(&self, record: &ScoreRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO results ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            SCORE_COLUMNS
        ))
        .bind(&record.name)
        .bind(record.best_time)
        .bind(record.created_at)
        .bind(&record.country)
        .bind(&record.region)
        .bind(&record.city)
        .bind(&record.city_lat_long)
        .bind(&record.source_ip)
        .execute(&self.pool)
        .await
        .context("Failed to append result")?;

        Ok(())
    }

    async fn list(&self, table: &str, limit: usize) -> Result<Vec<ScoreRecord>> {
        let records = sqlx::query_as::<_, ScoreRecord>(&format!(
            "SELECT {} FROM {} ORDER BY best_time ASC LIMIT $1",
            SCORE_COLUMNS, table
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query {}", table))?;

        Ok(records)
    }
}

async fn run_migrations(pg: &PostgresConfig) -> Result<()> {
    let mut config = Config::new(ConfigDbType::Postgres)
        .set_db_host(&pg.host)
        .set_db_port(&pg.port.to_string())
        .set_db_user(&pg.user)
        .set_db_pass(&pg.password)
        .set_db_name(&pg.database);

    let report = migrations::migrations::runner()
        .run_async(&mut config)
        .await
        .context("Failed to run migrations")?;
    info!(
        "Database migrations completed ({} applied)",
        report.applied_migrations().len()
    );

    Ok(())
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn upsert_best(
        &self,
        identity_key: &str,
        record: &ScoreRecord,
    ) -> StorageResult<UpsertOutcome> {
        let player = self.write_player(identity_key, record).await;
        let history = self.append_result(record).await;
        merge_write_results(identity_key, player, history)
    }

    async fn list_top_players(&self, limit: usize) -> StorageResult<Vec<PlayerRecord>> {
        Ok(self.list("players", limit).await?)
    }

    async fn list_all_submissions(&self, limit: usize) -> StorageResult<Vec<SubmissionRecord>> {
        Ok(self.list("results", limit).await?)
    }
}
