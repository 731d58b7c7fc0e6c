//! SQLite-backed provider store
//!
//! Same contract as the CSV store over a single `providers` table. Duplicate
//! NPIs are rejected through the primary key (`ON CONFLICT DO NOTHING`), and
//! storage order is insertion order (`rowid`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use npr_common::{InsertOutcome, NprError, ProviderRecord, Result, StoreStats};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use tracing::info;

use super::ProviderStore;

const SELECT_COLUMNS: &str = "npi, name, credential, phone, address, city, state, postal_code, \
                              specialty, source, created_at, updated_at";

const INSERT_SQL: &str = r#"
    INSERT INTO providers (
        npi, name, credential, phone, address, city, state, postal_code,
        specialty, source, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    ON CONFLICT(npi) DO NOTHING
"#;

/// Provider store on top of a SQLite connection pool
pub struct SqliteProviderStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ProviderRow {
    npi: String,
    name: String,
    credential: String,
    phone: String,
    address: String,
    city: String,
    state: String,
    postal_code: String,
    specialty: String,
    source: String,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl From<ProviderRow> for ProviderRecord {
    fn from(row: ProviderRow) -> Self {
        ProviderRecord {
            npi: row.npi,
            name: row.name,
            credential: row.credential,
            phone: row.phone,
            address: row.address,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            specialty: row.specialty,
            source: row.source,
            created_at: row.created_at.as_deref().and_then(parse_timestamp),
            updated_at: row.updated_at.as_deref().and_then(parse_timestamp),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

impl SqliteProviderStore {
    /// Connect to `url` (e.g. `sqlite://data/providers.db?mode=rwc`)
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_with<'e, E>(executor: E, record: &ProviderRecord) -> Result<bool>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(INSERT_SQL)
            .bind(&record.npi)
            .bind(&record.name)
            .bind(&record.credential)
            .bind(&record.phone)
            .bind(&record.address)
            .bind(&record.city)
            .bind(&record.state)
            .bind(&record.postal_code)
            .bind(&record.specialty)
            .bind(&record.source)
            .bind(record.created_at.map(|ts| ts.to_rfc3339()))
            .bind(record.updated_at.map(|ts| ts.to_rfc3339()))
            .execute(executor)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn exists(tx: &mut Transaction<'_, Sqlite>, npi: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM providers WHERE npi = ?1")
            .bind(npi)
            .fetch_one(&mut **tx)
            .await?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }
}

#[async_trait]
impl ProviderStore for SqliteProviderStore {
    fn describe(&self) -> String {
        "sqlite".to_string()
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS providers (
                npi TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                credential TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT '',
                postal_code TEXT NOT NULL DEFAULT '',
                specialty TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                created_at TEXT,
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn list_all(&self) -> BoxStream<'_, Result<ProviderRecord>> {
        sqlx::query_as::<_, ProviderRow>(
            "SELECT npi, name, credential, phone, address, city, state, postal_code, \
             specialty, source, created_at, updated_at FROM providers ORDER BY rowid",
        )
        .fetch(&self.pool)
        .map(|row| row.map(ProviderRecord::from).map_err(NprError::from))
        .boxed()
    }

    async fn find(&self, npi: &str) -> Result<Option<ProviderRecord>> {
        let row = sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {} FROM providers WHERE npi = ?1",
            SELECT_COLUMNS
        ))
        .bind(npi)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProviderRecord::from))
    }

    /// Case folding happens in Rust, as in the CSV store. SQLite's `lower()`
    /// only folds ASCII.
    async fn search(&self, text: &str) -> Result<Vec<ProviderRecord>> {
        self.list_all()
            .try_filter(|record| futures::future::ready(record.name_contains(text)))
            .try_collect()
            .await
    }

    async fn insert_if_missing(&self, record: &ProviderRecord) -> Result<InsertOutcome> {
        record.validate()?;

        if Self::insert_with(&self.pool, record).await? {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }

    async fn overwrite_all(&self, records: &[ProviderRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM providers").execute(&mut *tx).await?;

        for record in records {
            if !Self::insert_with(&mut *tx, record).await? {
                // Dropping the transaction rolls back the delete
                return Err(NprError::DuplicateKey(record.npi.clone()));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, npi: &str, record: &ProviderRecord) -> Result<bool> {
        record.validate()?;

        let mut tx = self.pool.begin().await?;
        if !Self::exists(&mut tx, npi).await? {
            return Ok(false);
        }
        if record.npi != npi && Self::exists(&mut tx, &record.npi).await? {
            return Err(NprError::DuplicateKey(record.npi.clone()));
        }

        sqlx::query(
            r#"
            UPDATE providers
            SET npi = ?1, name = ?2, credential = ?3, phone = ?4, address = ?5,
                city = ?6, state = ?7, postal_code = ?8, specialty = ?9, source = ?10,
                created_at = COALESCE(?11, created_at), updated_at = ?12
            WHERE npi = ?13
            "#,
        )
        .bind(&record.npi)
        .bind(&record.name)
        .bind(&record.credential)
        .bind(&record.phone)
        .bind(&record.address)
        .bind(&record.city)
        .bind(&record.state)
        .bind(&record.postal_code)
        .bind(&record.specialty)
        .bind(&record.source)
        .bind(record.created_at.map(|ts| ts.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .bind(npi)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, npi: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM providers WHERE npi = ?1")
            .bind(npi)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM providers")
            .execute(&self.pool)
            .await?;
        info!(removed = result.rows_affected(), "Provider table cleared");
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let rows = sqlx::query("SELECT source, COUNT(*) AS count FROM providers GROUP BY source")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = StoreStats::default();
        for row in rows {
            let source: String = row.get("source");
            let count: i64 = row.get("count");
            let count = usize::try_from(count).unwrap_or_default();
            stats.total += count;
            stats.by_source.insert(source, count);
        }
        Ok(stats)
    }
}
