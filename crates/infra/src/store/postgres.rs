//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate id |
//! | Database (check constraint violation) | `23514` | `Backend` | Row violates a column constraint |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! ## Concurrency
//!
//! Status changes are a single `UPDATE ... WHERE id = $1 AND status = $2`; a zero-row
//! result is re-checked to tell `NotFound` from `Conflict`. Archival runs in one
//! transaction that locks the source row (`FOR UPDATE`), inserts history, then updates
//! the source. A failed source update rolls the history insert back with it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use scaleflow_core::{HistoryId, ProductId, QuoteId, Weight};
use scaleflow_products::{
    Archivable, ArchiveSubject, ArchivedEntity, HistoryRecord, HistorySource, NewHistoryRecord,
    NewProduct, NewQuote, Product, ProductStatus, Quote, QuoteStatus,
};

use super::{
    ArchiveReceipt, ArchiveStore, HistoryStore, ProductFilter, ProductStore, QuoteStore, StoreError,
    StoreResult,
};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const PRODUCT_COLUMNS: &str = "id, product_name, category, sub_category, estimated_weight, \
     predicted_weight, real_weight, status, notes, created_at";

const QUOTE_COLUMNS: &str =
    "id, product_name, category, estimated_weight, predicted_weight, status, created_at";

const HISTORY_COLUMNS: &str = "id, quote_id, source, product_name, category, sub_category, \
     estimated_weight, predicted_weight, real_weight, created_at";

/// Postgres-backed implementation of every store trait.
///
/// `Send + Sync`; all connection handling is delegated to the SQLx pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    /// After a guarded update touched no row: was it missing, or did it move on?
    async fn missing_or_conflict(&self, table: &'static str, id: uuid::Uuid, expected: &str) -> StoreError {
        let sql = format!("SELECT status FROM {table} WHERE id = $1");
        match sqlx::query(&sql).bind(id).fetch_optional(&*self.pool).await {
            Ok(None) => StoreError::NotFound,
            Ok(Some(row)) => {
                let found: String = row.try_get("status").unwrap_or_default();
                StoreError::Conflict(format!("expected status '{expected}', found '{found}'"))
            }
            Err(e) => map_sqlx_error("recheck_status", e),
        }
    }

    async fn archive_product(&self, id: ProductId, real_weight: Option<Weight>) -> StoreResult<ArchiveReceipt> {
        let mut tx = self.begin().await?;

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?
            .ok_or(StoreError::NotFound)?;
        let current = decode::<ProductRow>(&row)?.into_domain()?;

        let (archived, record) = stage_archive(current, real_weight)?;
        insert_history_tx(&mut tx, &record).await?;

        sqlx::query("UPDATE products SET status = $2, real_weight = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(archived.status.as_str())
            .bind(archived.real_weight.map(Weight::value))
            .execute(&mut *tx)
            .await
            .map_err(|e| source_update_error(Product::SOURCE, e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(ArchiveReceipt {
            record,
            entity: ArchivedEntity::Product(archived),
        })
    }

    async fn archive_quote(&self, id: QuoteId, real_weight: Option<Weight>) -> StoreResult<ArchiveReceipt> {
        let mut tx = self.begin().await?;

        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_quote", e))?
            .ok_or(StoreError::NotFound)?;
        let current = decode::<QuoteRow>(&row)?.into_domain()?;

        let (archived, record) = stage_archive(current, real_weight)?;
        insert_history_tx(&mut tx, &record).await?;

        sqlx::query("UPDATE quotes SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(archived.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| source_update_error(Quote::SOURCE, e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(ArchiveReceipt {
            record,
            entity: ArchivedEntity::Quote(archived),
        })
    }
}

/// `timestamptz` keeps microseconds; values handed back to callers must match what a
/// later read returns.
fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Domain half of the archival unit: check the locked row, build both writes.
fn stage_archive<T: Archivable>(current: T, real_weight: Option<Weight>) -> StoreResult<(T, HistoryRecord)> {
    current.ensure_archivable().map_err(StoreError::Rejected)?;
    let record = current
        .snapshot(real_weight)
        .into_record(HistoryId::new(), db_now());
    Ok((current.archived(real_weight), record))
}

/// The archival transaction is dropped uncommitted, so the history insert goes with it.
fn source_update_error(kind: HistorySource, err: sqlx::Error) -> StoreError {
    StoreError::rolled_back(kind, err.to_string())
}

async fn insert_history_tx(tx: &mut Transaction<'_, Postgres>, record: &HistoryRecord) -> StoreResult<()> {
    bind_history(record)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::ArchiveHistoryInsert(e.to_string()))?;
    Ok(())
}

fn bind_history(record: &HistoryRecord) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO history (
            id, quote_id, source, product_name, category, sub_category,
            estimated_weight, predicted_weight, real_weight, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(record.id.as_uuid())
    .bind(record.quote_id)
    .bind(record.source.as_str())
    .bind(&record.product_name)
    .bind(&record.category)
    .bind(&record.sub_category)
    .bind(record.estimated_weight.map(Weight::value))
    .bind(record.predicted_weight.map(Weight::value))
    .bind(record.real_weight.map(Weight::value))
    .bind(record.created_at)
}

fn bind_product(product: &Product) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO products (
            id, product_name, category, sub_category, estimated_weight,
            predicted_weight, real_weight, status, notes, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(product.id.as_uuid())
    .bind(&product.product_name)
    .bind(&product.category)
    .bind(&product.sub_category)
    .bind(product.estimated_weight.map(Weight::value))
    .bind(product.predicted_weight.map(Weight::value))
    .bind(product.real_weight.map(Weight::value))
    .bind(product.status.as_str())
    .bind(&product.notes)
    .bind(product.created_at)
}

#[async_trait]
impl ProductStore for PostgresStore {
    #[instrument(skip(self, product), err)]
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let product = product.into_product(ProductId::new(), db_now());
        bind_product(&product)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(product)
    }

    #[instrument(skip(self, batch), fields(batch_size = batch.len()), err)]
    async fn insert_products(&self, batch: Vec<NewProduct>) -> StoreResult<Vec<Product>> {
        let now = db_now();
        let products: Vec<Product> = batch
            .into_iter()
            .map(|p| p.into_product(ProductId::new(), now))
            .collect();

        let mut tx = self.begin().await?;
        for product in &products {
            bind_product(product)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_products", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?
            .ok_or(StoreError::NotFound)?;
        decode::<ProductRow>(&row)?.into_domain()
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self, filter: ProductFilter) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(ProductStatus::as_str))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter()
            .map(|row| decode::<ProductRow>(row)?.into_domain())
            .collect()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn update_product_details(&self, product: &Product) -> StoreResult<Product> {
        let sql = format!(
            "UPDATE products \
             SET product_name = $3, category = $4, sub_category = $5, estimated_weight = $6, notes = $7 \
             WHERE id = $1 AND status = $2 \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(product.id.as_uuid())
            .bind(product.status.as_str())
            .bind(&product.product_name)
            .bind(&product.category)
            .bind(&product.sub_category)
            .bind(product.estimated_weight.map(Weight::value))
            .bind(&product.notes)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_product_details", e))?;

        match row {
            Some(row) => decode::<ProductRow>(&row)?.into_domain(),
            None => Err(self
                .missing_or_conflict("products", *product.id.as_uuid(), product.status.as_str())
                .await),
        }
    }

    #[instrument(skip(self), fields(product_id = %id, from = %from, to = %to), err)]
    async fn transition_product_status(
        &self,
        id: ProductId,
        from: ProductStatus,
        to: ProductStatus,
    ) -> StoreResult<Product> {
        let sql = format!(
            "UPDATE products SET status = $3 WHERE id = $1 AND status = $2 RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("transition_product_status", e))?;

        match row {
            Some(row) => decode::<ProductRow>(&row)?.into_domain(),
            None => Err(self.missing_or_conflict("products", *id.as_uuid(), from.as_str()).await),
        }
    }

    #[instrument(skip(self), fields(product_id = %id, weight = %weight), err)]
    async fn record_prediction(&self, id: ProductId, weight: Weight) -> StoreResult<Option<Product>> {
        let sql = format!(
            "UPDATE products SET predicted_weight = $2 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(weight.value())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("record_prediction", e))?;

        row.map(|r| decode::<ProductRow>(&r)?.into_domain()).transpose()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteStore for PostgresStore {
    #[instrument(skip(self, quote), err)]
    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote> {
        let quote = quote.into_quote(QuoteId::new(), db_now());
        sqlx::query(
            r#"
            INSERT INTO quotes (id, product_name, category, estimated_weight, predicted_weight, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(quote.id.as_uuid())
        .bind(&quote.product_name)
        .bind(&quote.category)
        .bind(quote.estimated_weight.value())
        .bind(quote.predicted_weight.map(Weight::value))
        .bind(quote.status.as_str())
        .bind(quote.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_quote", e))?;
        Ok(quote)
    }

    #[instrument(skip(self), fields(quote_id = %id), err)]
    async fn get_quote(&self, id: QuoteId) -> StoreResult<Quote> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_quote", e))?
            .ok_or(StoreError::NotFound)?;
        decode::<QuoteRow>(&row)?.into_domain()
    }

    #[instrument(skip(self), err)]
    async fn list_quotes(&self) -> StoreResult<Vec<Quote>> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_quotes", e))?;
        rows.iter()
            .map(|row| decode::<QuoteRow>(row)?.into_domain())
            .collect()
    }

    #[instrument(skip(self), fields(quote_id = %id), err)]
    async fn transition_quote_status(
        &self,
        id: QuoteId,
        from: QuoteStatus,
        to: QuoteStatus,
    ) -> StoreResult<Quote> {
        let sql = format!(
            "UPDATE quotes SET status = $3 WHERE id = $1 AND status = $2 RETURNING {QUOTE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("transition_quote_status", e))?;

        match row {
            Some(row) => decode::<QuoteRow>(&row)?.into_domain(),
            None => Err(self.missing_or_conflict("quotes", *id.as_uuid(), from.as_str()).await),
        }
    }
}

#[async_trait]
impl HistoryStore for PostgresStore {
    #[instrument(skip(self, record), err)]
    async fn insert_history(&self, record: NewHistoryRecord) -> StoreResult<HistoryRecord> {
        let record = record.into_record(HistoryId::new(), db_now());
        bind_history(&record)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_history", e))?;
        Ok(record)
    }

    #[instrument(skip(self), err)]
    async fn list_history(&self) -> StoreResult<Vec<HistoryRecord>> {
        let sql = format!("SELECT {HISTORY_COLUMNS} FROM history ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_history", e))?;
        rows.iter()
            .map(|row| decode::<HistoryRow>(row)?.into_domain())
            .collect()
    }

    #[instrument(skip(self), fields(history_id = %id), err)]
    async fn delete_history(&self, id: HistoryId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM history WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_history", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ArchiveStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn archive(
        &self,
        subject: ArchiveSubject,
        real_weight: Option<Weight>,
    ) -> StoreResult<ArchiveReceipt> {
        match subject {
            ArchiveSubject::Product(id) => self.archive_product(id, real_weight).await,
            ArchiveSubject::Quote(id) => self.archive_quote(id, real_weight).await,
        }
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn decode<'r, R: FromRow<'r, PgRow>>(row: &'r PgRow) -> StoreResult<R> {
    R::from_row(row).map_err(|e| StoreError::Backend(format!("failed to deserialize row: {e}")))
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("stored {column} is invalid: {detail}"))
}

fn weight_column(column: &str, value: Option<f64>) -> StoreResult<Option<Weight>> {
    value
        .map(Weight::new)
        .transpose()
        .map_err(|e| corrupt(column, e))
}

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    product_name: String,
    category: Option<String>,
    sub_category: Option<String>,
    estimated_weight: Option<f64>,
    predicted_weight: Option<f64>,
    real_weight: Option<f64>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            product_name: row.try_get("product_name")?,
            category: row.try_get("category")?,
            sub_category: row.try_get("sub_category")?,
            estimated_weight: row.try_get("estimated_weight")?,
            predicted_weight: row.try_get("predicted_weight")?,
            real_weight: row.try_get("real_weight")?,
            status: row.try_get("status")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl ProductRow {
    fn into_domain(self) -> StoreResult<Product> {
        Ok(Product {
            id: ProductId::from_uuid(self.id),
            product_name: self.product_name,
            category: self.category,
            sub_category: self.sub_category,
            estimated_weight: weight_column("estimated_weight", self.estimated_weight)?,
            predicted_weight: weight_column("predicted_weight", self.predicted_weight)?,
            real_weight: weight_column("real_weight", self.real_weight)?,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug)]
struct QuoteRow {
    id: uuid::Uuid,
    product_name: String,
    category: String,
    estimated_weight: f64,
    predicted_weight: Option<f64>,
    status: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for QuoteRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(QuoteRow {
            id: row.try_get("id")?,
            product_name: row.try_get("product_name")?,
            category: row.try_get("category")?,
            estimated_weight: row.try_get("estimated_weight")?,
            predicted_weight: row.try_get("predicted_weight")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl QuoteRow {
    fn into_domain(self) -> StoreResult<Quote> {
        Ok(Quote {
            id: QuoteId::from_uuid(self.id),
            product_name: self.product_name,
            category: self.category,
            estimated_weight: Weight::new(self.estimated_weight)
                .map_err(|e| corrupt("estimated_weight", e))?,
            predicted_weight: weight_column("predicted_weight", self.predicted_weight)?,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug)]
struct HistoryRow {
    id: uuid::Uuid,
    quote_id: uuid::Uuid,
    source: String,
    product_name: String,
    category: Option<String>,
    sub_category: Option<String>,
    estimated_weight: Option<f64>,
    predicted_weight: Option<f64>,
    real_weight: Option<f64>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for HistoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(HistoryRow {
            id: row.try_get("id")?,
            quote_id: row.try_get("quote_id")?,
            source: row.try_get("source")?,
            product_name: row.try_get("product_name")?,
            category: row.try_get("category")?,
            sub_category: row.try_get("sub_category")?,
            estimated_weight: row.try_get("estimated_weight")?,
            predicted_weight: row.try_get("predicted_weight")?,
            real_weight: row.try_get("real_weight")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl HistoryRow {
    fn into_domain(self) -> StoreResult<HistoryRecord> {
        let source = HistorySource::parse(&self.source)
            .ok_or_else(|| corrupt("source", &self.source))?;
        Ok(HistoryRecord {
            id: HistoryId::from_uuid(self.id),
            quote_id: self.quote_id,
            source,
            product_name: self.product_name,
            category: self.category,
            sub_category: self.sub_category,
            estimated_weight: weight_column("estimated_weight", self.estimated_weight)?,
            predicted_weight: weight_column("predicted_weight", self.predicted_weight)?,
            real_weight: weight_column("real_weight", self.real_weight)?,
            created_at: self.created_at,
        })
    }
}
