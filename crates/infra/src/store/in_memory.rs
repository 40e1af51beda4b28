use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use scaleflow_core::{Entity, HistoryId, ProductId, QuoteId, Weight};
use scaleflow_products::{
    Archivable, ArchiveSubject, ArchivedEntity, HistoryRecord, NewHistoryRecord, NewProduct, NewQuote,
    Product, ProductStatus, Quote, QuoteStatus,
};

use super::{
    ArchiveReceipt, ArchiveStore, HistoryStore, ProductFilter, ProductStore, QuoteStore, StoreError,
    StoreResult,
};

/// One-shot failures that tests arm to exercise partial-failure paths.
#[derive(Debug, Default)]
struct Faults {
    history_insert: bool,
    archive_source_update: bool,
    /// Number of batch inserts that still succeed before the next one fails.
    product_batch: Option<usize>,
}

/// In-memory store for tests/dev.
///
/// Each table sits behind its own `RwLock`. Multi-table units (archival) take the
/// source table's lock before the history lock, always in that order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    products: RwLock<HashMap<ProductId, Product>>,
    quotes: RwLock<HashMap<QuoteId, Quote>>,
    history: RwLock<HashMap<HistoryId, HistoryRecord>>,
    faults: Mutex<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next history insert fail (archival aborts before any write).
    #[cfg(test)]
    pub fn fail_next_history_insert(&self) {
        if let Ok(mut f) = self.faults.lock() {
            f.history_insert = true;
        }
    }

    /// Make the next archival fail after its history insert (leaves an orphan record).
    #[cfg(test)]
    pub fn fail_next_archive_source_update(&self) {
        if let Ok(mut f) = self.faults.lock() {
            f.archive_source_update = true;
        }
    }

    /// Let `successful` batch inserts through, then fail the following one.
    #[cfg(test)]
    pub fn fail_product_batch_after(&self, successful: usize) {
        if let Ok(mut f) = self.faults.lock() {
            f.product_batch = Some(successful);
        }
    }

    fn take_fault(&self, pick: impl FnOnce(&mut Faults) -> bool) -> bool {
        self.faults.lock().map(|mut f| pick(&mut f)).unwrap_or(false)
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn newest_first<T>(mut items: Vec<T>) -> Vec<T>
where
    T: Entity,
    T::Id: Ord,
{
    items.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });
    items
}

/// Shared archival unit for any archivable table.
fn archive_in<T>(
    store: &InMemoryStore,
    table: &mut HashMap<T::Id, T>,
    history: &mut HashMap<HistoryId, HistoryRecord>,
    id: &T::Id,
    real_weight: Option<Weight>,
) -> StoreResult<(T, HistoryRecord)>
where
    T: Archivable,
    T::Id: Hash + Eq,
{
    let current = table.get(id).cloned().ok_or(StoreError::NotFound)?;
    current.ensure_archivable().map_err(StoreError::Rejected)?;

    if store.take_fault(|f| std::mem::take(&mut f.history_insert)) {
        return Err(StoreError::ArchiveHistoryInsert(
            "injected history insert failure".to_string(),
        ));
    }
    let record = current
        .snapshot(real_weight)
        .into_record(HistoryId::new(), Utc::now());
    history.insert(record.id, record.clone());

    if store.take_fault(|f| std::mem::take(&mut f.archive_source_update)) {
        return Err(StoreError::source_update(
            T::SOURCE,
            record.id,
            "injected source update failure",
        ));
    }
    let archived = current.archived(real_weight);
    table.insert(id.clone(), archived.clone());

    Ok((archived, record))
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let product = product.into_product(ProductId::new(), Utc::now());
        let mut products = self.products.write().map_err(poisoned)?;
        products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn insert_products(&self, batch: Vec<NewProduct>) -> StoreResult<Vec<Product>> {
        let fail = self.take_fault(|f| match f.product_batch {
            Some(0) => {
                f.product_batch = None;
                true
            }
            Some(n) => {
                f.product_batch = Some(n - 1);
                false
            }
            None => false,
        });
        if fail {
            return Err(StoreError::Backend("injected batch insert failure".to_string()));
        }

        let now = Utc::now();
        let inserted: Vec<Product> = batch
            .into_iter()
            .map(|p| p.into_product(ProductId::new(), now))
            .collect();

        let mut products = self.products.write().map_err(poisoned)?;
        for p in &inserted {
            products.insert(p.id, p.clone());
        }
        Ok(inserted)
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        let products = self.products.read().map_err(poisoned)?;
        products.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_products(&self, filter: ProductFilter) -> StoreResult<Vec<Product>> {
        let products = self.products.read().map_err(poisoned)?;
        let items = products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        Ok(newest_first(items))
    }

    async fn update_product_details(&self, product: &Product) -> StoreResult<Product> {
        let mut products = self.products.write().map_err(poisoned)?;
        let stored = products.get_mut(&product.id).ok_or(StoreError::NotFound)?;
        if stored.status != product.status {
            return Err(StoreError::Conflict(format!(
                "product {} changed status to '{}' concurrently",
                product.id, stored.status
            )));
        }
        stored.product_name = product.product_name.clone();
        stored.category = product.category.clone();
        stored.sub_category = product.sub_category.clone();
        stored.estimated_weight = product.estimated_weight;
        stored.notes = product.notes.clone();
        Ok(stored.clone())
    }

    async fn transition_product_status(
        &self,
        id: ProductId,
        from: ProductStatus,
        to: ProductStatus,
    ) -> StoreResult<Product> {
        let mut products = self.products.write().map_err(poisoned)?;
        let stored = products.get_mut(&id).ok_or(StoreError::NotFound)?;
        if stored.status != from {
            return Err(StoreError::Conflict(format!(
                "expected status '{from}', found '{}'",
                stored.status
            )));
        }
        stored.status = to;
        Ok(stored.clone())
    }

    async fn record_prediction(&self, id: ProductId, weight: Weight) -> StoreResult<Option<Product>> {
        let mut products = self.products.write().map_err(poisoned)?;
        match products.get_mut(&id) {
            Some(p) if p.accepts_prediction() => {
                p.predicted_weight = Some(weight);
                Ok(Some(p.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let mut products = self.products.write().map_err(poisoned)?;
        products.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl QuoteStore for InMemoryStore {
    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote> {
        let quote = quote.into_quote(QuoteId::new(), Utc::now());
        let mut quotes = self.quotes.write().map_err(poisoned)?;
        quotes.insert(quote.id, quote.clone());
        Ok(quote)
    }

    async fn get_quote(&self, id: QuoteId) -> StoreResult<Quote> {
        let quotes = self.quotes.read().map_err(poisoned)?;
        quotes.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_quotes(&self) -> StoreResult<Vec<Quote>> {
        let quotes = self.quotes.read().map_err(poisoned)?;
        Ok(newest_first(quotes.values().cloned().collect()))
    }

    async fn transition_quote_status(
        &self,
        id: QuoteId,
        from: QuoteStatus,
        to: QuoteStatus,
    ) -> StoreResult<Quote> {
        let mut quotes = self.quotes.write().map_err(poisoned)?;
        let stored = quotes.get_mut(&id).ok_or(StoreError::NotFound)?;
        if stored.status != from {
            return Err(StoreError::Conflict(format!(
                "expected quote status '{}', found '{}'",
                from.as_str(),
                stored.status.as_str()
            )));
        }
        stored.status = to;
        Ok(stored.clone())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn insert_history(&self, record: NewHistoryRecord) -> StoreResult<HistoryRecord> {
        let record = record.into_record(HistoryId::new(), Utc::now());
        let mut history = self.history.write().map_err(poisoned)?;
        history.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_history(&self) -> StoreResult<Vec<HistoryRecord>> {
        let history = self.history.read().map_err(poisoned)?;
        Ok(newest_first(history.values().cloned().collect()))
    }

    async fn delete_history(&self, id: HistoryId) -> StoreResult<()> {
        let mut history = self.history.write().map_err(poisoned)?;
        history.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl ArchiveStore for InMemoryStore {
    async fn archive(
        &self,
        subject: ArchiveSubject,
        real_weight: Option<Weight>,
    ) -> StoreResult<ArchiveReceipt> {
        match subject {
            ArchiveSubject::Product(id) => {
                let mut products = self.products.write().map_err(poisoned)?;
                let mut history = self.history.write().map_err(poisoned)?;
                let (product, record) = archive_in(self, &mut products, &mut history, &id, real_weight)?;
                Ok(ArchiveReceipt {
                    record,
                    entity: ArchivedEntity::Product(product),
                })
            }
            ArchiveSubject::Quote(id) => {
                let mut quotes = self.quotes.write().map_err(poisoned)?;
                let mut history = self.history.write().map_err(poisoned)?;
                let (quote, record) = archive_in(self, &mut quotes, &mut history, &id, real_weight)?;
                Ok(ArchiveReceipt {
                    record,
                    entity: ArchivedEntity::Quote(quote),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaleflow_core::DomainError;
    use scaleflow_products::{CreateProduct, CreateQuote, HistorySource};

    fn new_product(name: &str) -> NewProduct {
        NewProduct::new(CreateProduct {
            product_name: Some(name.to_string()),
            estimated_weight: Some(2.0),
            ..Default::default()
        })
        .unwrap()
    }

    fn w(v: f64) -> Weight {
        Weight::new(v).unwrap()
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filtered() {
        let store = InMemoryStore::new();
        let a = store.insert_product(new_product("a")).await.unwrap();
        let b = store.insert_product(new_product("b")).await.unwrap();
        store
            .transition_product_status(a.id, ProductStatus::Pending, ProductStatus::Accepted)
            .await
            .unwrap();

        let all = store.list_products(ProductFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let accepted = store
            .list_products(ProductFilter::status(ProductStatus::Accepted))
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, a.id);
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = InMemoryStore::new();
        let p = store.insert_product(new_product("a")).await.unwrap();
        store
            .transition_product_status(p.id, ProductStatus::Pending, ProductStatus::Canceled)
            .await
            .unwrap();

        let err = store
            .transition_product_status(p.id, ProductStatus::Pending, ProductStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.get_product(p.id).await.unwrap().status, ProductStatus::Canceled);
    }

    #[tokio::test]
    async fn prediction_is_only_written_while_pending() {
        let store = InMemoryStore::new();
        let p = store.insert_product(new_product("a")).await.unwrap();
        assert!(store.record_prediction(p.id, w(3.0)).await.unwrap().is_some());

        store
            .transition_product_status(p.id, ProductStatus::Pending, ProductStatus::Accepted)
            .await
            .unwrap();
        assert!(store.record_prediction(p.id, w(9.0)).await.unwrap().is_none());
        assert_eq!(
            store.get_product(p.id).await.unwrap().predicted_weight,
            Some(w(3.0))
        );
        assert!(store.record_prediction(ProductId::new(), w(1.0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn archive_product_inserts_snapshot_then_updates() {
        let store = InMemoryStore::new();
        let p = store.insert_product(new_product("a")).await.unwrap();

        let receipt = store
            .archive(ArchiveSubject::Product(p.id), Some(w(12.5)))
            .await
            .unwrap();
        assert_eq!(receipt.record.quote_id, *p.id.as_uuid());
        assert_eq!(receipt.record.estimated_weight, Some(w(2.0)));
        match receipt.entity {
            ArchivedEntity::Product(ap) => {
                assert_eq!(ap.status, ProductStatus::History);
                assert_eq!(ap.real_weight, Some(w(12.5)));
            }
            other => panic!("Expected archived product, got {other:?}"),
        }
        assert_eq!(store.list_history().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_history_insert_leaves_product_untouched() {
        let store = InMemoryStore::new();
        let p = store.insert_product(new_product("a")).await.unwrap();
        store.fail_next_history_insert();

        let err = store
            .archive(ArchiveSubject::Product(p.id), Some(w(1.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ArchiveHistoryInsert(_)));
        assert_eq!(store.get_product(p.id).await.unwrap(), p);
        assert!(store.list_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_source_update_leaves_orphan_history_not_ghost_product() {
        let store = InMemoryStore::new();
        let p = store.insert_product(new_product("a")).await.unwrap();
        store.fail_next_archive_source_update();

        let err = store
            .archive(ArchiveSubject::Product(p.id), Some(w(1.0)))
            .await
            .unwrap_err();
        match err {
            StoreError::ArchiveSourceUpdate { kind, .. } => assert_eq!(kind, "product"),
            other => panic!("Expected ArchiveSourceUpdate, got {other:?}"),
        }
        assert_eq!(store.get_product(p.id).await.unwrap().status, ProductStatus::Pending);
        assert_eq!(store.list_history().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn archive_quote_requires_pending() {
        let store = InMemoryStore::new();
        let q = store
            .insert_quote(
                NewQuote::new(CreateQuote {
                    product_name: Some("Pallet".into()),
                    category: Some("bulk".into()),
                    estimated_weight: Some(100.0),
                    predicted_weight: None,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let receipt = store.archive(ArchiveSubject::Quote(q.id), None).await.unwrap();
        assert_eq!(receipt.record.source, HistorySource::Quote);

        let err = store.archive(ArchiveSubject::Quote(q.id), None).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(DomainError::InvalidTransition(_))));
        assert_eq!(store.list_history().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn batch_fault_fires_after_successful_batches() {
        let store = InMemoryStore::new();
        store.fail_product_batch_after(1);

        assert!(store.insert_products(vec![new_product("a")]).await.is_ok());
        assert!(store.insert_products(vec![new_product("b")]).await.is_err());
        assert!(store.insert_products(vec![new_product("c")]).await.is_ok());
        assert_eq!(store.list_products(ProductFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deletes_report_missing_rows() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.delete_product(ProductId::new()).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete_history(HistoryId::new()).await,
            Err(StoreError::NotFound)
        ));
    }
}
