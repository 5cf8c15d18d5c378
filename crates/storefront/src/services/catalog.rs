//! Catalog reads with an in-process cache.
//!
//! Single products and the category list are cached with `moka` (5-minute
//! TTL). Listings are always read from the database since they depend on
//! arbitrary filters.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use shopfront_core::ProductId;

use crate::db::RepositoryError;
use crate::db::products::{ProductPage, ProductRepository};
use crate::models::{Category, Product, ProductFilter};

const CACHE_CAPACITY: u64 = 1000;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Cache key for catalog entries.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Categories(Arc<[Category]>),
}

/// Catalog access shared by every request.
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Self { pool, cache }
    }

    /// A page of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database read fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, RepositoryError> {
        ProductRepository::new(&self.pool).list(filter).await
    }

    /// An active product, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database read fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let product = ProductRepository::new(&self.pool).get_active(id).await?;
        if let Some(product) = &product {
            self.cache
                .insert(key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }
        Ok(product)
    }

    /// Every category, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database read fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Arc<[Category]>, RepositoryError> {
        if let Some(CacheValue::Categories(categories)) = self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Arc<[Category]> = ProductRepository::new(&self.pool)
            .categories()
            .await?
            .into();
        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    /// Drop cached entries for products whose stock changed.
    pub async fn invalidate_products<'i>(&self, ids: impl IntoIterator<Item = &'i ProductId>) {
        for id in ids {
            self.cache.invalidate(&CacheKey::Product(id.clone())).await;
        }
    }

    #[cfg(test)]
    pub(crate) async fn prime(&self, product: Product) {
        self.cache
            .insert(
                CacheKey::Product(product.id.clone()),
                CacheValue::Product(Box::new(product)),
            )
            .await;
    }
}
