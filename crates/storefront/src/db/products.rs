//! Catalog repository.

use rust_decimal::Decimal;
use sqlx::PgPool;

use shopfront_core::{CategoryId, ProductId};

use super::RepositoryError;
use crate::models::product::ProductRow;
use crate::models::{Category, Product, ProductFilter};

const PRODUCT_COLUMNS: &str = r"
    p.id, p.name, p.description, p.price, p.image_url, p.inventory_count, p.is_active,
    c.id AS category_id, c.slug AS category_slug, c.name AS category_name
";

/// A page of products plus the unpaginated match count.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
}

/// Product as written by the catalog seeder.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub id: &'a ProductId,
    pub name: &'a str,
    pub description: &'a str,
    pub price: Decimal,
    pub image_url: Option<&'a str>,
    pub category_id: Option<CategoryId>,
    pub inventory_count: i32,
    pub is_active: bool,
}

/// Repository for catalog reads and seeding writes.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active products matching `filter`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` for an unreadable row.
    pub async fn list(&self, filter: &ProductFilter) -> Result<ProductPage, RepositoryError> {
        let category = filter.category_slug();
        let search = filter.search_term().map(|s| format!("%{}%", escape_like(s)));

        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS}, COUNT(*) OVER () AS total_count
            FROM storefront.product p
            LEFT JOIN storefront.category c ON c.id = p.category_id
            WHERE p.is_active
              AND ($1::TEXT IS NULL OR c.slug = $1)
              AND ($2::TEXT IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2)
            ORDER BY p.name, p.id
            LIMIT $3 OFFSET $4
            "
        );

        let rows = sqlx::query_as::<_, CountedProductRow>(&sql)
            .bind(category)
            .bind(search)
            .bind(i64::from(filter.per_page()))
            .bind(filter.offset())
            .fetch_all(self.pool)
            .await?;

        let total = match rows.first() {
            Some(row) => row.total_count,
            None => self.count(category, filter.search_term()).await?,
        };
        let products = rows
            .into_iter()
            .map(|row| Product::try_from(row.product))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProductPage { products, total })
    }

    /// A single active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` for an unreadable row.
    pub async fn get_active(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM storefront.product p
            LEFT JOIN storefront.category c ON c.id = p.category_id
            WHERE p.id = $1 AND p.is_active
            "
        );

        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    /// Every category, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, slug, name FROM storefront.category ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Insert a category or rename the existing one with the same slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_category(&self, slug: &str, name: &str) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            r"
            INSERT INTO storefront.category (slug, name)
            VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, slug, name
            ",
        )
        .bind(slug)
        .bind(name)
        .fetch_one(self.pool)
        .await?;

        Ok(category)
    }

    /// Insert a product or overwrite the existing one with the same id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_product(&self, product: &NewProduct<'_>) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.product
                (id, name, description, price, image_url, category_id, inventory_count, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                image_url = EXCLUDED.image_url,
                category_id = EXCLUDED.category_id,
                inventory_count = EXCLUDED.inventory_count,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            ",
        )
        .bind(product.id)
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.image_url)
        .bind(product.category_id)
        .bind(product.inventory_count)
        .bind(product.is_active)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self, category: Option<&str>, search: Option<&str>) -> Result<i64, RepositoryError> {
        let search = search.map(|s| format!("%{}%", escape_like(s)));
        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*)
            FROM storefront.product p
            LEFT JOIN storefront.category c ON c.id = p.category_id
            WHERE p.is_active
              AND ($1::TEXT IS NULL OR c.slug = $1)
              AND ($2::TEXT IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2)
            ",
        )
        .bind(category)
        .bind(search)
        .fetch_one(self.pool)
        .await?;

        Ok(total)
    }
}

#[derive(sqlx::FromRow)]
struct CountedProductRow {
    #[sqlx(flatten)]
    product: ProductRow,
    total_count: i64,
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
