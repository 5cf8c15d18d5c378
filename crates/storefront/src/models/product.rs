//! Catalog domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{CategoryId, ProductId, ProductRef};

use crate::db::RepositoryError;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    /// URL-safe identifier used in `?category=` filters.
    pub slug: String,
    pub name: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub category: Option<Category>,
    pub inventory_count: u32,
    pub is_active: bool,
}

impl Product {
    /// Whether at least one unit can be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.is_active && self.inventory_count > 0
    }

    /// The reference handed to the cart, carrying the current catalog price.
    #[must_use]
    pub fn to_cart_ref(&self) -> ProductRef {
        let mut product = ProductRef::new(self.id.clone(), self.name.clone(), self.price);
        if let Some(image) = &self.image_url {
            product = product.with_image(image.clone());
        }
        if let Some(category) = &self.category {
            product = product.with_category(category.name.clone());
        }
        product
    }
}

/// Product joined with its category, as selected by the repository.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub inventory_count: i32,
    pub is_active: bool,
    pub category_id: Option<CategoryId>,
    pub category_slug: Option<String>,
    pub category_name: Option<String>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let inventory_count = u32::try_from(row.inventory_count).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "product {} has negative inventory {}",
                row.id, row.inventory_count
            ))
        })?;

        let category = match (row.category_id, row.category_slug, row.category_name) {
            (Some(id), Some(slug), Some(name)) => Some(Category { id, slug, name }),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            image_url: row.image_url,
            category,
            inventory_count,
            is_active: row.is_active,
        })
    }
}

/// Listing filter for `GET /products`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Case-insensitive substring of the name or description.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductFilter {
    pub const DEFAULT_PER_PAGE: u32 = 20;
    pub const MAX_PER_PAGE: u32 = 100;

    /// Page number, at least 1.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE)
    }

    /// Row offset for the current page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.per_page())
    }

    /// Trimmed search term, if any.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Trimmed category slug, if any.
    #[must_use]
    pub fn category_slug(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}
