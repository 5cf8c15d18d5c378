//! Seed the catalog from a YAML file.
//!
//! Categories are upserted by slug and products by id, so a file can be
//! re-applied to update prices and stock.
//!
//! ```yaml
//! categories:
//!   - slug: kitchen
//!     name: Kitchen
//! products:
//!   - id: mug-blue
//!     name: Blue Mug
//!     description: Stoneware, 350ml
//!     price: "12.50"
//!     image_url: /img/mug-blue.png
//!     category: kitchen
//!     inventory_count: 40
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use shopfront_core::{CategoryId, ProductId};
use shopfront_storefront::db;
use shopfront_storefront::db::products::{NewProduct, ProductRepository};

/// A catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub inventory_count: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Every problem in a catalog file, empty when it can be applied.
#[must_use]
pub fn validate_catalog(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut slugs = HashSet::new();
    for category in &catalog.categories {
        let slug = category.slug.trim();
        if slug.is_empty() {
            errors.push("category with empty slug".to_string());
        } else if !slugs.insert(slug) {
            errors.push(format!("duplicate category slug '{slug}'"));
        }
        if category.name.trim().is_empty() {
            errors.push(format!("category '{slug}' has no name"));
        }
    }

    let mut ids = HashSet::new();
    for product in &catalog.products {
        let id = &product.id;
        if !ids.insert(id) {
            errors.push(format!("duplicate product id '{id}'"));
        }
        if product.name.trim().is_empty() {
            errors.push(format!("product '{id}' has no name"));
        }
        if product.price < Decimal::ZERO {
            errors.push(format!("product '{id}' has negative price {}", product.price));
        }
        if i32::try_from(product.inventory_count).is_err() {
            errors.push(format!("product '{id}' inventory is too large"));
        }
        if let Some(slug) = &product.category
            && !slugs.contains(slug.trim())
        {
            errors.push(format!("product '{id}' references unknown category '{slug}'"));
        }
    }

    errors
}

/// Seed the catalog from `file_path`.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or fails validation, or a database write fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url().ok_or("STOREFRONT_DATABASE_URL not set")?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let repo = ProductRepository::new(&pool);
    let mut category_ids: HashMap<&str, CategoryId> = HashMap::new();
    for category in &catalog.categories {
        let slug = category.slug.trim();
        let saved = repo.upsert_category(slug, category.name.trim()).await?;
        category_ids.insert(slug, saved.id);
    }

    for product in &catalog.products {
        let category_id = product
            .category
            .as_deref()
            .and_then(|slug| category_ids.get(slug.trim()).copied());

        repo.upsert_product(&NewProduct {
            id: &product.id,
            name: product.name.trim(),
            description: product.description.trim(),
            price: product.price,
            image_url: product.image_url.as_deref(),
            category_id,
            inventory_count: i32::try_from(product.inventory_count)?,
            is_active: product.active,
        })
        .await?;
    }

    info!("Seeding complete!");
    info!("  Categories: {}", catalog.categories.len());
    info!("  Products: {}", catalog.products.len());

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> CatalogFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_catalog() {
        let catalog = parse(
            r#"
categories:
  - slug: kitchen
    name: Kitchen
products:
  - id: mug-blue
    name: Blue Mug
    price: "12.50"
    category: kitchen
    inventory_count: 40
"#,
        );
        assert!(validate_catalog(&catalog).is_empty());
        assert!(catalog.products[0].active);
        assert_eq!(catalog.products[0].price, Decimal::new(1250, 2));
    }

    #[test]
    fn test_reports_every_problem() {
        let catalog = parse(
            r#"
categories:
  - slug: kitchen
    name: Kitchen
  - slug: kitchen
    name: Again
products:
  - id: mug
    name: ""
    price: "-1"
    category: garden
  - id: mug
    name: Mug
    price: "3"
"#,
        );
        let errors = validate_catalog(&catalog);
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("unknown category 'garden'")));
    }

    #[test]
    fn test_invalid_product_id_fails_to_parse() {
        let result: Result<CatalogFile, _> = serde_yaml::from_str(
            r#"
products:
  - id: "not valid"
    name: Mug
    price: "3"
"#,
        );
        assert!(result.is_err());
    }
}
