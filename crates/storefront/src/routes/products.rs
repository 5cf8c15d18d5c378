//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use shopfront_core::{CurrencyCode, Price, ProductId};

use crate::error::{AppError, Result};
use crate::models::{Category, Product, ProductFilter};
use crate::state::AppState;

/// Product as returned to clients.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub formatted_price: String,
    pub image_url: Option<String>,
    pub category: Option<Category>,
    pub inventory_count: u32,
    pub in_stock: bool,
}

impl ProductView {
    #[must_use]
    pub fn new(product: Product, currency: CurrencyCode) -> Self {
        let in_stock = product.in_stock();
        Self {
            formatted_price: Price::new(product.price, currency).display(),
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            image_url: product.image_url,
            category: product.category,
            inventory_count: product.inventory_count,
            in_stock,
        }
    }
}

/// A page of products.
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductView>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

/// Parse a product id from a path segment.
pub(crate) fn parse_product_id(raw: &str) -> Result<ProductId> {
    ProductId::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// List active products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ProductListResponse>> {
    let page = state.catalog().list_products(&filter).await?;
    let per_page = filter.per_page();
    let currency = state.config().currency;

    Ok(Json(ProductListResponse {
        products: page
            .products
            .into_iter()
            .map(|p| ProductView::new(p, currency))
            .collect(),
        page: filter.page(),
        per_page,
        total: page.total,
        total_pages: (page.total + i64::from(per_page) - 1) / i64::from(per_page),
    }))
}

/// Show a single active product.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ProductView>> {
    let id = parse_product_id(&id)?;
    let product = state
        .catalog()
        .product(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(Json(ProductView::new(product, state.config().currency)))
}

/// List every category.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = state.catalog().categories().await?;
    Ok(Json(categories.to_vec()))
}
