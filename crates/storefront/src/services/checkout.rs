//! Checkout: turn cart lines into an order and take the stock, atomically.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use shopfront_core::{CurrencyCode, LineItem, ProductId, UserId};

use crate::db::RepositoryError;
use crate::db::orders::{self, NewOrder};
use crate::models::{DeliveryDetails, Order, OrderItem};

/// Prefix of every order number.
pub const ORDER_NUMBER_PREFIX: &str = "SF-";

/// Largest quantity accepted for a single line.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("order has no items")]
    EmptyOrder,

    #[error("quantity for {product_id} must be between 1 and {max}", max = MAX_LINE_QUANTITY)]
    InvalidQuantity { product_id: ProductId },

    #[error("product {0} is not available")]
    ProductNotFound(ProductId),

    #[error("only {available} of {product_id} in stock ({requested} requested)")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One requested line, as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl From<&LineItem> for CheckoutLine {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.id.clone(),
            quantity: i64::from(item.quantity),
        }
    }
}

/// An order as committed, with its lines.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Validate lines and merge repeated products, ordered by product id.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyOrder` for no lines and
/// `CheckoutError::InvalidQuantity` for a quantity outside
/// `1..=MAX_LINE_QUANTITY` (before or after merging).
pub fn normalize_lines(lines: &[CheckoutLine]) -> Result<Vec<(ProductId, u32)>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let mut merged: BTreeMap<&ProductId, u32> = BTreeMap::new();
    for line in lines {
        let invalid = || CheckoutError::InvalidQuantity {
            product_id: line.product_id.clone(),
        };
        let quantity = u32::try_from(line.quantity)
            .ok()
            .filter(|q| (1..=MAX_LINE_QUANTITY).contains(q))
            .ok_or_else(invalid)?;

        let total = merged.entry(&line.product_id).or_insert(0);
        *total += quantity;
        if *total > MAX_LINE_QUANTITY {
            return Err(invalid());
        }
    }

    Ok(merged
        .into_iter()
        .map(|(id, quantity)| (id.clone(), quantity))
        .collect())
}

/// A fresh order number: `SF-` followed by 10 uppercase hex digits.
#[must_use]
pub fn generate_order_number() -> String {
    let hex: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(10)
        .collect();
    format!("{ORDER_NUMBER_PREFIX}{}", hex.to_ascii_uppercase())
}

/// Place an order for `lines` in a single transaction.
///
/// Product rows are locked in id order, stock is checked and decremented, and
/// the order and its lines are inserted. Nothing is written unless every step
/// succeeds.
///
/// # Errors
///
/// Returns `CheckoutError` for invalid lines, unavailable products,
/// insufficient stock or database failures.
#[instrument(skip(pool, lines, delivery), fields(lines = lines.len()))]
pub async fn place_order(
    pool: &PgPool,
    user_id: Option<UserId>,
    lines: &[CheckoutLine],
    delivery: &DeliveryDetails,
    currency: CurrencyCode,
) -> Result<PlacedOrder, CheckoutError> {
    let lines = normalize_lines(lines)?;
    let ids: Vec<ProductId> = lines.iter().map(|(id, _)| id.clone()).collect();

    let mut tx = pool.begin().await?;

    let locked = orders::lock_products(&mut tx, &ids).await?;
    let mut items = Vec::with_capacity(lines.len());
    for (product_id, requested) in &lines {
        let product = locked
            .iter()
            .find(|p| &p.id == product_id && p.is_active)
            .ok_or_else(|| CheckoutError::ProductNotFound(product_id.clone()))?;

        let available = u32::try_from(product.inventory_count).unwrap_or(0);
        if available < *requested {
            return Err(CheckoutError::InsufficientStock {
                product_id: product_id.clone(),
                requested: *requested,
                available,
            });
        }

        items.push(OrderItem {
            product_id: product_id.clone(),
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity: i32::try_from(*requested).unwrap_or(i32::MAX),
        });
    }

    let total = items
        .iter()
        .fold(Decimal::ZERO, |sum, item| sum + item.line_total());
    let order_number = generate_order_number();

    let order = orders::insert_order(
        &mut tx,
        &NewOrder {
            order_number: &order_number,
            user_id,
            total,
            currency_code: currency.code(),
            delivery,
        },
    )
    .await?;

    for item in &items {
        orders::insert_item(&mut tx, order.id, item).await?;
        orders::decrement_stock(&mut tx, &item.product_id, item.quantity).await?;
    }

    tx.commit().await?;

    info!(order_number = %order.order_number, total = %order.total, "order placed");
    Ok(PlacedOrder { order, items })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: &str, quantity: i64) -> CheckoutLine {
        CheckoutLine {
            product_id: ProductId::parse(id).unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_normalize_merges_and_sorts() {
        let lines = normalize_lines(&[line("b", 1), line("a", 2), line("b", 3)]).unwrap();
        let lines: Vec<_> = lines.iter().map(|(id, q)| (id.as_str(), *q)).collect();
        assert_eq!(lines, [("a", 2), ("b", 4)]);
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(normalize_lines(&[]), Err(CheckoutError::EmptyOrder)));
    }

    #[test]
    fn test_normalize_rejects_non_positive() {
        assert!(matches!(
            normalize_lines(&[line("a", 0)]),
            Err(CheckoutError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            normalize_lines(&[line("a", -4)]),
            Err(CheckoutError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_normalize_rejects_merged_overflow() {
        let half = i64::from(MAX_LINE_QUANTITY / 2 + 1);
        assert!(matches!(
            normalize_lines(&[line("a", half), line("a", half)]),
            Err(CheckoutError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number();
        assert_eq!(number.len(), ORDER_NUMBER_PREFIX.len() + 10);
        assert!(number.starts_with(ORDER_NUMBER_PREFIX));
        assert!(
            number[ORDER_NUMBER_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
        assert_ne!(number, generate_order_number());
    }
}
