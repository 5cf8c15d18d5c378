//! Order history and guest order tracking.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shopfront_core::{CurrencyCode, OrderId, OrderStatus, PhoneNumber, Price, ProductId};

use crate::db::orders::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderItem};
use crate::state::AppState;

/// One order line as returned to clients.
#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl From<OrderItem> for OrderItemView {
    fn from(item: OrderItem) -> Self {
        Self {
            line_total: item.line_total(),
            product_id: item.product_id,
            product_name: item.product_name,
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

/// An order with its lines.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub formatted_total: String,
    pub currency_code: String,
    pub full_name: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    #[must_use]
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        // Orders keep the currency they were placed in.
        let formatted_total = order
            .currency_code
            .parse::<CurrencyCode>()
            .map_or_else(
                |_| format!("{} {:.2}", order.currency_code, order.total),
                |currency| Price::new(order.total, currency).display(),
            );

        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            total: order.total,
            formatted_total,
            currency_code: order.currency_code,
            full_name: order.full_name,
            address_line1: order.address_line1,
            address_line2: order.address_line2,
            city: order.city,
            postal_code: order.postal_code,
            note: order.note,
            created_at: order.created_at,
            items: items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

/// Order summary for listings.
#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency_code: String,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            total: order.total,
            currency_code: order.currency_code,
            created_at: order.created_at,
        }
    }
}

/// Query for `GET /orders/track`.
#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub number: String,
    pub phone: String,
}

/// The current user's orders, newest first.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderSummary>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders.into_iter().map(OrderSummary::from).collect()))
}

/// One of the current user's orders.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get_for_user(OrderId::new(id), user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let items = repo.items(order.id).await?;

    Ok(Json(OrderView::new(order, items)))
}

/// Look up an order by its number and the phone number given at checkout.
#[instrument(skip_all, fields(number = %query.number))]
pub async fn track(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<OrderView>> {
    let phone =
        PhoneNumber::parse(&query.phone).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let repo = OrderRepository::new(state.pool());
    let order = repo
        .find_by_number_and_phone(&query.number, &phone)
        .await?
        .ok_or_else(|| AppError::NotFound("order".to_string()))?;
    let items = repo.items(order.id).await?;

    Ok(Json(OrderView::new(order, items)))
}
