//! Checkout route handler.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use shopfront_core::UserId;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::DeliveryForm;
use crate::routes::orders::OrderView;
use crate::services::cart::{CartService, StagedCart};
use crate::services::checkout::{CheckoutLine, place_order};
use crate::state::AppState;

/// Body of `POST /checkout`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Lines to order. The current cart is used when omitted.
    #[serde(default)]
    pub items: Option<Vec<CheckoutLine>>,
    pub delivery: DeliveryForm,
}

/// Place an order and empty the cart.
#[instrument(skip_all)]
pub async fn checkout(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let delivery = body.delivery.validate()?;
    let owner = user.map(|u| u.id);
    let carts = CartService::new(state.pool(), &session, state.config().cart_login_policy);

    let lines = match body.items {
        Some(lines) => lines,
        None => carts
            .load(owner)
            .await?
            .items()
            .iter()
            .map(CheckoutLine::from)
            .collect(),
    };

    let placed = place_order(
        state.pool(),
        owner,
        &lines,
        &delivery,
        state.config().currency,
    )
    .await?;

    let cart_cleared = clear_cart_after_order(&carts, owner, &placed.order.order_number).await;
    let product_ids: Vec<_> = placed.items.iter().map(|item| &item.product_id).collect();
    state.catalog().invalidate_products(product_ids).await;

    info!(
        order_number = %placed.order.order_number,
        total = %placed.order.total,
        cart_cleared,
        "Order placed"
    );
    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", placed.order.order_number.as_str())]),
    );

    Ok((
        StatusCode::CREATED,
        Json(OrderView::new(placed.order, placed.items)),
    ))
}

/// Empty the cart once its order is committed.
///
/// The order stands either way, so a failure is reported and swallowed.
async fn clear_cart_after_order(
    carts: &CartService<'_>,
    owner: Option<UserId>,
    order_number: &str,
) -> bool {
    match carts.update(owner, StagedCart::clear_cart).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, order_number, "Order placed but cart could not be cleared");
            sentry::capture_error(&e);
            false
        }
    }
}
