//! Cart route handlers.
//!
//! Guests keep their cart in the session; logged-in users also have it saved
//! in the database. Every handler answers with the resulting cart.

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::{CurrencyCode, LineItem, Price};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::routes::products::parse_product_id;
use crate::services::cart::{CartService, StagedCart};
use crate::state::AppState;

/// One cart line as returned to clients.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub item: LineItem,
    pub line_total: Decimal,
}

/// Cart contents and totals.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total_items: u64,
    pub subtotal: Decimal,
    pub formatted_subtotal: String,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &StagedCart, currency: CurrencyCode) -> Self {
        let subtotal = cart.total_price();
        Self {
            items: cart
                .items()
                .iter()
                .map(|item| CartLineView {
                    line_total: item.line_total(),
                    item: item.clone(),
                })
                .collect(),
            total_items: cart.total_items(),
            subtotal,
            formatted_subtotal: Price::new(subtotal, currency).display(),
        }
    }
}

/// Body of `POST /cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
}

/// Body of `PATCH /cart/items/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Body of `GET /cart/count`.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u64,
}

fn cart_service<'a>(state: &'a AppState, session: &'a Session) -> CartService<'a> {
    CartService::new(state.pool(), session, state.config().cart_login_policy)
}

/// Show the cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CartView>> {
    let cart = cart_service(&state, &session)
        .load(user.map(|u| u.id))
        .await?;
    Ok(Json(CartView::new(&cart, state.config().currency)))
}

/// Total number of units in the cart.
#[instrument(skip_all)]
pub async fn count(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CartCount>> {
    let cart = cart_service(&state, &session)
        .load(user.map(|u| u.id))
        .await?;
    Ok(Json(CartCount {
        count: cart.total_items(),
    }))
}

/// Add one unit of an active product, at its current catalog price.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let id = parse_product_id(&body.product_id)?;
    let product = state
        .catalog()
        .product(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let (cart, added) = cart_service(&state, &session)
        .update(user.map(|u| u.id), |cart| cart.add_item(&product.to_cart_ref()))
        .await?;
    added?;

    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id.as_str())]));
    Ok(Json(CartView::new(&cart, state.config().currency)))
}

/// Set the quantity of a line. Zero or less removes it.
#[instrument(skip_all, fields(product_id = %id, quantity = body.quantity))]
pub async fn update_quantity(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(id): Path<String>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>> {
    let id = parse_product_id(&id)?;
    let (cart, ()) = cart_service(&state, &session)
        .update(user.map(|u| u.id), |cart| {
            cart.update_quantity(&id, body.quantity);
        })
        .await?;
    Ok(Json(CartView::new(&cart, state.config().currency)))
}

/// Remove a line.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<CartView>> {
    let id = parse_product_id(&id)?;
    let (cart, ()) = cart_service(&state, &session)
        .update(user.map(|u| u.id), |cart| cart.remove_item(&id))
        .await?;
    Ok(Json(CartView::new(&cart, state.config().currency)))
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CartView>> {
    let (cart, ()) = cart_service(&state, &session)
        .update(user.map(|u| u.id), StagedCart::clear_cart)
        .await?;
    Ok(Json(CartView::new(&cart, state.config().currency)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use shopfront_core::ProductId;

    use super::*;
    use crate::models::Product;
    use crate::routes::test_support::*;

    fn mug(inventory_count: u32) -> Product {
        Product {
            id: ProductId::parse("mug").unwrap(),
            name: "Mug".to_string(),
            description: String::new(),
            price: Decimal::new(1250, 2),
            image_url: Some("/img/mug.png".to_string()),
            category: None,
            inventory_count,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_empty_guest_cart() {
        let router = router(state());
        let response = send(&router, request("GET", "/cart", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["items"], json!([]));
        assert_eq!(body["total_items"], 0);
        assert_eq!(body["formatted_subtotal"], "$0.00");
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_id() {
        let router = router(state());
        let response = send(
            &router,
            json_request("POST", "/cart/items", &json!({"product_id": "no spaces"}), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_guest_cart_round_trip() {
        let state = state();
        state.catalog().prime(mug(3)).await;
        let router = router(state);

        let response = send(
            &router,
            json_request("POST", "/cart/items", &json!({"product_id": "mug"}), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response).unwrap();

        send(
            &router,
            json_request("POST", "/cart/items", &json!({"product_id": "mug"}), Some(&cookie)),
        )
        .await;

        let response = send(&router, request("GET", "/cart", Some(&cookie))).await;
        let body = body_json(response).await;
        assert_eq!(body["items"][0]["id"], "mug");
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["items"][0]["line_total"], "25.00");
        assert_eq!(body["subtotal"], "25.00");

        let response = send(
            &router,
            json_request("PATCH", "/cart/items/mug", &json!({"quantity": 0}), Some(&cookie)),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["total_items"], 0);
    }

    #[tokio::test]
    async fn test_count_and_clear() {
        let state = state();
        state.catalog().prime(mug(3)).await;
        let router = router(state);

        let response = send(
            &router,
            json_request("POST", "/cart/items", &json!({"product_id": "mug"}), None),
        )
        .await;
        let cookie = session_cookie(&response).unwrap();

        let response = send(&router, request("GET", "/cart/count", Some(&cookie))).await;
        assert_eq!(body_json(response).await["count"], 1);

        let response = send(&router, request("DELETE", "/cart", Some(&cookie))).await;
        assert_eq!(body_json(response).await["total_items"], 0);

        let response = send(&router, request("GET", "/cart/count", Some(&cookie))).await;
        assert_eq!(body_json(response).await["count"], 0);
    }
}
