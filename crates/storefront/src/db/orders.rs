//! Order repository.
//!
//! Functions taking a `PgConnection` are meant to run inside the checkout
//! transaction; the `OrderRepository` methods read committed orders.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use shopfront_core::{OrderId, PhoneNumber, ProductId, UserId};

use super::RepositoryError;
use crate::models::{DeliveryDetails, Order, OrderItem};

const ORDER_COLUMNS: &str = r"
    id, order_number, user_id, status, total, currency_code, full_name, phone,
    address_line1, address_line2, city, postal_code, note, created_at
";

/// A product row locked for the duration of a checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub inventory_count: i32,
    pub is_active: bool,
}

/// Order header as inserted by checkout.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub user_id: Option<UserId>,
    pub total: Decimal,
    pub currency_code: &'a str,
    pub delivery: &'a DeliveryDetails,
}

/// Lock `ids` with `SELECT ... FOR UPDATE`, always in id order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<LockedProduct>, RepositoryError> {
    let ids: Vec<&str> = ids.iter().map(ProductId::as_str).collect();
    let rows = sqlx::query_as::<_, LockedProduct>(
        r"
        SELECT id, name, price, inventory_count, is_active
        FROM storefront.product
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Insert the order header.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` on an order number collision,
/// `RepositoryError::Database` otherwise.
pub async fn insert_order(
    conn: &mut PgConnection,
    order: &NewOrder<'_>,
) -> Result<Order, RepositoryError> {
    let sql = format!(
        r"
        INSERT INTO storefront.order
            (order_number, user_id, total, currency_code, full_name, phone,
             address_line1, address_line2, city, postal_code, note)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {ORDER_COLUMNS}
        "
    );

    let delivery = order.delivery;
    sqlx::query_as::<_, Order>(&sql)
        .bind(order.order_number)
        .bind(order.user_id)
        .bind(order.total)
        .bind(order.currency_code)
        .bind(&delivery.full_name)
        .bind(delivery.phone.as_str())
        .bind(&delivery.address_line1)
        .bind(delivery.address_line2.as_deref())
        .bind(&delivery.city)
        .bind(&delivery.postal_code)
        .bind(delivery.note.as_deref())
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "order number already exists"))
}

/// Insert one order line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: &OrderItem,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO storefront.order_item (order_id, product_id, product_name, unit_price, quantity)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(order_id)
    .bind(&item.product_id)
    .bind(&item.product_name)
    .bind(item.unit_price)
    .bind(item.quantity)
    .execute(conn)
    .await?;

    Ok(())
}

/// Take `quantity` units out of stock.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the row no longer has enough stock,
/// `RepositoryError::Database` if the query fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    id: &ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.product
        SET inventory_count = inventory_count - $2, updated_at = NOW()
        WHERE id = $1 AND inventory_count >= $2
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "insufficient stock for {id}"
        )));
    }
    Ok(())
}

/// Repository for reading placed orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM storefront.order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(orders)
    }

    /// One of a user's orders. Other users' orders are not returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM storefront.order
            WHERE id = $1 AND user_id = $2
            "
        );

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(order)
    }

    /// Guest lookup by order number and the phone given at checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_number_and_phone(
        &self,
        order_number: &str,
        phone: &PhoneNumber,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM storefront.order
            WHERE order_number = $1 AND phone = $2
            "
        );

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_number.trim().to_ascii_uppercase())
            .bind(phone.as_str())
            .fetch_optional(self.pool)
            .await?;

        Ok(order)
    }

    /// Lines of an order in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT product_id, product_name, unit_price, quantity
            FROM storefront.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }
}
