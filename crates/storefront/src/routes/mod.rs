//! HTTP route handlers for storefront.
//!
//! All endpoints speak JSON.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness check
//! GET    /health/ready            - Readiness check (database)
//!
//! # Catalog
//! GET    /products                - Product listing (?category=&search=&page=&per_page=)
//! GET    /products/{id}           - Product detail
//! GET    /categories              - Category listing
//!
//! # Cart
//! GET    /cart                    - Cart contents and totals
//! GET    /cart/count              - Total item count
//! POST   /cart/items              - Add one unit of a product
//! PATCH  /cart/items/{id}         - Set quantity (<= 0 removes)
//! DELETE /cart/items/{id}         - Remove a line
//! DELETE /cart                    - Empty the cart
//!
//! # Checkout
//! POST   /checkout                - Place an order
//!
//! # Auth (rate limited)
//! POST   /auth/register           - Create an account
//! POST   /auth/login              - Log in
//! POST   /auth/logout             - Log out
//! GET    /auth/me                 - Current user
//!
//! # Orders
//! GET    /orders                  - Current user's orders
//! GET    /orders/{id}             - One of the current user's orders
//! GET    /orders/track            - Guest lookup by order number and phone
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{auth_rate_limiter, request_id_middleware, session_layer};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    match auth_rate_limiter() {
        Some(limiter) => router.layer(limiter),
        None => {
            tracing::error!("auth rate limiter misconfigured, serving auth routes unlimited");
            router
        }
    }
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add))
        .route(
            "/items/{id}",
            patch(cart::update_quantity).delete(cart::remove),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/track", get(orders::track))
        .route("/{id}", get(orders::show))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/products", product_routes())
        .route("/categories", get(products::categories))
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::checkout))
        .nest("/auth", auth_routes())
        .nest("/orders", order_routes())
}

/// The complete application: routes, request ids, sessions over `store` and
/// request tracing.
pub fn app<S>(state: AppState, store: S) -> Router
where
    S: SessionStore + Clone,
{
    let sessions = session_layer(store, state.config().is_secure());

    routes()
        .layer(sessions)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, Response, header};
    use secrecy::SecretString;
    use serde_json::Value;
    use rust_decimal::Decimal;
    use sqlx::PgPool;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;
    use uuid::Uuid;

    use shopfront_core::{CurrencyCode, LoginPolicy, ProductId};

    use crate::config::StorefrontConfig;
    use crate::db::products::{NewProduct, ProductRepository};
    use crate::models::User;
    use crate::services::auth::AuthService;
    use crate::state::AppState;

    /// Password given to every user made by [`create_user`].
    pub const PASSWORD: &str = "correct horse battery";

    pub fn config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/shopfront_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            currency: CurrencyCode::USD,
            cart_login_policy: LoginPolicy::Overwrite,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// State over a pool that never connects unless a query runs.
    pub fn state() -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/shopfront_test")
            .unwrap();
        AppState::new(config(), pool)
    }

    /// Migrated pool on `TEST_DATABASE_URL`.
    ///
    /// `None` when the variable is unset; tests that need Postgres return
    /// early in that case.
    pub async fn database_pool() -> Option<PgPool> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            tracing::warn!("TEST_DATABASE_URL not set, skipping database test");
            return None;
        };
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Some(pool)
    }

    /// Register a user with a fresh email address and [`PASSWORD`].
    pub async fn create_user(pool: &PgPool) -> User {
        let email = format!("cart-{}@example.com", Uuid::new_v4().simple());
        AuthService::new(pool).register(&email, PASSWORD).await.unwrap()
    }

    /// Insert an active, stocked product with a fresh id.
    pub async fn create_product(pool: &PgPool, price: i64) -> ProductId {
        let id = ProductId::parse(&format!("item-{}", Uuid::new_v4().simple())).unwrap();
        ProductRepository::new(pool)
            .upsert_product(&NewProduct {
                id: &id,
                name: "Test item",
                description: "",
                price: Decimal::new(price, 0),
                image_url: None,
                category_id: None,
                inventory_count: 100,
                is_active: true,
            })
            .await
            .unwrap();
        id
    }

    pub fn router(state: AppState) -> axum::Router {
        super::app(state, MemoryStore::default())
    }

    pub fn json_request(method: &str, uri: &str, body: &Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.9");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.9");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    /// `name=value` of the session cookie set by a response, if any.
    pub fn session_cookie(response: &Response<Body>) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(crate::middleware::session::SESSION_COOKIE_NAME))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn send(router: &axum::Router, request: Request<Body>) -> Response<Body> {
        router.clone().oneshot(request).await.unwrap()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::test_support::*;

    #[tokio::test]
    async fn test_health() {
        let router = router(state());
        let response = send(&router, request("GET", "/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let router = router(state());
        let response = send(&router, request("GET", "/nope", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
