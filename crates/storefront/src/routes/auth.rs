//! Authentication route handlers.
//!
//! Logging in swaps the guest cart for the account's saved cart (or merges
//! the two, depending on `CART_LOGIN_POLICY`). Logging in again on a session
//! that already has a user keeps that user's saved cart, or logs them out
//! first when the new login is for someone else. Logging out forgets both.

use axum::{Json, extract::State, http::StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::cart::CartView;
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::state::AppState;

/// Email and password, as submitted for both login and registration.
#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Response to a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub cart: CartView,
}

/// Create an account. Does not log in.
#[instrument(skip_all, fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<User>)> {
    let password = SecretString::from(body.password);
    let user = AuthService::new(state.pool())
        .register(&body.email, password.expose_secret())
        .await?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in and switch to the account's cart.
#[instrument(skip_all, fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    OptionalAuth(previous): OptionalAuth,
    session: Session,
    Json(body): Json<Credentials>,
) -> Result<Json<LoginResponse>> {
    let password = SecretString::from(body.password);
    let user = AuthService::new(state.pool())
        .login(&body.email, password.expose_secret())
        .await?;

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    let cart = CartService::new(state.pool(), &session, state.config().cart_login_policy)
        .login(previous.map(|current| current.id), user.id)
        .await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        cart: CartView::new(&cart, state.config().currency),
        user,
    }))
}

/// Log out, discarding the session and saved carts.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<StatusCode> {
    if let Some(user) = user {
        CartService::new(state.pool(), &session, state.config().cart_login_policy)
            .logout(user.id)
            .await?;
        info!(user_id = %user.id, "User logged out");
    } else {
        warn!("Logout without a logged-in user");
    }

    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Response, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::*;
    use crate::state::AppState;

    /// The cookie to send next: whatever `response` set, else `current`.
    fn next_cookie(response: &Response<Body>, current: &str) -> String {
        session_cookie(response).unwrap_or_else(|| current.to_string())
    }

    fn login_body(email: &str) -> serde_json::Value {
        json!({"email": email, "password": PASSWORD})
    }

    #[tokio::test]
    async fn test_me_requires_login() {
        let router = router(state());
        let response = send(&router, request("GET", "/auth/me", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Unauthorized: login required");
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let router = router(state());
        let response = send(
            &router,
            json_request(
                "POST",
                "/auth/register",
                &json!({"email": "ada@example.com", "password": "short"}),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let router = router(state());
        let response = send(
            &router,
            json_request(
                "POST",
                "/auth/register",
                &json!({"email": "not-an-email", "password": "long enough"}),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_guest_logout_is_no_content() {
        let router = router(state());
        let response = send(&router, request("POST", "/auth/logout", None)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    // =========================================================================
    // Login and logout against Postgres
    // =========================================================================

    #[tokio::test]
    async fn test_login_and_logout_cycle_session() {
        let Some(pool) = database_pool().await else {
            return;
        };
        let user = create_user(&pool).await;
        let product = create_product(&pool, 9).await;
        let router = router(AppState::new(config(), pool));

        let response = send(
            &router,
            json_request(
                "POST",
                "/cart/items",
                &json!({"product_id": product.as_str()}),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let guest_cookie = session_cookie(&response).unwrap();

        let response = send(
            &router,
            json_request(
                "POST",
                "/auth/login",
                &login_body(user.email.as_str()),
                Some(&guest_cookie),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let user_cookie = next_cookie(&response, &guest_cookie);
        assert_ne!(user_cookie, guest_cookie);
        let body = body_json(response).await;
        assert_eq!(body["cart"]["items"][0]["id"], product.as_str());

        let response = send(&router, request("POST", "/auth/logout", Some(&user_cookie))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let after_cookie = next_cookie(&response, &user_cookie);
        assert_ne!(after_cookie, user_cookie);

        let response = send(&router, request("GET", "/auth/me", Some(&after_cookie))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = send(&router, request("GET", "/cart", Some(&after_cookie))).await;
        assert_eq!(body_json(response).await["total_items"], 0);
    }

    #[tokio::test]
    async fn test_second_login_keeps_saved_cart() {
        let Some(pool) = database_pool().await else {
            return;
        };
        let user = create_user(&pool).await;
        let first = create_product(&pool, 4).await;
        let second = create_product(&pool, 6).await;
        let router = router(AppState::new(config(), pool));

        let response = send(
            &router,
            json_request("POST", "/cart/items", &json!({"product_id": first.as_str()}), None),
        )
        .await;
        let cookie = session_cookie(&response).unwrap();

        let response = send(
            &router,
            json_request("POST", "/auth/login", &login_body(user.email.as_str()), Some(&cookie)),
        )
        .await;
        let cookie = next_cookie(&response, &cookie);

        let response = send(
            &router,
            json_request(
                "POST",
                "/cart/items",
                &json!({"product_id": second.as_str()}),
                Some(&cookie),
            ),
        )
        .await;
        assert_eq!(body_json(response).await["total_items"], 2);

        let response = send(
            &router,
            json_request("POST", "/auth/login", &login_body(user.email.as_str()), Some(&cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["cart"]["total_items"], 2);
        assert_eq!(body["cart"]["items"][1]["id"], second.as_str());
    }
}
