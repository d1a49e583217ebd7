//! Route Definitions
//!
//! Everything is served under `/api`.

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        // Steam login
        .route("/auth/steam/login", get(steam_login_handler))
        .route("/auth/steam/callback", get(steam_callback_handler))
        // Current user
        .route("/user/profile", get(profile_handler))
        .route("/user/inventory", get(inventory_handler))
        .route("/user/balance/add", post(add_balance_handler))
        .route("/user/transactions", get(transactions_handler))
        // Top-ups
        .route("/exchange-rate", get(exchange_rate_handler))
        .route("/create-crypto-payment", post(create_payment_handler))
        .route("/apply-promocode", post(apply_promo_handler))
        .route("/webhook/crypto-bot", post(crypto_bot_webhook_handler))
        .route("/test-crypto-bot", get(test_crypto_bot_handler))
        // Cases
        .route("/cases", get(cases_handler))
        .route("/cases/:case_id/open", post(open_case_handler));

    Router::new().nest("/api", api).with_state(state)
}
