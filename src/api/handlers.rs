//! Request Handlers

use super::{
    errors::ApiError,
    middleware::{CurrentUser, RequestId},
    models::*,
};
use crate::{
    catalog::Catalog,
    common::{
        traits::{IdentityProvider, InvoiceProvider, RateSource},
        types::User,
    },
    config::AppConfig,
    errors::{CaseboxError, CaseboxResult},
    games::CaseOpener,
    identity::{SteamAuth, SteamClient, TokenService},
    ledger::Ledger,
    payments::{CryptoPayClient, ExchangeRateClient, ExchangeRateService, PaymentGateway, WebhookOutcome},
    storage::OptimizedStorage,
    store::{inventory, DEFAULT_LIST_LIMIT},
};
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    Extension, Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Third-party services the handlers talk to
pub struct Providers {
    pub identity: Arc<dyn IdentityProvider>,
    pub invoices: Arc<dyn InvoiceProvider>,
    pub rates: Arc<dyn RateSource>,
}

impl Providers {
    /// HTTPS clients for Steam, Crypto Pay and the rate service
    pub fn from_config(config: &AppConfig) -> CaseboxResult<Self> {
        Ok(Self {
            identity: Arc::new(SteamClient::new(&config.steam)?),
            invoices: Arc::new(CryptoPayClient::new(&config.payments)?),
            rates: Arc::new(ExchangeRateClient::new(&config.rates)?),
        })
    }
}

/// Shared application state
pub struct AppState {
    pub frontend_url: String,
    pub storage: OptimizedStorage,
    pub catalog: Arc<Catalog>,
    pub ledger: Ledger,
    pub steam: SteamAuth,
    pub tokens: TokenService,
    pub rates: ExchangeRateService,
    pub payments: PaymentGateway,
    pub opener: CaseOpener,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        storage: OptimizedStorage,
        catalog: Catalog,
        providers: Providers,
    ) -> CaseboxResult<Self> {
        let catalog = Arc::new(catalog);
        let ledger = Ledger::new(storage.clone());

        Ok(Self {
            frontend_url: config.server.frontend_url.trim_end_matches('/').to_string(),
            steam: SteamAuth::new(&config.steam, providers.identity)?,
            tokens: TokenService::new(&config.auth)?,
            rates: ExchangeRateService::new(providers.rates, storage.clone(), &config.rates),
            payments: PaymentGateway::new(
                providers.invoices,
                ledger.clone(),
                storage.clone(),
                config.payments.success_redirect_url.clone(),
            ),
            opener: CaseOpener::new(catalog.clone(), ledger.clone(), storage.clone()),
            catalog,
            ledger,
            storage,
        })
    }
}

/// GET /api/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/auth/steam/login
pub async fn steam_login_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<LoginUrlResponse>, ApiError> {
    let login_url = state
        .steam
        .login_url()
        .map_err(|e| ApiError::from_domain(request_id.0, e))?;
    Ok(Json(LoginUrlResponse { login_url }))
}

/// GET /api/auth/steam/callback
///
/// Always answers with a redirect to the front end, carrying either the
/// session token or an error flag.
pub async fn steam_callback_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Redirect {
    match complete_login(&state, &params).await {
        Ok(token) => Redirect::to(&format!("{}/?token={}", state.frontend_url, token)),
        Err(e) => {
            warn!(error = %e, "Steam login failed");
            Redirect::to(&format!("{}/?error=auth_failed", state.frontend_url))
        }
    }
}

async fn complete_login(state: &AppState, params: &[(String, String)]) -> CaseboxResult<String> {
    let steam_id = state
        .steam
        .verify_callback(params)
        .await?
        .ok_or_else(|| CaseboxError::Unauthorized("OpenID assertion was not confirmed".to_string()))?;

    let profile = state.steam.fetch_profile(&steam_id).await;
    let user = state.ledger.create_or_update_user(&profile)?;
    state.tokens.issue(&user.steam_id, &user.username)
}

/// GET /api/user/profile
pub async fn profile_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<User>, ApiError> {
    state
        .ledger
        .get_user(&claims.steam_id)
        .map(Json)
        .map_err(|e| ApiError::from_domain(request_id.0, e))
}

/// GET /api/user/inventory
pub async fn inventory_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<InventoryResponse>, ApiError> {
    let items = inventory::load_inventory(&state.storage, &claims.steam_id, DEFAULT_LIST_LIMIT)
        .map_err(|e| ApiError::from_domain(request_id.0, e))?;
    Ok(Json(InventoryResponse { items }))
}

/// POST /api/user/balance/add
pub async fn add_balance_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
    Json(request): Json<AddBalanceRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let new_balance = state
        .ledger
        .credit(&claims.steam_id, request.amount)
        .map_err(|e| ApiError::from_domain(request_id.0, e))?;

    info!(steam_id = %claims.steam_id, amount = request.amount, new_balance, "Balance credited");
    Ok(Json(BalanceResponse {
        success: true,
        new_balance,
    }))
}

/// GET /api/user/transactions
pub async fn transactions_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let transactions = state
        .ledger
        .list_transactions(&claims.steam_id)
        .map_err(|e| ApiError::from_domain(request_id.0, e))?;
    Ok(Json(TransactionsResponse { transactions }))
}

/// GET /api/exchange-rate
pub async fn exchange_rate_handler(State(state): State<Arc<AppState>>) -> Json<ExchangeRateResponse> {
    let rate = state.rates.current().await;
    Json(ExchangeRateResponse {
        usd_to_rub: rate.rate,
        updated_at: rate.updated_at,
        source: rate.source,
    })
}

/// POST /api/create-crypto-payment
pub async fn create_payment_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, ApiError> {
    let rate = state.rates.current().await;
    let (tx, invoice) = state
        .payments
        .create_invoice(&claims.steam_id, request.amount_usd, &request.crypto_currency, &rate)
        .await
        .map_err(|e| ApiError::from_domain(request_id.0, e))?;

    Ok(Json(CreatePaymentResponse {
        transaction_id: tx.id,
        invoice_id: invoice.invoice_id,
        pay_url: invoice.pay_url,
        amount_usd: tx.amount_usd,
        amount_rub: tx.amount_rub,
        crypto_amount: invoice.amount,
        crypto_currency: tx.crypto_currency,
        exchange_rate: tx.exchange_rate,
    }))
}

/// POST /api/apply-promocode
pub async fn apply_promo_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
    Json(request): Json<PromoCodeRequest>,
) -> Result<Json<PromoCodeResponse>, ApiError> {
    let redemption = state
        .payments
        .apply_promo_code(&claims.steam_id, &request.promo_code, request.amount_rub)
        .map_err(|e| ApiError::from_domain(request_id.0, e))?;

    Ok(Json(PromoCodeResponse {
        success: true,
        message: "Promocode applied successfully".to_string(),
        new_balance: redemption.new_balance,
        added_amount: redemption.transaction.amount_rub,
        added_amount_kopecks: redemption.added_amount,
    }))
}

/// POST /api/webhook/crypto-bot
///
/// Unknown invoices answer 404 so the provider delivers again later.
pub async fn crypto_bot_webhook_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<WebhookAck>, ApiError> {
    let outcome = state
        .payments
        .ingest_webhook(&body)
        .map_err(|e| ApiError::from_domain(request_id.0, e))?;

    Ok(Json(WebhookAck {
        status: "ok".to_string(),
        duplicate: outcome == WebhookOutcome::Duplicate,
    }))
}

/// GET /api/test-crypto-bot
pub async fn test_crypto_bot_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    state
        .payments
        .check_provider()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_domain(request_id.0, e))
}

/// GET /api/cases
pub async fn cases_handler(State(state): State<Arc<AppState>>) -> Json<CasesResponse> {
    Json(CasesResponse {
        cases: state.catalog.cases().iter().map(CaseSummary::from).collect(),
    })
}

/// POST /api/cases/:case_id/open
pub async fn open_case_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
    Path(case_id): Path<String>,
) -> Result<Json<OpenCaseResponse>, ApiError> {
    let outcome = state
        .opener
        .open(&claims.steam_id, &case_id, &mut rand::thread_rng())
        .map_err(|e| ApiError::from_domain(request_id.0, e))?;

    Ok(Json(OpenCaseResponse {
        success: true,
        case_id: outcome.case_id,
        item: outcome.item,
        inventory_item_id: outcome.inventory_item_id,
        remaining_balance: outcome.remaining_balance,
    }))
}
