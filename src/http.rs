// JSON transport over the wallet core. Transport glue only: callers are
// assumed authenticated upstream and pass the acting user id explicitly.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::coupons::{Coupons, NewCoupon};
use crate::database::DbPool;
use crate::error::WalletError;
use crate::ledger::Ledger;
use crate::models::{CurrencyKind, LedgerKind, LimitPeriod, TriggerContext};
use crate::points::{NewPointsRule, Points};
use crate::security::Security;
use crate::transfer::Donate;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/account", post(get_account))
        .route("/api/recharge", post(recharge))
        .route("/api/recharge_coins", post(recharge_coins))
        .route("/api/consume", post(consume))
        .route("/api/donate", post(donate))
        .route("/api/history", post(history))
        .route("/api/leaderboard", post(leaderboard))
        .route("/api/stats", post(stats))
        .route("/api/coupons", post(create_coupon))
        .route("/api/coupons/issue", post(issue_coupon))
        .route("/api/coupons/use", post(use_coupon))
        .route("/api/coupons/usable", post(usable_coupons))
        .route("/api/points/rules", post(create_rule))
        .route("/api/points/trigger", post(trigger_points))
        .route("/api/points/grant", post(grant_points))
        .route("/api/points/use", post(use_points))
        .route("/api/security/password", post(set_password))
        .route("/api/security/verify", post(verify_password))
        .route("/api/security/limits", post(set_limits))
        .route("/api/security/check_limit", post(check_limit))
        .route("/api/security/suspend", post(suspend))
        .route("/api/security/activate", post(activate))
        .route("/api/security/logs", post(security_logs))
        .with_state(state)
}

fn error_status(err: WalletError) -> StatusCode {
    match err {
        WalletError::InsufficientFunds
        | WalletError::InsufficientPoints
        | WalletError::SelfTransferNotAllowed
        | WalletError::CouponNotUsable
        | WalletError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        WalletError::WalletSuspended => StatusCode::FORBIDDEN,
        WalletError::MalformedRule(_) | WalletError::Database(_) => {
            error!("internal error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn default_limit() -> i64 {
    50
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_health = sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok();
    Json(serde_json::json!({
        "status": if db_health { "healthy" } else { "unhealthy" },
        "database": if db_health { "up" } else { "down" },
    }))
}

#[derive(Debug, Deserialize)]
struct AccountRequest {
    user_id: i64,
    kind: LedgerKind,
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AccountRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let account = Ledger::get_account(&state.db, req.user_id, req.kind)
        .await
        .map_err(error_status)?;
    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
struct MutationRequest {
    user_id: i64,
    kind: CurrencyKind,
    amount: i64,
    #[serde(default)]
    description: String,
}

async fn recharge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MutationRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let account = Ledger::recharge(&state.db, req.user_id, req.kind, req.amount, &req.description)
        .await
        .map_err(error_status)?;
    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
struct CoinRechargeRequest {
    user_id: i64,
    rmb_amount: i64,
    #[serde(default)]
    description: String,
}

async fn recharge_coins(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CoinRechargeRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let account =
        Ledger::recharge_coins(&state.db, req.user_id, req.rmb_amount, &req.description)
            .await
            .map_err(error_status)?;
    Ok(Json(account))
}

async fn consume(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MutationRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let account = Ledger::consume(&state.db, req.user_id, req.kind, req.amount, &req.description)
        .await
        .map_err(error_status)?;
    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
struct DonateRequest {
    from_user_id: i64,
    to_user_id: i64,
    kind: CurrencyKind,
    amount: i64,
    #[serde(default)]
    description: String,
    metadata: Option<serde_json::Value>,
}

async fn donate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DonateRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let outcome = Donate::transfer(
        &state.db,
        req.from_user_id,
        req.to_user_id,
        req.kind,
        req.amount,
        &req.description,
        req.metadata,
    )
    .await
    .map_err(error_status)?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct HistoryRequest {
    user_id: i64,
    kind: Option<LedgerKind>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

async fn history(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HistoryRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let records = Ledger::list_history(&state.db, req.user_id, req.kind, req.limit, req.offset)
        .await
        .map_err(error_status)?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
struct LeaderboardRequest {
    kind: LedgerKind,
    #[serde(default = "default_limit")]
    limit: i64,
}

async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LeaderboardRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let accounts = Ledger::leaderboard(&state.db, req.kind, req.limit)
        .await
        .map_err(error_status)?;
    Ok(Json(accounts))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AccountRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let stats = Ledger::stats(&state.db, req.user_id, req.kind)
        .await
        .map_err(error_status)?;
    Ok(Json(stats))
}

async fn create_coupon(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewCoupon>,
) -> Result<impl IntoResponse, StatusCode> {
    let coupon = Coupons::create(&state.db, req).await.map_err(error_status)?;
    Ok(Json(coupon))
}

#[derive(Debug, Deserialize)]
struct CouponGrantRequest {
    user_id: i64,
    coupon_id: i64,
}

async fn issue_coupon(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CouponGrantRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let grant = Coupons::issue(&state.db, req.user_id, req.coupon_id)
        .await
        .map_err(error_status)?;
    Ok(Json(grant))
}

#[derive(Debug, Deserialize)]
struct CouponUseRequest {
    user_id: i64,
    coupon_id: i64,
    order_amount: i64,
}

async fn use_coupon(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CouponUseRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let used = Coupons::use_coupon(&state.db, req.user_id, req.coupon_id, req.order_amount)
        .await
        .map_err(error_status)?;
    Ok(Json(used))
}

#[derive(Debug, Deserialize)]
struct UsableCouponsRequest {
    user_id: i64,
    order_amount: i64,
}

async fn usable_coupons(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UsableCouponsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let grants = Coupons::list_usable(&state.db, req.user_id, req.order_amount)
        .await
        .map_err(error_status)?;
    Ok(Json(grants))
}

async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPointsRule>,
) -> Result<impl IntoResponse, StatusCode> {
    let rule = Points::create_rule(&state.db, req).await.map_err(error_status)?;
    Ok(Json(rule))
}

#[derive(Debug, Deserialize)]
struct TriggerRequest {
    user_id: i64,
    action: String,
    #[serde(default)]
    context: TriggerContext,
}

async fn trigger_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TriggerRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let grants = Points::trigger(&state.db, req.user_id, &req.action, &req.context)
        .await
        .map_err(error_status)?;
    Ok(Json(grants))
}

#[derive(Debug, Deserialize)]
struct GrantRequest {
    user_id: i64,
    points: i64,
    action: String,
    #[serde(default)]
    context: TriggerContext,
}

async fn grant_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GrantRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let account = Points::grant(&state.db, req.user_id, req.points, &req.action, &req.context)
        .await
        .map_err(error_status)?;
    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
struct UsePointsRequest {
    user_id: i64,
    points: i64,
    #[serde(default)]
    description: String,
}

async fn use_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UsePointsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let account = Points::use_points(&state.db, req.user_id, req.points, &req.description)
        .await
        .map_err(error_status)?;
    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
struct PasswordRequest {
    user_id: i64,
    password: String,
}

async fn set_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    Security::set_payment_password(&state.db, req.user_id, &req.password)
        .await
        .map_err(error_status)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let ok = Security::verify_payment_password(&state.db, req.user_id, &req.password)
        .await
        .map_err(error_status)?;
    Ok(Json(serde_json::json!({ "verified": ok })))
}

#[derive(Debug, Deserialize)]
struct LimitsRequest {
    user_id: i64,
    single_limit: Option<i64>,
    daily_limit: Option<i64>,
    monthly_limit: Option<i64>,
}

async fn set_limits(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LimitsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let security = Security::set_limits(
        &state.db,
        req.user_id,
        req.single_limit,
        req.daily_limit,
        req.monthly_limit,
    )
    .await
    .map_err(error_status)?;
    Ok(Json(security))
}

#[derive(Debug, Deserialize)]
struct CheckLimitRequest {
    user_id: i64,
    amount: i64,
    period: LimitPeriod,
}

async fn check_limit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckLimitRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let ok = Security::check_transaction_limit(&state.db, req.user_id, req.amount, req.period)
        .await
        .map_err(error_status)?;
    Ok(Json(serde_json::json!({ "allowed": ok })))
}

#[derive(Debug, Deserialize)]
struct UserRequest {
    user_id: i64,
}

async fn suspend(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let security = Security::suspend(&state.db, req.user_id)
        .await
        .map_err(error_status)?;
    Ok(Json(security))
}

async fn activate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let security = Security::activate(&state.db, req.user_id)
        .await
        .map_err(error_status)?;
    Ok(Json(security))
}

#[derive(Debug, Deserialize)]
struct LogsRequest {
    user_id: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

async fn security_logs(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let logs = Security::logs(&state.db, req.user_id, req.limit, req.offset)
        .await
        .map_err(error_status)?;
    Ok(Json(logs))
}
