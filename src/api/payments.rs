//! Subscription plan endpoints
//!
//! Checkout happens in Stripe; this service only knows which price buys
//! which plan and how many AI requests each plan carries.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::{StripeConfig, SubscriptionConfig},
    db::{AllowedEmailRepository, UserRepository},
    middleware::AuthUser,
    models::{Plan, QuotaUsage},
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/subscription", get(get_subscription))
        .route("/users/{id}/plan", put(change_plan))
}

/// A purchasable plan
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanInfo {
    pub plan: Plan,
    /// -1 means unlimited
    pub ai_requests_limit: i64,
    /// Stripe prices that buy this plan
    pub price_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlansResponse {
    success: bool,
    plans: Vec<PlanInfo>,
    checkout_enabled: bool,
}

#[derive(Debug, Serialize)]
struct SubscriptionResponse {
    success: bool,
    subscription: QuotaUsage,
}

/// Admin plan change, by plan name or by the Stripe price that was paid
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePlanRequest {
    plan: Option<Plan>,
    price_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePlanResponse {
    success: bool,
    user_id: Uuid,
    plan: Plan,
    ai_requests_limit: i64,
}

fn plan_catalog(subscriptions: &SubscriptionConfig, stripe: Option<&StripeConfig>) -> Vec<PlanInfo> {
    Plan::ALL
        .iter()
        .map(|&plan| {
            let price_ids = stripe
                .map(|s| match plan {
                    Plan::Free => Vec::new(),
                    Plan::Basic => s.basic_price_id.iter().cloned().collect(),
                    Plan::Premium => s
                        .premium_price_id
                        .iter()
                        .chain(s.annual_price_id.iter())
                        .cloned()
                        .collect(),
                })
                .unwrap_or_default();
            PlanInfo {
                plan,
                ai_requests_limit: subscriptions.limit_for(plan),
                price_ids,
            }
        })
        .collect()
}

async fn list_plans(State(state): State<AppState>) -> Json<PlansResponse> {
    let stripe = state.config.stripe.as_ref();
    Json(PlansResponse {
        success: true,
        plans: plan_catalog(&state.config.subscriptions, stripe),
        checkout_enabled: stripe.is_some_and(|s| s.secret_key.is_some()),
    })
}

async fn get_subscription(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<SubscriptionResponse>> {
    let subscription = super::llm::load_usage(&state, &auth_user).await?;
    Ok(Json(SubscriptionResponse {
        success: true,
        subscription,
    }))
}

async fn change_plan(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<ChangePlanRequest>,
) -> AppResult<Json<ChangePlanResponse>> {
    auth_user
        .require_active_admin(&AllowedEmailRepository::new(&state.db))
        .await?;

    let plan = match (payload.plan, payload.price_id.as_deref()) {
        (Some(plan), None) => plan,
        (None, Some(price_id)) => state
            .config
            .stripe
            .as_ref()
            .and_then(|s| s.plan_for_price(price_id))
            .ok_or_else(|| AppError::bad_request(format!("Unknown price: {}", price_id)))?,
        _ => return Err(AppError::bad_request("Provide exactly one of plan or priceId")),
    };

    let limit = state.config.subscriptions.limit_for(plan);
    let updated = UserRepository::new(&state.db)
        .set_plan(user_id, plan, limit)
        .await?;
    if !updated {
        return Err(AppError::not_found("User not found"));
    }

    info!(user_id = %user_id, plan = %plan, changed_by = %auth_user.id, "Plan changed");
    Ok(Json(ChangePlanResponse {
        success: true,
        user_id,
        plan,
        ai_requests_limit: limit,
    }))
}
