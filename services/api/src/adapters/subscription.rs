//! services/api/src/adapters/subscription.rs
//!
//! This module contains the subscription-gate adapter, implementing the
//! `SubscriptionService` port against the billing tables mirrored from the
//! payment provider.
//!
//! The verdict is derived live on every call. A user with no billing
//! identifiers, no mirrored subscription record, a non-active status, or an
//! elapsed period end is simply "invalid" — an absent record is never an
//! error condition here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lingua_core::domain::SubscriptionStatus;
use lingua_core::ports::{PortResult, SubscriptionService};
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

/// Statuses the billing provider reports for an entitled subscriber.
const VALID_STATUSES: [&str; 2] = ["active", "trialing"];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A billing-table adapter that implements the `SubscriptionService` port.
#[derive(Clone)]
pub struct DbSubscriptionAdapter {
    pool: PgPool,
}

impl DbSubscriptionAdapter {
    /// Creates a new `DbSubscriptionAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SubscriptionRecord {
    status: String,
    current_period_end: Option<DateTime<Utc>>,
}

//=========================================================================================
// `SubscriptionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SubscriptionService for DbSubscriptionAdapter {
    async fn check(&self, user_id: Uuid) -> PortResult<SubscriptionStatus> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT s.status, s.current_period_end
             FROM users u
             JOIN subscriptions s ON s.stripe_subscription_id = u.stripe_subscription_id
             WHERE u.id = $1
             ORDER BY s.created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                // A broken billing lookup must not take lesson creation down
                // with it; the caller is treated as unsubscribed.
                error!("Subscription lookup failed for user {}: {}", user_id, e);
                return Ok(SubscriptionStatus::inactive("Internal server error"));
            }
        };

        let Some(record) = record else {
            return Ok(SubscriptionStatus::inactive("No active subscription found"));
        };

        if !VALID_STATUSES.contains(&record.status.as_str()) {
            return Ok(SubscriptionStatus::inactive("Subscription is not active"));
        }

        if let Some(period_end) = record.current_period_end {
            if period_end < Utc::now() {
                return Ok(SubscriptionStatus::inactive("Subscription expired"));
            }
        }

        Ok(SubscriptionStatus::active())
    }
}
