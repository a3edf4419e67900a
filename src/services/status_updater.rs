use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{order, order_status_update},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AppendStatusRequest {
    /// Free-form label ("Shipped", "Out for delivery", ...). The order
    /// badge is derived from these by substring match, so operators can
    /// write what they mean.
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    /// Optional structured payload (courier, tracking id, notes).
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BulkAppendStatusRequest {
    #[validate(length(min = 1, max = 100))]
    pub order_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    pub details: Option<serde_json::Value>,
}

/// Per-order outcome of a bulk append. One order failing never hides
/// the others' results.
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAppendOutcome {
    pub order_id: Uuid,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAppendResponse {
    pub applied: usize,
    pub failed: usize,
    pub results: Vec<BulkAppendOutcome>,
}

/// Append-only status history writer for the admin console. Updates
/// are never edited or deleted; the derived badge changes because the
/// history grew.
#[derive(Clone)]
pub struct StatusUpdaterService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl StatusUpdaterService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Appends one status update to an order's history.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn append_status(
        &self,
        order_id: Uuid,
        request: AppendStatusRequest,
    ) -> Result<order_status_update::Model, ServiceError> {
        request.validate()?;

        // The append must point at a real order; a typo'd id is a
        // client error, not a silently-ignored write.
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let update = order_status_update::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            title: Set(request.title.clone()),
            details: Set(request.details.unwrap_or(serde_json::Value::Null)),
            created_at: Set(Utc::now()),
        };
        let inserted = update.insert(&*self.db).await?;

        info!(order_id = %order_id, title = %request.title, "status update appended");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::OrderStatusAppended {
                    order_id,
                    title: request.title,
                })
                .await
            {
                warn!(error = %e, "failed to send status appended event");
            }
        }

        Ok(inserted)
    }

    /// Appends the same status to many orders, each append settled
    /// independently. A failure on one order (missing id, write error)
    /// is reported for that order alone; the rest still commit, so a
    /// retry with the failed ids never double-appends the others.
    #[instrument(skip(self, request), fields(count = request.order_ids.len()))]
    pub async fn bulk_append_status(
        &self,
        request: BulkAppendStatusRequest,
    ) -> Result<BulkAppendResponse, ServiceError> {
        request.validate()?;

        let appends = request.order_ids.iter().map(|&order_id| {
            let single = AppendStatusRequest {
                title: request.title.clone(),
                details: request.details.clone(),
            };
            async move {
                let result = self.append_status(order_id, single).await;
                (order_id, result)
            }
        });

        let settled = join_all(appends).await;

        let mut applied = 0;
        let mut failed = 0;
        let results = settled
            .into_iter()
            .map(|(order_id, result)| match result {
                Ok(_) => {
                    applied += 1;
                    BulkAppendOutcome {
                        order_id,
                        success: true,
                        error: None,
                    }
                }
                Err(err) => {
                    failed += 1;
                    warn!(order_id = %order_id, error = %err, "bulk append failed for order");
                    BulkAppendOutcome {
                        order_id,
                        success: false,
                        error: Some(err.to_string()),
                    }
                }
            })
            .collect();

        Ok(BulkAppendResponse {
            applied,
            failed,
            results,
        })
    }
}
