//! Admin status updates and the derived-status views built on them:
//! append-only history, per-order bulk outcomes, and the resolver
//! precedence visible through the list endpoints.

mod common;

use common::TestCtx;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

use storefront_api::entities::order::PaymentStatus;
use storefront_api::entities::order_status_update;
use storefront_api::services::status_resolver::StatusTag;
use storefront_api::services::status_updater::{AppendStatusRequest, BulkAppendStatusRequest};

fn append(title: &str) -> AppendStatusRequest {
    AppendStatusRequest {
        title: title.to_string(),
        details: Some(json!(["courier booked"])),
    }
}

#[tokio::test]
async fn appends_accumulate_without_rewriting_history() {
    let ctx = TestCtx::new().await;
    let order = ctx
        .seed_order(Uuid::new_v4(), PaymentStatus::CashOnDelivery)
        .await;

    ctx.status_updater
        .append_status(order.id, append("Confirmed"))
        .await
        .unwrap();
    ctx.status_updater
        .append_status(order.id, append("Shipped"))
        .await
        .unwrap();

    let detail = ctx.orders.get_order(order.id).await.unwrap();
    assert_eq!(detail.status_updates.len(), 2);
    assert_eq!(detail.status_updates[0].title, "Confirmed");
    assert_eq!(detail.status_updates[1].title, "Shipped");
}

#[tokio::test]
async fn appending_to_a_missing_order_is_an_error() {
    let ctx = TestCtx::new().await;
    let err = ctx
        .status_updater
        .append_status(Uuid::new_v4(), append("Shipped"))
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn bulk_append_settles_each_order_independently() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();
    let a = ctx.seed_order(customer_id, PaymentStatus::CashOnDelivery).await;
    let b = ctx.seed_order(customer_id, PaymentStatus::CashOnDelivery).await;
    let missing = Uuid::new_v4();

    let response = ctx
        .status_updater
        .bulk_append_status(BulkAppendStatusRequest {
            order_ids: vec![a.id, missing, b.id],
            title: "Shipped".to_string(),
            details: None,
        })
        .await
        .unwrap();

    assert_eq!(response.applied, 2);
    assert_eq!(response.failed, 1);
    let failed: Vec<_> = response
        .results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.order_id)
        .collect();
    assert_eq!(failed, vec![missing]);

    // The two real orders each got exactly one row.
    for id in [a.id, b.id] {
        let count = order_status_update::Entity::find()
            .filter(order_status_update::Column::OrderId.eq(id))
            .count(&*ctx.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}

#[tokio::test]
async fn retrying_only_failures_never_double_appends() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();
    let a = ctx.seed_order(customer_id, PaymentStatus::CashOnDelivery).await;
    let b = ctx.seed_order(customer_id, PaymentStatus::CashOnDelivery).await;
    let missing = Uuid::new_v4();

    let first = ctx
        .status_updater
        .bulk_append_status(BulkAppendStatusRequest {
            order_ids: vec![a.id, missing, b.id],
            title: "Shipped".to_string(),
            details: None,
        })
        .await
        .unwrap();

    // Retry only what failed, as the per-order results instruct.
    let retry_ids: Vec<Uuid> = first
        .results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.order_id)
        .collect();
    let second = ctx
        .status_updater
        .bulk_append_status(BulkAppendStatusRequest {
            order_ids: retry_ids,
            title: "Shipped".to_string(),
            details: None,
        })
        .await
        .unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.failed, 1);

    for id in [a.id, b.id] {
        let count = order_status_update::Entity::find()
            .filter(order_status_update::Column::OrderId.eq(id))
            .count(&*ctx.db)
            .await
            .unwrap();
        assert_eq!(count, 1, "successful orders must not be re-appended");
    }
}

#[tokio::test]
async fn paid_orders_keep_their_badge_through_fulfillment_labels() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();
    let order = ctx.seed_order(customer_id, PaymentStatus::Paid).await;

    ctx.status_updater
        .append_status(order.id, append("Shipped"))
        .await
        .unwrap();
    ctx.status_updater
        .append_status(order.id, append("Delivered to doorstep"))
        .await
        .unwrap();

    let detail = ctx.orders.get_order(order.id).await.unwrap();
    assert_eq!(detail.status, StatusTag::Paid);
}

#[tokio::test]
async fn cod_orders_keep_their_badge_after_shipping_updates() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();
    let order = ctx
        .seed_order(customer_id, PaymentStatus::CashOnDelivery)
        .await;

    ctx.status_updater
        .append_status(order.id, append("Shipped"))
        .await
        .unwrap();

    let detail = ctx.orders.get_order(order.id).await.unwrap();
    assert_eq!(detail.status, StatusTag::CashOnDelivery);
}

#[tokio::test]
async fn list_filter_matches_the_derived_badge() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();

    let shipped = ctx
        .seed_order(customer_id, PaymentStatus::PendingGateway)
        .await;
    ctx.status_updater
        .append_status(shipped.id, append("Shipped via BlueDart"))
        .await
        .unwrap();

    let pending = ctx
        .seed_order(customer_id, PaymentStatus::PendingGateway)
        .await;

    let page = ctx
        .orders
        .list_orders(Some(customer_id), Some(StatusTag::Shipped), 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.orders[0].order.id, shipped.id);

    let page = ctx
        .orders
        .list_orders(Some(customer_id), Some(StatusTag::Pending), 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.orders[0].order.id, pending.id);

    let all = ctx
        .orders
        .list_orders(Some(customer_id), None, 1, 20)
        .await
        .unwrap();
    assert_eq!(all.total, 2);
}
