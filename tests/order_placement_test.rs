//! Order placement invariants: atomicity of the order/items/cart
//! transaction, idempotency on the receipt key, and the frozen price
//! snapshot surviving later catalog changes.

mod common;

use assert_matches::assert_matches;
use common::TestCtx;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use storefront_api::entities::order::PaymentStatus;
use storefront_api::entities::{cart, order_item, product};
use storefront_api::errors::ServiceError;
use storefront_api::services::orders::{AddressSnapshot, PlaceOrderRequest};

fn address() -> AddressSnapshot {
    AddressSnapshot {
        recipient_name: "Asha".to_string(),
        address_line_1: "12 Lake Road".to_string(),
        address_line_2: None,
        city: "Pune".to_string(),
        province: "MH".to_string(),
        country_code: "IN".to_string(),
        postal_code: "411001".to_string(),
        phone: None,
    }
}

#[tokio::test]
async fn placement_writes_order_items_and_clears_cart_together() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();
    let lamp = ctx.seed_product(dec!(450), dec!(0)).await;
    let cable = ctx.seed_product(dec!(300), dec!(0)).await;
    let cart_id = ctx.seed_cart(customer_id, &[(lamp, 2), (cable, 1)]).await;

    let snapshot = ctx.carts.get_cart_snapshot(customer_id).await.unwrap();
    assert_eq!(snapshot.total, dec!(1200));

    let order = ctx
        .orders
        .place_order(PlaceOrderRequest {
            customer_id,
            receipt_key: "rcpt-atomic-1".to_string(),
            cart: snapshot,
            address: address(),
            payment_status: PaymentStatus::CashOnDelivery,
            cod_deposit_amount: None,
        })
        .await
        .unwrap();

    assert_eq!(order.subtotal, dec!(1200));
    assert_eq!(order.total, dec!(1200));
    assert!(order.order_number.starts_with("ORD-"));

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    let cart_row = cart::Entity::find_by_id(cart_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cart_row.status, cart::CartStatus::Converted);
}

#[tokio::test]
async fn replaying_the_receipt_key_returns_the_first_order() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();
    let lamp = ctx.seed_product(dec!(450), dec!(0)).await;
    ctx.seed_cart(customer_id, &[(lamp, 1)]).await;

    let snapshot = ctx.carts.get_cart_snapshot(customer_id).await.unwrap();
    let request = PlaceOrderRequest {
        customer_id,
        receipt_key: "rcpt-replay-1".to_string(),
        cart: snapshot.clone(),
        address: address(),
        payment_status: PaymentStatus::CashOnDelivery,
        cod_deposit_amount: None,
    };

    let first = ctx.orders.place_order(request.clone()).await.unwrap();
    let second = ctx.orders.place_order(request).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(
        ctx.orders.count_orders_for_customer(customer_id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn order_totals_survive_later_price_changes() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();
    let lamp = ctx.seed_product(dec!(500), dec!(10)).await; // 450 effective
    ctx.seed_cart(customer_id, &[(lamp, 2)]).await;

    let snapshot = ctx.carts.get_cart_snapshot(customer_id).await.unwrap();
    assert_eq!(snapshot.total, dec!(900));

    let order = ctx
        .orders
        .place_order(PlaceOrderRequest {
            customer_id,
            receipt_key: "rcpt-freeze-1".to_string(),
            cart: snapshot,
            address: address(),
            payment_status: PaymentStatus::CashOnDelivery,
            cod_deposit_amount: None,
        })
        .await
        .unwrap();

    // Reprice the catalog after placement.
    let row = product::Entity::find_by_id(lamp)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: product::ActiveModel = row.into();
    active.price = Set(dec!(9999));
    active.update(&*ctx.db).await.unwrap();

    let detail = ctx.orders.get_order(order.id).await.unwrap();
    assert_eq!(detail.order.total, dec!(900));
    assert_eq!(detail.items[0].unit_price, dec!(450));
}

#[tokio::test]
async fn empty_carts_cannot_be_placed() {
    let ctx = TestCtx::new().await;
    let customer_id = Uuid::new_v4();
    ctx.seed_cart(customer_id, &[]).await;

    let snapshot = ctx.carts.get_cart_snapshot(customer_id).await.unwrap();
    let err = ctx
        .orders
        .place_order(PlaceOrderRequest {
            customer_id,
            receipt_key: "rcpt-empty-1".to_string(),
            cart: snapshot,
            address: address(),
            payment_status: PaymentStatus::CashOnDelivery,
            cod_deposit_amount: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}
