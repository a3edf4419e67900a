//! Shared fixtures for integration tests: an in-memory SQLite database
//! with the schema bootstrapped from the entities, plus seed helpers.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use uuid::Uuid;

use storefront_api::db;
use storefront_api::entities::order::PaymentStatus;
use storefront_api::entities::{cart, cart_item, customer_address, order, product};
use storefront_api::services::carts::CartService;
use storefront_api::services::orders::OrderService;
use storefront_api::services::status_updater::StatusUpdaterService;

pub struct TestCtx {
    pub db: Arc<DatabaseConnection>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub status_updater: Arc<StatusUpdaterService>,
}

impl TestCtx {
    pub async fn new() -> Self {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        db::ensure_schema(&db).await.expect("schema bootstrap");
        let db = Arc::new(db);

        let carts = Arc::new(CartService::new(db.clone()));
        let orders = Arc::new(OrderService::new(db.clone(), carts.clone(), None));
        let status_updater = Arc::new(StatusUpdaterService::new(db.clone(), None));

        Self {
            db,
            carts,
            orders,
            status_updater,
        }
    }

    pub async fn seed_product(&self, price: Decimal, discount_percent: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        product::ActiveModel {
            id: Set(id),
            name: Set(format!("Product {}", id.simple())),
            price: Set(price),
            discount_percent: Set(discount_percent),
            image_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed product");
        id
    }

    pub async fn seed_cart(&self, customer_id: Uuid, items: &[(Uuid, i32)]) -> Uuid {
        let now = Utc::now();
        let cart_id = Uuid::new_v4();
        cart::ActiveModel {
            id: Set(cart_id),
            customer_id: Set(customer_id),
            currency: Set("INR".to_string()),
            status: Set(cart::CartStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed cart");

        for &(product_id, quantity) in items {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: Set(now),
            }
            .insert(&*self.db)
            .await
            .expect("seed cart item");
        }
        cart_id
    }

    pub async fn seed_address(&self, customer_id: Uuid) -> customer_address::Model {
        let now = Utc::now();
        customer_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            recipient_name: Set("Asha".to_string()),
            address_line_1: Set("12 Lake Road".to_string()),
            address_line_2: Set(None),
            city: Set("Pune".to_string()),
            province: Set("MH".to_string()),
            country_code: Set("IN".to_string()),
            postal_code: Set("411001".to_string()),
            phone: Set(Some("+911234567890".to_string())),
            is_default: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed address")
    }

    /// Inserts a bare order row directly, bypassing checkout.
    pub async fn seed_order(
        &self,
        customer_id: Uuid,
        payment_status: PaymentStatus,
    ) -> order::Model {
        let id = Uuid::new_v4();
        order::ActiveModel {
            id: Set(id),
            order_number: Set(format!("ORD-{}", id.simple())),
            customer_id: Set(customer_id),
            receipt_key: Set(format!("rcpt-{}", id.simple())),
            subtotal: Set(Decimal::from(100)),
            total: Set(Decimal::from(100)),
            currency: Set("INR".to_string()),
            payment_status: Set(payment_status),
            shipping_address: Set(serde_json::json!({})),
            cod_deposit_amount: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed order")
    }
}
