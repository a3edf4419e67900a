use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{cart, cart_item, product},
    errors::ServiceError,
};

/// A cart line priced against the live catalog. Unit prices here are
/// already discounted; they become frozen snapshots only when an order
/// is created from them.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartSnapshot {
    pub cart_id: Uuid,
    pub currency: String,
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub total: Decimal,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Read-side collaborator for cart contents. Checkout prices the cart,
/// snapshots it into an order, and clears it after verified placement;
/// cart mutation endpoints belong to the cart subsystem.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Fetches the customer's active cart priced against the live
    /// catalog. Totals are recomputed on every call, never cached.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_cart_snapshot(&self, customer_id: Uuid) -> Result<CartSnapshot, ServiceError> {
        let cart = cart::Entity::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .filter(cart::Column::Status.eq(cart::CartStatus::Active))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No active cart".to_string()))?;

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let product = product::Entity::find_by_id(item.product_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            let unit_price = product.discounted_price();
            lines.push(CartLine {
                product_id: product.id,
                product_name: product.name,
                quantity: item.quantity,
                unit_price,
                line_total: unit_price * Decimal::from(item.quantity),
            });
        }

        let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();

        Ok(CartSnapshot {
            cart_id: cart.id,
            currency: cart.currency,
            subtotal,
            total: subtotal,
            lines,
        })
    }

    /// Marks the cart converted and removes its items. Runs on the
    /// caller's connection so placement and clearing share one
    /// transaction.
    pub async fn clear_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> Result<(), ServiceError> {
        let cart = cart::Entity::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(conn)
            .await?;

        let mut active: cart::ActiveModel = cart.into();
        active.status = Set(cart::CartStatus::Converted);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;

        Ok(())
    }
}
