use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order entity. Created once at checkout completion; immutable
/// afterwards except for `payment_status` and the append-only
/// status-update rows that reference it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Order)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Externally visible identifier
    #[sea_orm(unique)]
    pub order_number: String,

    pub customer_id: Uuid,

    /// Client-generated idempotency key; the unique constraint is what
    /// makes double-submission of one checkout produce one order.
    #[sea_orm(unique)]
    pub receipt_key: String,

    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total: Decimal,
    pub currency: String,

    pub payment_status: PaymentStatus,

    /// Delivery address copied at creation, not a live reference, so
    /// later address edits never change shipping labels.
    #[sea_orm(column_type = "Json")]
    pub shipping_address: Json,

    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub cod_deposit_amount: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_status_update::Entity")]
    StatusUpdates,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_status_update::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusUpdates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Payment status. Monotonic for the gateway path
/// (`PendingGateway → Paid`); COD orders stay `CashOnDelivery` unless a
/// staff status event later records cancellation or refund.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending_gateway")]
    PendingGateway,
    #[sea_orm(string_value = "cash_on_delivery")]
    CashOnDelivery,
    #[sea_orm(string_value = "paid")]
    Paid,
}
