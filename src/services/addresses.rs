use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{entities::customer_address, errors::ServiceError};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1))]
    pub recipient_name: String,
    #[validate(length(min = 1))]
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub province: String,
    #[validate(length(equal = 2))]
    pub country_code: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Address-book collaborator. The checkout wizard reads from it at the
/// address-select step; orders copy the chosen address rather than
/// referencing these rows.
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn list_addresses(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<customer_address::Model>, ServiceError> {
        let addresses = customer_address::Entity::find()
            .filter(customer_address::Column::CustomerId.eq(customer_id))
            .order_by_desc(customer_address::Column::IsDefault)
            .order_by_desc(customer_address::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(addresses)
    }

    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn create_address(
        &self,
        customer_id: Uuid,
        request: CreateAddressRequest,
    ) -> Result<customer_address::Model, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let address = customer_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            recipient_name: Set(request.recipient_name),
            address_line_1: Set(request.address_line_1),
            address_line_2: Set(request.address_line_2),
            city: Set(request.city),
            province: Set(request.province),
            country_code: Set(request.country_code),
            postal_code: Set(request.postal_code),
            phone: Set(request.phone),
            is_default: Set(request.is_default),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(address.insert(&*self.db).await?)
    }
}
