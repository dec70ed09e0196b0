//! Address book persistence, always scoped to the owning user.

use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::address;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewAddress {
    #[validate(length(min = 1, max = 255))]
    pub street: String,
    #[validate(length(min = 1, max = 20))]
    pub number: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 2, max = 2))]
    pub state: String,
    #[validate(length(min = 1, max = 60))]
    pub country: String,
    #[validate(length(min = 8, max = 9))]
    pub zipcode: String,
    pub complement: Option<String>,
}

pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create_for_user(
        &self,
        user_id: i32,
        input: NewAddress,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let created = address::ActiveModel {
            user_id: Set(user_id),
            street: Set(input.street),
            number: Set(input.number),
            city: Set(input.city),
            state: Set(input.state.to_uppercase()),
            country: Set(input.country),
            zipcode: Set(input.zipcode),
            complement: Set(input.complement),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        Ok(created)
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<address::Model>, ServiceError> {
        Ok(address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?)
    }

    /// Fetches an address only when it belongs to `user_id`.
    pub async fn find_for_user(
        &self,
        address_id: i32,
        user_id: i32,
    ) -> Result<Option<address::Model>, ServiceError> {
        Ok(address::Entity::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?)
    }
}
