use crate::entities::product::{self, Entity as ProductEntity};
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

/// Cart preview line resolved from a product id.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub id: i32,
    pub label: String,
    pub price: Decimal,
    pub image: Option<String>,
}

impl From<product::Model> for CartLine {
    fn from(product: product::Model) -> Self {
        Self {
            id: product.id,
            label: product.label,
            price: product.price,
            image: product.image,
        }
    }
}

/// Product lookup, the leaf every downstream component resolves ids through.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Resolves a product by id; `None` when it does not exist.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i32) -> Result<Option<product::Model>, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id, "Failed to fetch product");
                ServiceError::DatabaseError(e)
            })
    }

    /// Resolves a batch of product ids into cart preview lines, silently
    /// skipping ids that do not resolve.
    #[instrument(skip(self))]
    pub async fn mount_cart(&self, ids: &[i32]) -> Result<Vec<CartLine>, ServiceError> {
        let mut lines = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.get_product(id).await? {
                Some(product) => lines.push(CartLine::from(product)),
                None => warn!(product_id = id, "Skipping unknown product in cart mount"),
            }
        }
        Ok(lines)
    }
}
