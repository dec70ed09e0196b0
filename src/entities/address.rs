use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A user's saved shipping address. Fields are copied into the order at
/// checkout so the order keeps its own snapshot.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub street: String,
    pub number: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zipcode: String,
    #[sea_orm(nullable)]
    pub complement: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
