use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A catalog item. `in_stock` is the only record of availability.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub published: ChronoDateTimeUtc,
    pub in_stock: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn availability(&self) -> Availability {
        Availability::from_in_stock(self.in_stock)
    }
}

/// The two states a book cycles between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Borrowed,
}

impl Availability {
    pub fn from_in_stock(in_stock: bool) -> Self {
        if in_stock {
            Availability::Available
        } else {
            Availability::Borrowed
        }
    }

    pub fn in_stock(self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn label(self) -> &'static str {
        match self {
            Availability::Available => "Available",
            Availability::Borrowed => "Borrowed",
        }
    }
}
