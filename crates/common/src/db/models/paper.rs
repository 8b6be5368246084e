//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Unique natural key; re-submission of the same url updates in place
    #[sea_orm(column_type = "Text", unique)]
    pub url: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Ordered author list as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: Json,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub introduction: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub full_text: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub doi: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub arxiv_id: Option<String>,

    pub published_at: Option<DateTimeWithTimeZone>,

    /// Unordered tag set as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::relation::Entity", on_delete = "Cascade")]
    RelationsFrom,

    #[sea_orm(has_many = "super::paper_reference::Entity", on_delete = "Cascade")]
    References,
}

impl ActiveModelBehavior for ActiveModel {}
