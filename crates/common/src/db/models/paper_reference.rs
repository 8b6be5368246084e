//! Knowledge-graph linkage: many-to-many Paper -> Paper references
//!
//! Distinct from the per-session Relation rows; this table is the durable
//! "references" collection attached to each paper.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paper_references")]
pub struct Model {
    /// The referencing paper
    #[sea_orm(primary_key, auto_increment = false)]
    pub paper_id: Uuid,

    /// The referenced paper
    #[sea_orm(primary_key, auto_increment = false)]
    pub reference_id: Uuid,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::PaperId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    Paper,

    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::ReferenceId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    Reference,
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Paper.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
