//! Relation entity: a directed semantic link between two papers
//!
//! At most one row exists per ordered (from, to) pair; the repository
//! performs an existence check before every insert.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "relations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Paper the relation originates from (the citing side)
    pub from_paper_id: Uuid,

    /// Paper the relation points at (the cited side)
    pub to_paper_id: Uuid,

    /// Relationship label (builds_on, extends, applies, compares,
    /// critiques, references, related)
    #[sea_orm(column_type = "Text")]
    pub relationship: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Evidence excerpt from the citation context
    #[sea_orm(column_type = "Text")]
    pub evidence: String,

    /// Classifier confidence in [0.0, 1.0]
    pub confidence: f32,

    /// Accumulated weight, >= 1
    pub weight: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::FromPaperId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    FromPaper,

    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::ToPaperId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    ToPaper,
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FromPaper.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
