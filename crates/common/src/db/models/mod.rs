//! SeaORM entity models
//!
//! Database entities for CiteGraph

mod analysis;
mod paper;
mod paper_reference;
mod relation;
mod session;

pub use paper::{
    ActiveModel as PaperActiveModel, Column as PaperColumn, Entity as PaperEntity, Model as Paper,
};

pub use relation::{
    ActiveModel as RelationActiveModel, Column as RelationColumn, Entity as RelationEntity,
    Model as PaperRelation,
};

pub use paper_reference::{
    ActiveModel as PaperReferenceActiveModel, Column as PaperReferenceColumn,
    Entity as PaperReferenceEntity, Model as PaperReference,
};

pub use session::{
    ActiveModel as SessionActiveModel, Column as SessionColumn, Entity as SessionEntity,
    Model as Session,
};

pub use analysis::{
    ActiveModel as AnalysisActiveModel, Column as AnalysisColumn, Entity as AnalysisEntity,
    Model as Analysis,
};
