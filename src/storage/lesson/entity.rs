use sea_orm::entity::prelude::*;
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub course_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub duration: Option<f64>,
    // JSON `{"segments": [...]}` / `{"text": ...}`, or a legacy raw string
    #[sea_orm(column_type = "Text", nullable)]
    pub transcript: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub transcript_metadata: Option<String>,
    // JSON `{"text": ...}`, or a legacy raw string
    #[sea_orm(column_type = "Text", nullable)]
    pub corrected_transcript: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub correction_metadata: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub summary_metadata: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
