//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One uploaded paper. Rows are created once and never updated.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub source_url: String,

    /// Blob store key; present iff a file was uploaded
    #[sea_orm(column_type = "Text", nullable, unique)]
    pub filename: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub authors: Option<String>,

    /// Free text, format not validated
    #[sea_orm(column_type = "Text", nullable)]
    pub publish_date: Option<String>,

    pub uploaded_at: DateTimeWithTimeZone,

    /// Size in bytes; present iff a file was uploaded
    pub file_size: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
