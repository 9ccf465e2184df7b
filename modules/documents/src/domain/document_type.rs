use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of uploaded document. Stored as its lowercase name.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[sea_orm(string_value = "resume")]
    Resume,
    #[sea_orm(string_value = "job_description")]
    JobDescription,
    #[sea_orm(string_value = "other")]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown document type '{0}' (expected resume, job_description or other)")]
pub struct UnknownDocumentType(pub String);

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::JobDescription => "job_description",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = UnknownDocumentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resume" => Ok(Self::Resume),
            "job_description" => Ok(Self::JobDescription),
            "other" => Ok(Self::Other),
            _ => Err(UnknownDocumentType(s.to_string())),
        }
    }
}
