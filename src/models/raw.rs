use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::error::Result;

/// One station and one ingestion window, encoded as parallel per-variable
/// arrays under `daily`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawArrayDocument {
    #[serde(default)]
    pub location: Option<String>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[serde(default)]
    pub elevation: Option<f64>,

    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default)]
    pub daily: BTreeMap<String, Vec<serde_json::Value>>,
}

impl RawArrayDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }
}

/// One station and one ingestion window, encoded as an array of
/// self-contained day objects.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawNestedDocument {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default)]
    pub days: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl RawNestedDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }
}
