use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::AssetKey;

/// Listing metadata for a saved design.
///
/// Catalog items are small and always loaded in full; the design itself
/// lives in a separate shadow payload stored under the same `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// Small preview image, usually a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        thumbnail: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            thumbnail,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A named standalone derived asset, such as a background-removal result.
///
/// The bytes live in the blob store under `key`; deleting a cutout removes
/// only this record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cutout {
    pub id: String,
    pub name: String,
    pub key: AssetKey,
    pub created_at: DateTime<Utc>,
}
