use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::pricing::model::ItemPrices;

/// Catalog record as stored in the item store, plus the merged prices.
///
/// JSON field names follow the public API, which predates this service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub realm: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub name: String,
    pub base_type: String,
    pub icon: String,
    #[serde(rename = "iconTierText")]
    pub icon_tier_text: Option<String>,
    pub rarity: Option<String>,
    pub w: i64,
    pub h: i64,
    pub ilvl: Option<i64>,

    pub support: bool,
    pub duplicated: bool,
    pub corrupted: bool,
    pub sanctified: bool,
    pub desecrated: bool,

    // Free-form blobs, passed through untouched.
    #[serde(rename = "socketedItems")]
    pub socketed_items: Option<Value>,
    pub properties: Option<Value>,
    pub requirements: Option<Value>,
    #[serde(rename = "runeMods")]
    pub rune_mods: Option<Value>,
    #[serde(rename = "implicitMods")]
    pub implicit_mods: Option<Value>,
    #[serde(rename = "explicitMods")]
    pub explicit_mods: Option<Value>,
    #[serde(rename = "fracturedMods")]
    pub fractured_mods: Option<Value>,
    #[serde(rename = "desecratedMods")]
    pub desecrated_mods: Option<Value>,

    #[serde(rename = "flavourText")]
    pub flavour_text: Option<String>,
    #[serde(rename = "descrText")]
    pub descr_text: Option<String>,
    #[serde(rename = "secDescrText")]
    pub sec_descr_text: Option<String>,

    /// league -> currency -> stats; absent when the item has no recent samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prices: Option<ItemPrices>,
}

/// Which slice of the catalog a request asks for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CategorySelector {
    Category(String),
    SubCategory(String),
}

impl CategorySelector {
    pub fn category(name: &str) -> Result<Self, AppError> {
        Ok(Self::Category(validate(name)?))
    }

    pub fn sub_category(name: &str) -> Result<Self, AppError> {
        Ok(Self::SubCategory(validate(name)?))
    }

    /// Selector for a `/items/{category}[/{subcategory}]` path.
    /// A sub-category, when given, is the more specific filter and wins.
    pub fn from_path(category: &str, sub_category: Option<&str>) -> Result<Self, AppError> {
        match sub_category {
            Some(sub) => Self::sub_category(sub),
            None => Self::category(category),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Category(name) | Self::SubCategory(name) => name,
        }
    }

    /// Response cache key. Category and sub-category names live in
    /// separate namespaces so equal names never share an entry.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CategorySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(name) => write!(f, "category:{name}"),
            Self::SubCategory(name) => write!(f, "sub_category:{name}"),
        }
    }
}

fn validate(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidSelector(
            "category name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
