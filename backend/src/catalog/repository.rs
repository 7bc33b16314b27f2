use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::model::{CategorySelector, Item};

#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Base item records for one category or sub-category.
    /// An unknown category is an empty list, not an error.
    async fn fetch_items(&self, selector: &CategorySelector) -> Result<Vec<Item>>;
}
