use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{AnyPool, Row};

use crate::catalog::model::{CategorySelector, Item};
use crate::catalog::repository::ItemRepository;
use crate::db::Dialect;

const ITEM_COLUMNS: &str = r#"
  id, realm, category, sub_category, icon, icon_tier_text, name, base_type, rarity,
  w, h, ilvl, socketed_items, properties, requirements,
  rune_mods, implicit_mods, explicit_mods, fractured_mods, desecrated_mods,
  flavour_text, descr_text, sec_descr_text,
  support, duplicated, corrupted, sanctified, desecrated
"#;

/// SQLx-backed implementation of ItemRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxItemRepository {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlxItemRepository {
    pub fn new(pool: AnyPool) -> Self {
        let dialect = Dialect::of(&pool);
        Self { pool, dialect }
    }
}

#[async_trait]
impl ItemRepository for SqlxItemRepository {
    async fn fetch_items(&self, selector: &CategorySelector) -> anyhow::Result<Vec<Item>> {
        // Column name comes from the enum, never from the request.
        let column = match selector {
            CategorySelector::Category(_) => "category",
            CategorySelector::SubCategory(_) => "sub_category",
        };
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE {column} = {} ORDER BY name, id;",
            self.dialect.param(1)
        );

        let rows = sqlx::query(&sql)
            .bind(selector.name().to_string())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("querying items for {selector}"))?;

        // Complete listing or an error, never a truncated one.
        rows.iter()
            .map(|r| row_to_item(r).with_context(|| format!("decoding item row for {selector}")))
            .collect()
    }
}

/* =========================
Row mapping
========================= */

fn row_to_item(r: &sqlx::any::AnyRow) -> anyhow::Result<Item> {
    let id: String = r.try_get("id")?;

    Ok(Item {
        realm: r.try_get("realm")?,
        category: r.try_get("category")?,
        sub_category: r.try_get("sub_category")?,
        name: r.try_get("name")?,
        base_type: r.try_get("base_type")?,
        icon: r.try_get("icon")?,
        icon_tier_text: r.try_get("icon_tier_text")?,
        rarity: r.try_get("rarity")?,
        w: r.try_get("w")?,
        h: r.try_get("h")?,
        ilvl: r.try_get("ilvl")?,

        support: flag(r, "support")?,
        duplicated: flag(r, "duplicated")?,
        corrupted: flag(r, "corrupted")?,
        sanctified: flag(r, "sanctified")?,
        desecrated: flag(r, "desecrated")?,

        socketed_items: json_column(r, "socketed_items")?,
        properties: json_column(r, "properties")?,
        requirements: json_column(r, "requirements")?,
        rune_mods: json_column(r, "rune_mods")?,
        implicit_mods: json_column(r, "implicit_mods")?,
        explicit_mods: json_column(r, "explicit_mods")?,
        fractured_mods: json_column(r, "fractured_mods")?,
        desecrated_mods: json_column(r, "desecrated_mods")?,

        flavour_text: r.try_get("flavour_text")?,
        descr_text: r.try_get("descr_text")?,
        sec_descr_text: r.try_get("sec_descr_text")?,

        prices: None,
        id,
    })
}

/// Booleans are stored as 0/1 integers.
fn flag(r: &sqlx::any::AnyRow, column: &str) -> anyhow::Result<bool> {
    let v: i64 = r.try_get(column)?;
    Ok(v != 0)
}

/// Nullable TEXT column holding a JSON document.
fn json_column(r: &sqlx::any::AnyRow, column: &str) -> anyhow::Result<Option<Value>> {
    let raw: Option<String> = r.try_get(column)?;
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| serde_json::from_str(&s).with_context(|| format!("invalid JSON in {column}")))
        .transpose()
}
