use sqlx::AnyPool;

/// Column types are chosen so that both SQLite and Postgres decode them
/// through the Any driver as `i64`, `f64` or `String`.
pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Catalog
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS items (
  id TEXT PRIMARY KEY,
  realm TEXT NOT NULL,
  category TEXT NOT NULL,
  sub_category TEXT,
  icon TEXT NOT NULL,
  icon_tier_text TEXT,
  name TEXT NOT NULL,
  base_type TEXT NOT NULL,
  rarity TEXT,
  w BIGINT NOT NULL DEFAULT 1,
  h BIGINT NOT NULL DEFAULT 1,
  ilvl BIGINT,
  socketed_items TEXT,
  properties TEXT,
  requirements TEXT,
  rune_mods TEXT,
  implicit_mods TEXT,
  explicit_mods TEXT,
  fractured_mods TEXT,
  desecrated_mods TEXT,
  flavour_text TEXT,
  descr_text TEXT,
  sec_descr_text TEXT,
  support BIGINT NOT NULL DEFAULT 0 CHECK (support IN (0,1)),
  duplicated BIGINT NOT NULL DEFAULT 0 CHECK (duplicated IN (0,1)),
  corrupted BIGINT NOT NULL DEFAULT 0 CHECK (corrupted IN (0,1)),
  sanctified BIGINT NOT NULL DEFAULT 0 CHECK (sanctified IN (0,1)),
  desecrated BIGINT NOT NULL DEFAULT 0 CHECK (desecrated IN (0,1))
);
"#,
    )
    .execute(pool)
    .await?;

    // Raw price samples, written by the ingestion job.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS prices (
  item_id TEXT NOT NULL,
  league TEXT NOT NULL,
  currency_id TEXT NOT NULL,
  price DOUBLE PRECISION NOT NULL,
  volume DOUBLE PRECISION NOT NULL,
  stock DOUBLE PRECISION NOT NULL,
  timestamp BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_items_sub_category ON items(sub_category);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_prices_timestamp ON prices(timestamp);"#)
        .execute(pool)
        .await?;

    Ok(())
}
