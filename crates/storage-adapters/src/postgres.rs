//! # Postgres Store
//!
//! Maps the relational schema in `migrations/` onto the domain models.
//! Referential behaviour (cascade on page delete, `SET NULL` on block
//! delete) lives in the schema, not here.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use domains::{Block, DailyCount, DeviceInfo, Event, EventKind, EventStore, Page, PageRepo, StoreRejection};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const PAGE_COLUMNS: &str =
    "id, owner_id, handle, kind, title, description, theme, is_published, created_at, updated_at";
const BLOCK_COLUMNS: &str = "id, page_id, kind, content, style, position, visible, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("connecting to postgres")?;
        MIGRATOR.run(&pool).await.context("running migrations")?;
        tracing::info!(max_connections, "postgres store ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn page_from_row(row: &PgRow) -> anyhow::Result<Page> {
    Ok(Page {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        handle: row.try_get("handle")?,
        kind: row.try_get::<String, _>("kind")?.parse()?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        theme: row.try_get::<String, _>("theme")?.parse()?,
        is_published: row.try_get("is_published")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn block_from_row(row: &PgRow) -> anyhow::Result<Block> {
    let position: i32 = row.try_get("position")?;
    Ok(Block {
        id: row.try_get("id")?,
        page_id: row.try_get("page_id")?,
        kind: row.try_get::<String, _>("kind")?.parse()?,
        content: row.try_get("content")?,
        style: row.try_get("style")?,
        order: u32::try_from(position).context("negative block position")?,
        visible: row.try_get("visible")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn event_from_row(row: &PgRow) -> anyhow::Result<Event> {
    let utm: Option<Json<BTreeMap<String, String>>> = row.try_get("utm")?;
    let device: Json<DeviceInfo> = row.try_get("device")?;
    Ok(Event {
        id: row.try_get("id")?,
        page_id: row.try_get("page_id")?,
        block_id: row.try_get("block_id")?,
        kind: row.try_get::<String, _>("kind")?.parse()?,
        referrer: row.try_get("referrer")?,
        utm: utm.map(|j| j.0),
        device: device.0,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
    })
}

fn position(block: &Block) -> anyhow::Result<i32> {
    i32::try_from(block.order).context("block order out of range")
}

#[async_trait]
impl PageRepo for PgStore {
    async fn get_page(&self, id: Uuid) -> anyhow::Result<Option<Page>> {
        let row = sqlx::query(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(page_from_row).transpose()
    }

    async fn get_page_by_handle(&self, handle: &str) -> anyhow::Result<Option<Page>> {
        let row = sqlx::query(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE handle = $1"))
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(page_from_row).transpose()
    }

    async fn list_pages_by_owner(&self, owner_id: &str) -> anyhow::Result<Vec<Page>> {
        sqlx::query(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(page_from_row)
        .collect()
    }

    /// Page and template blocks go in together or not at all.
    async fn insert_page(&self, page: Page, blocks: Vec<Block>) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO pages ({PAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(page.id)
        .bind(&page.owner_id)
        .bind(&page.handle)
        .bind(page.kind.as_str())
        .bind(&page.title)
        .bind(&page.description)
        .bind(page.theme.as_str())
        .bind(page.is_published)
        .bind(page.created_at)
        .bind(page.updated_at)
        .execute(&mut *tx)
        .await?;

        for block in &blocks {
            insert_block(&mut tx, block).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_page(&self, page: Page) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE pages SET handle = $2, kind = $3, title = $4, description = $5, theme = $6, \
             is_published = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(page.id)
        .bind(&page.handle)
        .bind(page.kind.as_str())
        .bind(&page.title)
        .bind(&page.description)
        .bind(page.theme.as_str())
        .bind(page.is_published)
        .bind(page.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreRejection::MissingReference { kind: "Page", id: page.id }.into());
        }
        Ok(())
    }

    async fn delete_page(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pages WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_block(&self, id: Uuid) -> anyhow::Result<Option<Block>> {
        let row = sqlx::query(&format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(block_from_row).transpose()
    }

    async fn list_blocks(&self, page_id: Uuid) -> anyhow::Result<Vec<Block>> {
        sqlx::query(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE page_id = $1 ORDER BY position ASC, id ASC"
        ))
        .bind(page_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(block_from_row)
        .collect()
    }

    async fn append_block(&self, mut block: Block) -> anyhow::Result<Block> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent appends on the same page.
        let locked = sqlx::query("SELECT id FROM pages WHERE id = $1 FOR UPDATE")
            .bind(block.page_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreRejection::MissingReference { kind: "Page", id: block.page_id }.into());
        }

        let next: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(position) + 1, 0) FROM blocks WHERE page_id = $1")
            .bind(block.page_id)
            .fetch_one(&mut *tx)
            .await?;
        block.order = u32::try_from(next).context("negative block position")?;

        insert_block(&mut tx, &block).await?;
        tx.commit().await?;
        Ok(block)
    }

    async fn update_block(&self, block: Block) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE blocks SET content = $3, style = $4, position = $5, visible = $6, updated_at = $7 \
             WHERE id = $1 AND page_id = $2",
        )
        .bind(block.id)
        .bind(block.page_id)
        .bind(&block.content)
        .bind(&block.style)
        .bind(position(&block)?)
        .bind(block.visible)
        .bind(block.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreRejection::MissingReference { kind: "Block", id: block.id }.into());
        }
        Ok(())
    }

    async fn delete_block(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM blocks WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn reorder_blocks(&self, page_id: Uuid, ordered_ids: &[Uuid]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM blocks WHERE page_id = $1 FOR UPDATE")
            .bind(page_id)
            .fetch_all(&mut *tx)
            .await?;
        let existing: HashSet<&Uuid> = current.iter().collect();
        let supplied: HashSet<&Uuid> = ordered_ids.iter().collect();
        if supplied.len() != ordered_ids.len() || supplied != existing {
            return Err(StoreRejection::StaleBlockSet { page_id }.into());
        }

        sqlx::query(
            "UPDATE blocks SET position = (t.ord - 1)::int \
             FROM unnest($2::uuid[]) WITH ORDINALITY AS t(id, ord) \
             WHERE blocks.id = t.id AND blocks.page_id = $1",
        )
        .bind(page_id)
        .bind(ordered_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_block(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, block: &Block) -> anyhow::Result<()> {
    sqlx::query(&format!(
        "INSERT INTO blocks ({BLOCK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
    ))
    .bind(block.id)
    .bind(block.page_id)
    .bind(block.kind.as_str())
    .bind(&block.content)
    .bind(&block.style)
    .bind(position(block)?)
    .bind(block.visible)
    .bind(block.created_at)
    .bind(block.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Maps a foreign-key violation on `events` to the row it points at.
fn dangling_event_target(err: sqlx::Error, event: &Event) -> anyhow::Error {
    let missing = match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => match db.constraint() {
            Some("events_page_id_fkey") => Some(StoreRejection::MissingReference { kind: "Page", id: event.page_id }),
            Some("events_block_id_fkey") => event
                .block_id
                .map(|id| StoreRejection::MissingReference { kind: "Block", id }),
            _ => None,
        },
        _ => None,
    };
    missing.map(anyhow::Error::from).unwrap_or_else(|| err.into())
}

#[async_trait]
impl EventStore for PgStore {
    async fn append(&self, event: Event) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO events (id, page_id, block_id, kind, referrer, utm, device, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id)
        .bind(event.page_id)
        .bind(event.block_id)
        .bind(event.kind.as_str())
        .bind(&event.referrer)
        .bind(event.utm.as_ref().map(Json))
        .bind(Json(&event.device))
        .bind(&event.user_agent)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| dangling_event_target(err, &event))?;
        Ok(())
    }

    async fn count_by_kind(&self, page_ids: &[Uuid], kind: EventKind) -> anyhow::Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE page_id = ANY($1) AND kind = $2")
            .bind(page_ids)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn views_by_day(&self, page_ids: &[Uuid], since: DateTime<Utc>) -> anyhow::Result<Vec<DailyCount>> {
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) \
             FROM events WHERE page_id = ANY($1) AND kind = 'view' AND created_at >= $2 \
             GROUP BY day ORDER BY day",
        )
        .bind(page_ids)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(date, n)| DailyCount { date, count: u64::try_from(n).unwrap_or(0) })
            .collect())
    }

    async fn clicks_by_block(&self, page_ids: &[Uuid]) -> anyhow::Result<Vec<(Uuid, u64)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT block_id, COUNT(*) FROM events \
             WHERE page_id = ANY($1) AND kind = 'click' AND block_id IS NOT NULL \
             GROUP BY block_id",
        )
        .bind(page_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id, n)| (id, u64::try_from(n).unwrap_or(0))).collect())
    }

    async fn list_events(&self, page_id: Uuid) -> anyhow::Result<Vec<Event>> {
        sqlx::query(
            "SELECT id, page_id, block_id, kind, referrer, utm, device, user_agent, created_at \
             FROM events WHERE page_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(event_from_row)
        .collect()
    }
}
