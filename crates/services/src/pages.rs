//! Page lifecycle and the public render path.

use chrono::{DateTime, Utc};
use domains::{AppError, Block, Clock, Page, PageKind, PageRepo, RequestContext, Theme};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::access::owned_page;
use crate::bounded::bounded;
use crate::ingestion::IngestionService;
use crate::templates;

static HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,30}$").expect("handle pattern"));

/// Top-level paths the router serves itself; a page there would never render.
const RESERVED_HANDLES: &[&str] = &["api", "healthz", "metrics"];

const MIN_TITLE_CHARS: usize = 2;

/// Input for `create_page`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPage {
    pub handle: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ignored when a template is given; the template decides the kind.
    #[serde(default, rename = "type")]
    pub kind: Option<PageKind>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub theme: Option<Theme>,
}

/// Owner-editable page settings. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PagePatch {
    #[serde(default)]
    pub is_published: Option<bool>,
    #[serde(default)]
    pub theme: Option<Theme>,
}

/// What a visitor sees: the page plus its visible blocks in display order.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPage {
    pub page: Page,
    pub blocks: Vec<Block>,
}

pub struct PageService {
    pages: Arc<dyn PageRepo>,
    ingestion: Arc<IngestionService>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl PageService {
    pub fn new(
        pages: Arc<dyn PageRepo>,
        ingestion: Arc<IngestionService>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self { pages, ingestion, clock, timeout }
    }

    /// Creates an unpublished page, seeded from a template when one is named.
    pub async fn create_page(&self, owner_id: &str, input: NewPage) -> domains::Result<Page> {
        if !HANDLE.is_match(&input.handle) {
            return Err(AppError::validation(
                "handle must be 3-30 characters of letters, digits, '_' or '-'",
            ));
        }
        let title = input.title.trim();
        if title.chars().count() < MIN_TITLE_CHARS {
            return Err(AppError::validation("title must be at least 2 characters"));
        }
        let handle = input.handle.to_lowercase();
        if RESERVED_HANDLES.contains(&handle.as_str()) {
            return Err(AppError::Conflict(format!("handle '{handle}' is reserved")));
        }

        let template = match input.template_id.as_deref() {
            Some(id) => Some(
                templates::find(id).ok_or_else(|| AppError::validation(format!("unknown template '{id}'")))?,
            ),
            None => None,
        };

        if bounded(self.timeout, self.pages.get_page_by_handle(&handle)).await?.is_some() {
            return Err(AppError::Conflict(format!("handle '{handle}' is already taken")));
        }

        let now = self.clock.now();
        let page = Page {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            handle,
            kind: template.map(|t| t.kind).or(input.kind).unwrap_or(PageKind::Bio),
            title: title.to_string(),
            description: input.description.filter(|d| !d.trim().is_empty()),
            theme: input.theme.unwrap_or_default(),
            is_published: false,
            created_at: now,
            updated_at: now,
        };
        let blocks = match template {
            Some(t) => t.instantiate(page.id, now)?,
            None => Vec::new(),
        };

        let block_count = blocks.len();
        bounded(self.timeout, self.pages.insert_page(page.clone(), blocks)).await?;
        tracing::info!(page_id = %page.id, handle = %page.handle, blocks = block_count, "page created");
        Ok(page)
    }

    pub async fn list_pages(&self, owner_id: &str) -> domains::Result<Vec<Page>> {
        bounded(self.timeout, self.pages.list_pages_by_owner(owner_id)).await
    }

    /// Applies `patch` with a single write.
    pub async fn update(&self, owner_id: &str, page_id: Uuid, patch: &PagePatch) -> domains::Result<Page> {
        if patch.is_published.is_none() && patch.theme.is_none() {
            return Err(AppError::validation("nothing to update"));
        }
        let mut page = owned_page(self.pages.as_ref(), owner_id, page_id, self.timeout).await?;
        if let Some(published) = patch.is_published {
            page.is_published = published;
        }
        if let Some(theme) = patch.theme {
            page.theme = theme;
        }
        self.save(&mut page, self.clock.now()).await?;
        if let Some(published) = patch.is_published {
            tracing::info!(%page_id, published, "page visibility changed");
        }
        Ok(page)
    }

    pub async fn set_published(&self, owner_id: &str, page_id: Uuid, published: bool) -> domains::Result<Page> {
        self.update(owner_id, page_id, &PagePatch { is_published: Some(published), theme: None }).await
    }

    pub async fn set_theme(&self, owner_id: &str, page_id: Uuid, theme: Theme) -> domains::Result<Page> {
        self.update(owner_id, page_id, &PagePatch { is_published: None, theme: Some(theme) }).await
    }

    /// Deletes the page with its blocks and events.
    pub async fn delete_page(&self, owner_id: &str, page_id: Uuid) -> domains::Result<()> {
        owned_page(self.pages.as_ref(), owner_id, page_id, self.timeout).await?;
        bounded(self.timeout, self.pages.delete_page(page_id)).await?;
        tracing::info!(%page_id, "page deleted");
        Ok(())
    }

    /// Loads a page for display and counts the view.
    ///
    /// Unpublished pages exist only for their owner. Views are recorded for
    /// published pages only, and a view that cannot be recorded (rate limit
    /// or storage) never stops the page from rendering.
    pub async fn load_public(
        &self,
        handle: &str,
        viewer: Option<&str>,
        ctx: &RequestContext,
    ) -> domains::Result<PublicPage> {
        let handle = handle.to_lowercase();
        let page = bounded(self.timeout, self.pages.get_page_by_handle(&handle))
            .await?
            .filter(|p| p.is_published || viewer == Some(p.owner_id.as_str()))
            .ok_or_else(|| AppError::not_found("Page", &handle))?;

        let mut blocks = bounded(self.timeout, self.pages.list_blocks(page.id)).await?;
        blocks.retain(|b| b.visible);
        blocks.sort_by_key(|b| b.order);

        if page.is_published {
            if let Err(err) = self.ingestion.record_view(page.id, ctx).await {
                match err {
                    AppError::RateLimited { .. } => {}
                    other => tracing::warn!(page_id = %page.id, error = %other, "view not recorded"),
                }
            }
        }

        Ok(PublicPage { page, blocks })
    }

    async fn save(&self, page: &mut Page, now: DateTime<Utc>) -> domains::Result<()> {
        page.updated_at = now;
        bounded(self.timeout, self.pages.update_page(page.clone())).await
    }
}
