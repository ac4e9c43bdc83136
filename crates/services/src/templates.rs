//! Built-in page templates.
//!
//! A template is a starting set of blocks. Instantiating one copies its
//! blocks onto a new page with orders `0..n`; nothing links the page back to
//! the template afterwards.

use chrono::{DateTime, Utc};
use domains::{Block, BlockContent, BlockKind, BlockStyle, PageKind};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct TemplateBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub content: Value,
    pub style: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: PageKind,
    pub blocks: Vec<TemplateBlock>,
}

impl Template {
    /// Materializes the template's blocks for `page_id`. Content and style go
    /// through the same parsers as editor input.
    pub fn instantiate(&self, page_id: Uuid, now: DateTime<Utc>) -> domains::Result<Vec<Block>> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(order, tb)| {
                let mut block = Block::new(page_id, tb.kind, now);
                block.content = BlockContent::parse(tb.kind, &tb.content)?.to_value();
                block.style = serde_json::to_value(BlockStyle::parse(&tb.style)?)
                    .map_err(|e| domains::AppError::Storage(e.into()))?;
                block.order = order as u32;
                Ok(block)
            })
            .collect()
    }
}

fn block(kind: BlockKind, content: Value, style: Value) -> TemplateBlock {
    TemplateBlock { kind, content, style }
}

static CATALOG: Lazy<Vec<Template>> = Lazy::new(|| {
    vec![
        Template {
            id: "bio-minimal",
            name: "Minimal",
            description: "Clean and simple with header + 3 links",
            kind: PageKind::Bio,
            blocks: vec![
                block(
                    BlockKind::Header,
                    json!({ "title": "Your Name", "bio": "Bio description goes here", "avatar": "" }),
                    json!({ "alignment": "center", "fontSize": "large" }),
                ),
                block(BlockKind::Link, json!({ "title": "Link 1", "url": "https://example.com" }), json!({ "variant": "primary" })),
                block(BlockKind::Link, json!({ "title": "Link 2", "url": "https://example.com" }), json!({ "variant": "secondary" })),
                block(BlockKind::Link, json!({ "title": "Link 3", "url": "https://example.com" }), json!({ "variant": "secondary" })),
            ],
        },
        Template {
            id: "bio-complete",
            name: "Complete",
            description: "Full profile with header, links, CTA and social media",
            kind: PageKind::Bio,
            blocks: vec![
                block(
                    BlockKind::Header,
                    json!({ "title": "Your Name", "bio": "Creator | Entrepreneur | Content Creator", "avatar": "" }),
                    json!({ "alignment": "center", "fontSize": "large" }),
                ),
                block(BlockKind::Link, json!({ "title": "My Website", "url": "https://example.com" }), json!({ "variant": "featured" })),
                block(
                    BlockKind::Link,
                    json!({ "title": "Portfolio", "url": "https://example.com/portfolio" }),
                    json!({ "variant": "primary" }),
                ),
                block(BlockKind::Link, json!({ "title": "Blog", "url": "https://example.com/blog" }), json!({ "variant": "secondary" })),
                block(
                    BlockKind::Cta,
                    json!({ "title": "Book a Consultation", "url": "https://calendly.com/yourname", "icon": "calendar" }),
                    json!({ "variant": "primary", "size": "large" }),
                ),
                block(
                    BlockKind::Social,
                    json!({ "platforms": [
                        { "name": "instagram", "url": "https://instagram.com/yourname" },
                        { "name": "twitter", "url": "https://twitter.com/yourname" },
                        { "name": "youtube", "url": "https://youtube.com/yourname" },
                        { "name": "tiktok", "url": "https://tiktok.com/@yourname" }
                    ] }),
                    json!({ "size": "medium", "alignment": "center" }),
                ),
            ],
        },
        Template {
            id: "offer-simple",
            name: "Simple Offer",
            description: "Clean landing page with hero, features and CTA",
            kind: PageKind::Offer,
            blocks: vec![
                block(
                    BlockKind::Header,
                    json!({ "title": "Your Offer", "bio": "Transform your life with our premium service" }),
                    json!({ "alignment": "center", "fontSize": "large" }),
                ),
                block(
                    BlockKind::Text,
                    json!({
                        "title": "Why Choose Us?",
                        "body": "We provide exceptional quality and service that exceeds expectations."
                    }),
                    json!({ "alignment": "center", "fontSize": "medium" }),
                ),
                block(
                    BlockKind::Text,
                    json!({
                        "title": "What You'll Get",
                        "body": "Premium quality service\nFast delivery\nFull support\nSatisfaction guaranteed"
                    }),
                    json!({ "alignment": "left", "fontSize": "medium" }),
                ),
                block(
                    BlockKind::Cta,
                    json!({ "title": "Get Started Now", "url": "https://example.com/start", "icon": "arrow-right" }),
                    json!({ "variant": "primary", "size": "large" }),
                ),
            ],
        },
    ]
});

pub fn catalog() -> &'static [Template] {
    &CATALOG
}

pub fn find(id: &str) -> Option<&'static Template> {
    CATALOG.iter().find(|t| t.id == id)
}
