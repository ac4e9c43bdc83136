//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Bio.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// What a page is for. Decides which templates apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Bio,
    Offer,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bio => "bio",
            Self::Offer => "offer",
        }
    }
}

impl FromStr for PageKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bio" => Ok(Self::Bio),
            "offer" => Ok(Self::Offer),
            other => Err(AppError::validation(format!("unknown page kind '{other}'"))),
        }
    }
}

/// Visual theme applied when the page is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Luxury,
    Neon,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Luxury => "luxury",
            Self::Neon => "neon",
        }
    }
}

impl FromStr for Theme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "luxury" => Ok(Self::Luxury),
            "neon" => Ok(Self::Neon),
            other => Err(AppError::validation(format!("invalid theme '{other}'"))),
        }
    }
}

/// A creator-owned publishable surface (e.g., /alice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    /// Opaque user reference handed to us by the auth collaborator
    pub owner_id: String,
    /// Public handle, lowercase and globally unique
    pub handle: String,
    pub kind: PageKind,
    pub title: String,
    pub description: Option<String>,
    pub theme: Theme,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Header,
    Link,
    Cta,
    Social,
    Embed,
    Text,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Link => "link",
            Self::Cta => "cta",
            Self::Social => "social",
            Self::Embed => "embed",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "header" => Ok(Self::Header),
            "link" => Ok(Self::Link),
            "cta" => Ok(Self::Cta),
            "social" => Ok(Self::Social),
            "embed" => Ok(Self::Embed),
            "text" => Ok(Self::Text),
            other => Err(AppError::validation(format!("unknown block type '{other}'"))),
        }
    }
}

/// One ordered content unit within a Page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub page_id: Uuid,
    pub kind: BlockKind,
    /// Stored payload. Always written through `BlockContent` validation,
    /// but read back as raw JSON so one bad row never poisons a listing.
    pub content: serde_json::Value,
    /// Presentation hints (see `BlockStyle`)
    pub style: serde_json::Value,
    /// Position on the page. Contiguous only right after a reorder.
    pub order: u32,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Block {
    /// A fresh, visible block with empty content. The repository assigns `order`.
    pub fn new(page_id: Uuid, kind: BlockKind, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            page_id,
            kind,
            content: serde_json::json!({}),
            style: serde_json::json!({}),
            order: 0,
            visible: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    View,
    Click,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Click => "click",
        }
    }
}

impl FromStr for EventKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "click" => Ok(Self::Click),
            other => Err(AppError::validation(format!("unknown event type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperatingSystem {
    Windows,
    MacOS,
    Linux,
    Android,
    #[serde(rename = "iOS")]
    Ios,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Browser {
    Chrome,
    Safari,
    Firefox,
    Edge,
    Opera,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

/// Coarse, heuristic device classification. Not a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub os: OperatingSystem,
    pub browser: Browser,
}

/// Append-only interaction fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub page_id: Uuid,
    /// `None` for page views, and for clicks whose block was since deleted
    pub block_id: Option<Uuid>,
    pub kind: EventKind,
    pub referrer: Option<String>,
    pub utm: Option<BTreeMap<String, String>>,
    pub device: DeviceInfo,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw view/click totals over a set of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventTotals {
    pub views: u64,
    pub clicks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// A block's row in the "top blocks" ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockClicks {
    pub block_id: Uuid,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub label: String,
    pub clicks: u64,
}

/// Everything the analytics dashboard shows for one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_views: u64,
    pub total_clicks: u64,
    pub ctr: f64,
    pub views_by_day: Vec<DailyCount>,
    pub blocks_by_clicks: Vec<BlockClicks>,
}
