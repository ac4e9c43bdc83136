//! # Block Content
//!
//! Typed payloads for each `BlockKind`. Raw JSON from the editor is decoded
//! into the variant matching the block's kind, then every navigable URL is
//! checked before anything is persisted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::BlockKind;

/// Label used for social blocks in click rankings.
pub const SOCIAL_LABEL: &str = "Social Icons";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Image source. Validated like a link so `data:`/`javascript:` never render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Shared by `link` and `cta` blocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialPlatform {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialContent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<SocialPlatform>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbedContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Content payload, discriminated by the owning block's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Header(HeaderContent),
    Link(LinkContent),
    Cta(LinkContent),
    Social(SocialContent),
    Embed(EmbedContent),
    Text(TextContent),
}

impl BlockContent {
    /// Decodes and validates a proposed payload. This is the only way
    /// editor input becomes storable content.
    pub fn parse(kind: BlockKind, raw: &Value) -> Result<Self> {
        let content = Self::decode(kind, raw)
            .map_err(|e| AppError::validation(format!("invalid {kind} content: {e}")))?;
        content.validate()?;
        Ok(content)
    }

    /// Structural decode only. Used on the read path where stored rows are
    /// already trusted but may predate the current schema.
    pub fn decode(kind: BlockKind, raw: &Value) -> serde_json::Result<Self> {
        fn from<T: DeserializeOwned>(raw: &Value) -> serde_json::Result<T> {
            T::deserialize(raw)
        }
        Ok(match kind {
            BlockKind::Header => Self::Header(from(raw)?),
            BlockKind::Link => Self::Link(from(raw)?),
            BlockKind::Cta => Self::Cta(from(raw)?),
            BlockKind::Social => Self::Social(from(raw)?),
            BlockKind::Embed => Self::Embed(from(raw)?),
            BlockKind::Text => Self::Text(from(raw)?),
        })
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Header(_) => BlockKind::Header,
            Self::Link(_) => BlockKind::Link,
            Self::Cta(_) => BlockKind::Cta,
            Self::Social(_) => BlockKind::Social,
            Self::Embed(_) => BlockKind::Embed,
            Self::Text(_) => BlockKind::Text,
        }
    }

    /// Every field a visitor's browser would navigate to or fetch.
    fn url_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Header(c) => c.avatar.as_deref().map(|u| ("avatar", u)).into_iter().collect(),
            Self::Link(c) | Self::Cta(c) => c.url.as_deref().map(|u| ("url", u)).into_iter().collect(),
            Self::Embed(c) => c.url.as_deref().map(|u| ("url", u)).into_iter().collect(),
            Self::Social(c) => c.platforms.iter().map(|p| ("platforms.url", p.url.as_str())).collect(),
            Self::Text(_) => Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in self.url_fields() {
            validate_url(field, value)?;
        }
        Ok(())
    }

    /// Human label for analytics. `None` means "use the block type name".
    pub fn label(&self) -> Option<&str> {
        let label = match self {
            Self::Link(c) | Self::Cta(c) => c.title.as_deref(),
            Self::Header(c) => c.title.as_deref(),
            Self::Social(_) => Some(SOCIAL_LABEL),
            Self::Embed(_) | Self::Text(_) => None,
        };
        label.filter(|l| !l.trim().is_empty())
    }

    pub fn to_value(&self) -> Value {
        let value = match self {
            Self::Header(c) => serde_json::to_value(c),
            Self::Link(c) | Self::Cta(c) => serde_json::to_value(c),
            Self::Social(c) => serde_json::to_value(c),
            Self::Embed(c) => serde_json::to_value(c),
            Self::Text(c) => serde_json::to_value(c),
        };
        // Plain structs of strings always serialize.
        value.unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// Accepts absolute `http`/`https` URLs only. Empty strings mean "unset".
pub fn validate_url(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Ok(());
    }
    let parsed = Url::parse(value)
        .map_err(|_| AppError::validation(format!("{field}: '{value}' is not an absolute URL")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(()),
        "http" | "https" => Err(AppError::validation(format!("{field}: URL has no host"))),
        scheme => Err(AppError::validation(format!(
            "{field}: scheme '{scheme}' is not allowed, only http:// and https:// URLs are"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Primary,
    Secondary,
    Featured,
}

/// Presentation hints. Closed set, so no free-form CSS reaches the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BlockStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

impl BlockStyle {
    pub fn parse(raw: &Value) -> Result<Self> {
        Self::deserialize(raw).map_err(|e| AppError::validation(format!("invalid style: {e}")))
    }
}
