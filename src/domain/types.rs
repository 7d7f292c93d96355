//! Shared domain enumerations aligned with the origin's item and list vocabulary.

use serde::{Deserialize, Serialize};

/// Item type tag as reported by the origin. Tags outside the known set are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Story,
    Comment,
    Job,
    Poll,
    #[serde(rename = "pollopt")]
    PollOption,
    #[serde(untagged)]
    Other(String),
}

impl Default for ItemKind {
    fn default() -> Self {
        ItemKind::Other(String::new())
    }
}

impl ItemKind {
    pub fn as_str(&self) -> &str {
        match self {
            ItemKind::Story => "story",
            ItemKind::Comment => "comment",
            ItemKind::Job => "job",
            ItemKind::Poll => "poll",
            ItemKind::PollOption => "pollopt",
            ItemKind::Other(tag) => tag,
        }
    }

    /// Label used in rendered output; stories are presented as links.
    pub fn display_name(&self) -> &str {
        match self {
            ItemKind::Story => "link",
            other => other.as_str(),
        }
    }
}

/// Story listings exposed by the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    News,
    Newest,
    Best,
    Ask,
    Show,
    Jobs,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::News,
        Category::Newest,
        Category::Best,
        Category::Ask,
        Category::Show,
        Category::Jobs,
    ];

    /// Public name, also the cache key prefix for the listing.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::News => "news",
            Category::Newest => "newest",
            Category::Best => "best",
            Category::Ask => "ask",
            Category::Show => "show",
            Category::Jobs => "jobs",
        }
    }

    /// Name of the origin collection holding the ordered story ids.
    pub fn endpoint(self) -> &'static str {
        match self {
            Category::News => "topstories",
            Category::Newest => "newstories",
            Category::Best => "beststories",
            Category::Ask => "askstories",
            Category::Show => "showstories",
            Category::Jobs => "jobstories",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
    }
}
