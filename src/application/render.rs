//! Formatting pass turning resolved origin records into response payloads.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::application::fetcher::ResolvedTree;
use crate::domain::entities::{Item, User};
use crate::domain::types::ItemKind;
use crate::util::relative_time::time_ago;

const DELETED_CONTENT: &str = "[deleted]";

/// Item detail with its comment tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedItem {
    pub id: u64,
    pub title: Option<String>,
    pub points: Option<i64>,
    pub user: Option<String>,
    pub time: i64,
    pub time_ago: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub content: Option<String>,
    pub deleted: bool,
    pub dead: bool,
    pub comments_count: usize,
    pub comments: Vec<RenderedComment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Vec<PollOption>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedComment {
    pub id: u64,
    pub level: usize,
    pub user: Option<String>,
    pub time: i64,
    pub time_ago: String,
    pub content: Option<String>,
    pub deleted: bool,
    pub dead: bool,
    pub comments: Vec<RenderedComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub item: Option<String>,
    pub points: Option<i64>,
}

/// Flat listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedItem {
    pub id: u64,
    pub title: Option<String>,
    pub points: Option<i64>,
    pub user: Option<String>,
    pub time: i64,
    pub time_ago: String,
    pub comments_count: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedUser {
    pub id: String,
    pub created_time: i64,
    pub created: String,
    pub karma: i64,
    pub avg: Option<f64>,
    pub about: Option<String>,
}

/// Fields shared by item details and listing entries.
struct Headline {
    title: Option<String>,
    points: Option<i64>,
    user: Option<String>,
    kind: String,
    url: String,
    domain: Option<String>,
}

impl Headline {
    fn from_item(item: &Item) -> Self {
        let (url, domain) = match item.url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => (url.to_string(), domain_of(url)),
            None => (format!("item?id={}", item.id), None),
        };

        let is_job = item.kind == ItemKind::Job;
        let is_local = domain.is_none() && url.starts_with("item");
        let asks = item
            .title
            .as_deref()
            .is_some_and(|title| starts_with_ignore_case(title, "ask"));
        let kind = if item.kind == ItemKind::Story && is_local && asks {
            "ask".to_string()
        } else {
            item.kind.display_name().to_string()
        };

        Self {
            title: item.title.as_deref().map(decode_entities),
            points: if is_job { None } else { item.score },
            user: if is_job { None } else { item.by.clone() },
            kind,
            url,
            domain,
        }
    }
}

/// Render a resolved tree. `comments_count` counts only the comment nodes that
/// made it into the tree.
pub fn render_tree(tree: &ResolvedTree, now: i64) -> RenderedItem {
    let item = &tree.item;
    let headline = Headline::from_item(item);
    let (comments, comments_count) = render_comments(&tree.comments, 0, now);

    let poll = (!tree.parts.is_empty()).then(|| {
        tree.parts
            .iter()
            .map(|part| PollOption {
                item: part
                    .title
                    .as_deref()
                    .or(part.text.as_deref())
                    .map(decode_entities),
                points: part.score,
            })
            .collect()
    });

    RenderedItem {
        id: item.id,
        title: headline.title,
        points: headline.points,
        user: headline.user,
        time: item.time,
        time_ago: time_ago(item.time, now),
        kind: headline.kind,
        url: headline.url,
        domain: headline.domain,
        content: content_of(item),
        deleted: item.deleted,
        dead: item.dead,
        comments_count,
        comments,
        poll,
    }
}

fn render_comments(
    nodes: &[ResolvedTree],
    level: usize,
    now: i64,
) -> (Vec<RenderedComment>, usize) {
    let mut total = nodes.len();
    let rendered: Vec<RenderedComment> = nodes
        .iter()
        .map(|node| {
            let (comments, nested) = render_comments(&node.comments, level + 1, now);
            total += nested;
            RenderedComment {
                id: node.item.id,
                level,
                user: node.item.by.clone(),
                time: node.item.time,
                time_ago: time_ago(node.item.time, now),
                content: content_of(&node.item),
                deleted: node.item.deleted,
                dead: node.item.dead,
                comments,
            }
        })
        .collect();
    (rendered, total)
}

pub fn render_listed(item: &Item, now: i64) -> ListedItem {
    let headline = Headline::from_item(item);
    ListedItem {
        id: item.id,
        title: headline.title,
        points: headline.points,
        user: headline.user,
        time: item.time,
        time_ago: time_ago(item.time, now),
        comments_count: item.descendants.unwrap_or(0),
        kind: headline.kind,
        url: headline.url,
        domain: headline.domain,
    }
}

pub fn render_user(user: &User, now: i64) -> RenderedUser {
    RenderedUser {
        id: user.id.clone(),
        created_time: user.created,
        created: time_ago(user.created, now),
        karma: user.karma,
        avg: None,
        about: user.about.as_deref().map(clean_text),
    }
}

fn content_of(item: &Item) -> Option<String> {
    if item.deleted {
        return Some(DELETED_CONTENT.to_string());
    }
    item.text.as_deref().map(clean_text)
}

/// Normalize origin HTML: drop closing paragraph tags and make sure the body
/// opens with one.
pub fn clean_text(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut cleaned = String::with_capacity(html.len() + 3);
    if !lower.starts_with("<p>") {
        cleaned.push_str("<p>");
    }

    let mut cursor = 0;
    while let Some(offset) = lower[cursor..].find("</p>") {
        cleaned.push_str(&html[cursor..cursor + offset]);
        cursor += offset + "</p>".len();
    }
    cleaned.push_str(&html[cursor..]);
    cleaned
}

fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = if starts_with_ignore_case(host, "www.") {
        &host[4..]
    } else {
        host
    };
    Some(host.to_string())
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn story(id: u64) -> Item {
        Item {
            id,
            by: Some("pg".to_string()),
            time: NOW - 3_600,
            title: Some("Show &amp; tell".to_string()),
            score: Some(42),
            kind: ItemKind::Story,
            url: Some("https://www.example.com/post".to_string()),
            ..Default::default()
        }
    }

    fn comment(id: u64, text: &str) -> Item {
        Item {
            id,
            by: Some("dang".to_string()),
            time: NOW - 60,
            text: Some(text.to_string()),
            kind: ItemKind::Comment,
            ..Default::default()
        }
    }

    fn leaf(item: Item) -> ResolvedTree {
        ResolvedTree {
            item,
            comments: Vec::new(),
            parts: Vec::new(),
        }
    }

    #[test]
    fn linked_story_keeps_url_and_strips_www_from_domain() {
        let rendered = render_tree(&leaf(story(1)), NOW);

        assert_eq!(rendered.url, "https://www.example.com/post");
        assert_eq!(rendered.domain.as_deref(), Some("example.com"));
        assert_eq!(rendered.kind, "link");
        assert_eq!(rendered.title.as_deref(), Some("Show & tell"));
        assert_eq!(rendered.time_ago, "an hour ago");
    }

    #[test]
    fn story_without_url_links_locally_and_omits_domain() {
        let item = Item {
            url: None,
            ..story(7)
        };
        let rendered = render_tree(&leaf(item), NOW);

        assert_eq!(rendered.url, "item?id=7");
        assert!(rendered.domain.is_none());

        let json = serde_json::to_value(&rendered).expect("json");
        assert!(json.get("domain").is_none());
    }

    #[test]
    fn local_story_titled_ask_is_retagged() {
        let item = Item {
            url: None,
            title: Some("ASK HN: How do you cache?".to_string()),
            ..story(9)
        };
        assert_eq!(render_listed(&item, NOW).kind, "ask");

        let linked = Item {
            title: Some("Ask me anything".to_string()),
            ..story(10)
        };
        assert_eq!(render_listed(&linked, NOW).kind, "link");
    }

    #[test]
    fn jobs_hide_user_and_points() {
        let item = Item {
            kind: ItemKind::Job,
            ..story(3)
        };
        let rendered = render_tree(&leaf(item.clone()), NOW);
        assert_eq!(rendered.user, None);
        assert_eq!(rendered.points, None);
        assert_eq!(rendered.kind, "job");

        let listed = render_listed(&item, NOW);
        assert_eq!(listed.user, None);
        assert_eq!(listed.points, None);

        let json = serde_json::to_value(&listed).expect("json");
        assert!(json["user"].is_null());
        assert!(json["points"].is_null());
    }

    #[test]
    fn comment_levels_and_count_follow_rendered_nodes() {
        let tree = ResolvedTree {
            item: story(1),
            comments: vec![
                ResolvedTree {
                    item: comment(2, "first"),
                    comments: vec![leaf(comment(4, "reply"))],
                    parts: Vec::new(),
                },
                leaf(comment(3, "second")),
            ],
            parts: Vec::new(),
        };
        let rendered = render_tree(&tree, NOW);

        assert_eq!(rendered.comments_count, 3);
        assert_eq!(rendered.comments[0].level, 0);
        assert_eq!(rendered.comments[0].comments[0].level, 1);
        assert_eq!(rendered.comments[0].comments[0].id, 4);
        assert!(rendered.comments[1].comments.is_empty());
        assert_eq!(rendered.comments[0].content.as_deref(), Some("<p>first"));
    }

    #[test]
    fn deleted_items_render_placeholder_content() {
        let item = Item {
            deleted: true,
            text: Some("gone".to_string()),
            ..comment(5, "gone")
        };
        assert_eq!(content_of(&item).as_deref(), Some("[deleted]"));
    }

    #[test]
    fn poll_parts_render_text_and_score() {
        let option = Item {
            id: 11,
            text: Some("Rust".to_string()),
            score: Some(12),
            kind: ItemKind::PollOption,
            ..Default::default()
        };
        let tree = ResolvedTree {
            item: Item {
                kind: ItemKind::Poll,
                parts: vec![11],
                ..story(10)
            },
            comments: Vec::new(),
            parts: vec![option],
        };

        let rendered = render_tree(&tree, NOW);
        assert_eq!(
            rendered.poll,
            Some(vec![PollOption {
                item: Some("Rust".to_string()),
                points: Some(12),
            }])
        );
    }

    #[test]
    fn clean_text_drops_closing_paragraphs() {
        assert_eq!(clean_text("one<p>two</p>"), "<p>one<p>two");
        assert_eq!(clean_text("<P>already</P>"), "<P>already");
    }

    #[test]
    fn user_profile_renders_relative_creation() {
        let user = User {
            id: "pg".to_string(),
            created: NOW - 2 * 86_400,
            karma: 155_000,
            about: Some("Bug fixer.".to_string()),
        };
        let rendered = render_user(&user, NOW);
        assert_eq!(rendered.created, "2 days ago");
        assert_eq!(rendered.avg, None);
        assert_eq!(rendered.about.as_deref(), Some("<p>Bug fixer."));
    }
}
