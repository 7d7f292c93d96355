//! Domain entities mirrored from the origin's records.

use serde::{Deserialize, Serialize};

use crate::domain::types::ItemKind;

/// A single content node: story, comment, job, poll or poll option.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub by: Option<String>,
    #[serde(default)]
    pub time: i64,
    pub title: Option<String>,
    pub text: Option<String>,
    pub score: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    pub url: Option<String>,
    #[serde(default)]
    pub kids: Vec<u64>,
    #[serde(default)]
    pub parts: Vec<u64>,
    pub descendants: Option<u64>,
}

impl Item {
    pub fn is_poll(&self) -> bool {
        self.kind == ItemKind::Poll
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub karma: i64,
    pub about: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_decodes_sparse_origin_record() {
        let item: Item = serde_json::from_str(
            r#"{"id":8863,"by":"dhouston","time":1175714200,"type":"story","title":"My YC app"}"#,
        )
        .expect("item");

        assert_eq!(item.id, 8863);
        assert_eq!(item.kind, ItemKind::Story);
        assert!(item.kids.is_empty());
        assert!(item.parts.is_empty());
        assert!(!item.deleted);
        assert_eq!(item.score, None);
        assert_eq!(item.url, None);
    }

    #[test]
    fn poll_detection_uses_type_tag() {
        let item = Item {
            kind: ItemKind::Poll,
            parts: vec![1, 2],
            ..Default::default()
        };
        assert!(item.is_poll());
    }
}
