#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use hnproxy::{
    application::source::{ItemSource, SourceError},
    domain::{
        entities::{Item, User},
        types::{Category, ItemKind},
    },
};

/// Scriptable origin: items answer after an optional delay, never, or with
/// an error.
#[derive(Default)]
pub struct FakeSource {
    items: HashMap<u64, Item>,
    delays: HashMap<u64, Duration>,
    hanging: HashSet<u64>,
    failing: HashSet<u64>,
    lists: HashMap<Category, Vec<u64>>,
    users: HashMap<String, User>,
    item_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.insert(item.id, item);
        self
    }

    pub fn with_delay(mut self, id: u64, delay: Duration) -> Self {
        self.delays.insert(id, delay);
        self
    }

    /// `id` never answers.
    pub fn with_hanging(mut self, id: u64) -> Self {
        self.hanging.insert(id);
        self
    }

    pub fn with_failure(mut self, id: u64) -> Self {
        self.failing.insert(id);
        self
    }

    pub fn with_list(mut self, category: Category, ids: Vec<u64>) -> Self {
        self.lists.insert(category, ids);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ItemSource for FakeSource {
    async fn fetch_item(&self, id: u64) -> Result<Option<Item>, SourceError> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.contains(&id) {
            futures::future::pending::<()>().await;
        }
        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&id) {
            return Err(SourceError::transport(format!("connection reset on {id}")));
        }
        Ok(self.items.get(&id).cloned())
    }

    async fn fetch_story_ids(&self, category: Category) -> Result<Vec<u64>, SourceError> {
        Ok(self.lists.get(&category).cloned().unwrap_or_default())
    }

    async fn fetch_user(&self, id: &str) -> Result<Option<User>, SourceError> {
        Ok(self.users.get(id).cloned())
    }
}

pub fn story(id: u64, title: &str, kids: Vec<u64>) -> Item {
    Item {
        id,
        by: Some("pg".to_string()),
        time: 1_175_714_200,
        title: Some(title.to_string()),
        score: Some(57),
        kind: ItemKind::Story,
        url: Some(format!("https://www.example.com/{id}")),
        kids,
        ..Default::default()
    }
}

pub fn comment(id: u64, text: &str, kids: Vec<u64>) -> Item {
    Item {
        id,
        by: Some("norvig".to_string()),
        time: 1_175_714_300,
        text: Some(text.to_string()),
        kind: ItemKind::Comment,
        kids,
        ..Default::default()
    }
}
