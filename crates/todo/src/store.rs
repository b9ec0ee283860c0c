//! In-memory to-do storage keyed by generated ids.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

/// Body of a create request. A client-supplied `id` is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Partial update: only the fields present are changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoUpdate {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Default)]
struct Inner {
    items: HashMap<String, (u64, TodoItem)>,
    next_seq: u64,
}

/// Thread-safe store. Listing returns items in creation order.
#[derive(Default)]
pub struct TodoStore {
    inner: RwLock<Inner>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, new: NewTodo) -> TodoItem {
        let item = TodoItem {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            completed: new.completed,
        };
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.items.insert(item.id.clone(), (seq, item.clone()));
        item
    }

    pub async fn list(&self) -> Vec<TodoItem> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner.items.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, item)| item.clone()).collect()
    }

    pub async fn get(&self, id: &str) -> Option<TodoItem> {
        self.inner.read().await.items.get(id).map(|(_, item)| item.clone())
    }

    pub async fn update(&self, id: &str, update: TodoUpdate) -> Option<TodoItem> {
        let mut inner = self.inner.write().await;
        let (_, item) = inner.items.get_mut(id)?;
        if let Some(title) = update.title {
            item.title = title;
        }
        if let Some(completed) = update.completed {
            item.completed = completed;
        }
        Some(item.clone())
    }

    /// Returns whether an item was removed.
    pub async fn delete(&self, id: &str) -> bool {
        self.inner.write().await.items.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }
}
