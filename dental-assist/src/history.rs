use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;

use crate::models::{ChatExchange, ReimbursementEntry};
use crate::storage::{LocalStorage, keys};

pub const CHAT_HISTORY_LIMIT: usize = 50;
pub const REIMBURSEMENT_HISTORY_LIMIT: usize = 10;

/// Where new entries go. The oldest entries are the ones discarded either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    /// Chronological: append at the end, drop from the front.
    OldestFirst,
    /// Most recent first: insert at the front, drop from the back.
    NewestFirst,
}

/// Add `entry` and trim `history` down to `limit` by discarding the oldest
/// entries.
pub fn push_capped<T>(history: &mut Vec<T>, entry: T, limit: usize, order: HistoryOrder) {
    match order {
        HistoryOrder::OldestFirst => {
            history.push(entry);
            if history.len() > limit {
                history.drain(..history.len() - limit);
            }
        }
        HistoryOrder::NewestFirst => {
            history.insert(0, entry);
            history.truncate(limit);
        }
    }
}

/// A capped list persisted under one storage key.
pub struct HistoryLog<T> {
    storage: LocalStorage,
    key: &'static str,
    limit: usize,
    order: HistoryOrder,
    _entry: PhantomData<fn() -> T>,
}

impl<T> Clone for HistoryLog<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            key: self.key,
            limit: self.limit,
            order: self.order,
            _entry: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> HistoryLog<T> {
    pub fn new(storage: LocalStorage, key: &'static str, limit: usize, order: HistoryOrder) -> Self {
        Self {
            storage,
            key,
            limit,
            order,
            _entry: PhantomData,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn load(&self) -> Vec<T> {
        self.storage.get(self.key, Vec::new()).await
    }

    /// Add an entry, persist, and return the updated list.
    pub async fn record(&self, entry: T) -> Vec<T> {
        let mut history = self.load().await;
        push_capped(&mut history, entry, self.limit, self.order);
        self.storage.set(self.key, &history).await;
        history
    }

    pub async fn clear(&self) -> bool {
        self.storage.remove(self.key).await
    }
}

pub fn chat_history(storage: LocalStorage) -> HistoryLog<ChatExchange> {
    HistoryLog::new(
        storage,
        keys::CHAT_HISTORY,
        CHAT_HISTORY_LIMIT,
        HistoryOrder::OldestFirst,
    )
}

pub fn reimbursement_history(storage: LocalStorage) -> HistoryLog<ReimbursementEntry> {
    HistoryLog::new(
        storage,
        keys::REIMBURSEMENT_HISTORY,
        REIMBURSEMENT_HISTORY_LIMIT,
        HistoryOrder::NewestFirst,
    )
}
