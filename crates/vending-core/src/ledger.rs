//! Purchase ledger.
//!
//! Per `(account, package)` set of purchased items. Identity is the
//! purchase token: `add` is idempotent on it, `update` replaces in place,
//! `remove` deletes. Ledger instances are created lazily inside a shared
//! concurrent map.

use dashmap::DashMap;
use vending_types::PurchaseItem;

/// Concurrent purchase ledger shared across all flows.
#[derive(Default)]
pub struct PurchaseLedger {
    lists: DashMap<String, Vec<PurchaseItem>>,
}

impl PurchaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(account: &str, package: &str) -> String {
        format!("{}:{}", account, package)
    }

    /// Insert the item unless one with the same purchase token exists.
    /// Returns whether the item was inserted.
    pub fn add(&self, account: &str, package: &str, item: PurchaseItem) -> bool {
        let mut list = self.lists.entry(Self::key(account, package)).or_default();
        if list.iter().any(|it| it.purchase_token == item.purchase_token) {
            return false;
        }
        tracing::debug!(
            "[Ledger] Added {} purchase {} for {}",
            item.kind,
            item.sku,
            account
        );
        list.push(item);
        true
    }

    /// Replace an existing item matched by purchase token.
    /// Returns whether a replacement happened.
    pub fn update(&self, account: &str, package: &str, item: PurchaseItem) -> bool {
        let mut list = self.lists.entry(Self::key(account, package)).or_default();
        match list.iter_mut().find(|it| it.purchase_token == item.purchase_token) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    /// Delete the item with the given purchase token, if present.
    pub fn remove(&self, account: &str, package: &str, purchase_token: &str) -> bool {
        match self.lists.get_mut(&Self::key(account, package)) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|it| it.purchase_token != purchase_token);
                before != list.len()
            }
            None => false,
        }
    }

    /// All items whose kind tag matches, in insertion order.
    pub fn by_kind(&self, account: &str, package: &str, kind: &str) -> Vec<PurchaseItem> {
        match self.lists.get(&Self::key(account, package)) {
            Some(list) => list.iter().filter(|it| it.kind == kind).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Number of items tracked for the given ledger instance.
    pub fn len(&self, account: &str, package: &str) -> usize {
        self.lists
            .get(&Self::key(account, package))
            .map(|list| list.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, account: &str, package: &str) -> bool {
        self.len(account, package) == 0
    }
}
