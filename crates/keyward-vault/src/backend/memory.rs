//! In-process backend.
//!
//! Keeps items in a mutex-guarded vector in insertion order, so "the first
//! match" is always the oldest matching item. Nothing is persisted.

use std::sync::{Mutex, MutexGuard};

use super::{BackendError, SecureBackend, check_attributes, plan_update, stored_attributes};
use crate::query::{Attributes, Changes, Item, ItemClass, Query};

/// In-memory [`SecureBackend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: Mutex<Vec<Item>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live items of every class.
    pub fn len(&self) -> Result<usize, BackendError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, BackendError> {
        Ok(self.len()? == 0)
    }

    /// Number of live items of `class` whose attributes match `filter`.
    pub fn count(&self, class: ItemClass, filter: &Attributes) -> Result<usize, BackendError> {
        let items = self.lock()?;
        Ok(items
            .iter()
            .filter(|item| item.class == class && filter.matches(&item.attributes))
            .count())
    }

    /// Insert an item verbatim, bypassing every check.
    ///
    /// Lets tests plant records the store itself would never write, such as
    /// items without an account or with a non-UTF-8 payload.
    pub fn insert_raw(&self, item: Item) -> Result<(), BackendError> {
        self.lock()?.push(item);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Item>>, BackendError> {
        self.items
            .lock()
            .map_err(|_| BackendError::internal("memory backend lock poisoned"))
    }

    /// Indices of the items matching `query`, capped by its limit.
    fn matching(items: &[Item], query: &Query) -> Vec<usize> {
        let hits = items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.class == query.class && query.attributes.matches(&item.attributes)
            })
            .map(|(idx, _)| idx);

        match query.limit.cap() {
            Some(cap) => hits.take(cap).collect(),
            None => hits.collect(),
        }
    }
}

impl SecureBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn store(&self, query: &Query, payload: &[u8]) -> Result<(), BackendError> {
        check_attributes(query.class, &query.attributes)?;
        let attributes = stored_attributes(query);

        let mut items = self.lock()?;
        if items
            .iter()
            .any(|item| item.class == query.class && item.attributes == attributes)
        {
            return Err(BackendError::DuplicateItem);
        }

        items.push(Item {
            class: query.class,
            attributes,
            data: Some(payload.to_vec()),
        });
        Ok(())
    }

    fn find(&self, query: &Query) -> Result<Vec<Item>, BackendError> {
        check_attributes(query.class, &query.attributes)?;

        let items = self.lock()?;
        let found: Vec<Item> = Self::matching(&items, query)
            .into_iter()
            .map(|idx| items[idx].project(query))
            .collect();

        if found.is_empty() {
            return Err(BackendError::ItemNotFound);
        }
        Ok(found)
    }

    fn update(&self, query: &Query, changes: &Changes) -> Result<(), BackendError> {
        check_attributes(query.class, &query.attributes)?;
        check_attributes(query.class, &changes.attributes)?;

        let mut items = self.lock()?;
        let targets = Self::matching(&items, query);
        if targets.is_empty() {
            return Err(BackendError::ItemNotFound);
        }

        let live: Vec<(usize, Attributes)> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.class == query.class)
            .map(|(idx, item)| (idx, item.attributes.clone()))
            .collect();

        for (idx, attributes) in plan_update(&live, &targets, &changes.attributes)? {
            let item = &mut items[idx];
            item.attributes = attributes;
            if let Some(data) = &changes.data {
                item.data = Some(data.clone());
            }
        }
        Ok(())
    }

    fn erase(&self, query: &Query) -> Result<usize, BackendError> {
        check_attributes(query.class, &query.attributes)?;

        let mut items = self.lock()?;
        let targets = Self::matching(&items, query);
        if targets.is_empty() {
            return Err(BackendError::ItemNotFound);
        }

        let removed = targets.len();
        // Indices are ascending; remove from the back so they stay valid.
        for idx in targets.into_iter().rev() {
            items.remove(idx);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ERR_SEC_DUPLICATE_ITEM, ERR_SEC_NO_SUCH_ATTR};
    use crate::query::MatchLimit;

    fn inet(account: &str, server: &str) -> Query {
        Query::new(ItemClass::InternetPassword)
            .account(account)
            .server(server)
    }

    #[test]
    fn store_then_find() {
        let backend = MemoryBackend::new();
        backend
            .store(&inet("alice", "example.com").label(Some("")), b"pw")
            .unwrap();

        let found = backend
            .find(&inet("alice", "example.com").returning_all())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].data.as_deref(), Some(&b"pw"[..]));
        assert_eq!(found[0].attributes.port, Some(0));
        assert_eq!(found[0].attributes.label.as_deref(), Some(""));
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let backend = MemoryBackend::new();
        let query = inet("alice", "example.com").port(Some(443));
        backend.store(&query, b"one").unwrap();

        let err = backend.store(&query, b"two").unwrap_err();
        assert_eq!(err.code(), ERR_SEC_DUPLICATE_ITEM);
        assert_eq!(backend.len().unwrap(), 1);
    }

    #[test]
    fn find_without_return_flags_reports_bare_items() {
        let backend = MemoryBackend::new();
        backend.store(&inet("alice", "example.com"), b"pw").unwrap();

        let found = backend.find(&inet("alice", "example.com")).unwrap();
        assert!(found[0].data.is_none());
        assert_eq!(found[0].attributes, Attributes::default());
    }

    #[test]
    fn find_respects_match_limit_and_order() {
        let backend = MemoryBackend::new();
        backend
            .store(&inet("alice", "example.com").port(Some(1)), b"first")
            .unwrap();
        backend
            .store(&inet("alice", "example.com").port(Some(2)), b"second")
            .unwrap();

        let one = backend
            .find(&inet("alice", "example.com").returning_all())
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].data.as_deref(), Some(&b"first"[..]));

        let all = backend
            .find(
                &inet("alice", "example.com")
                    .returning_all()
                    .limit(MatchLimit::All),
            )
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn missing_items_are_not_found() {
        let backend = MemoryBackend::new();
        let query = inet("ghost", "example.com");
        assert_eq!(backend.find(&query), Err(BackendError::ItemNotFound));
        assert_eq!(
            backend.update(&query, &Changes::default()),
            Err(BackendError::ItemNotFound)
        );
        assert_eq!(backend.erase(&query), Err(BackendError::ItemNotFound));
    }

    #[test]
    fn update_applies_sparse_patch() {
        let backend = MemoryBackend::new();
        let original = inet("alice", "example.com")
            .port(Some(8080))
            .label(Some("work"));
        backend.store(&original, b"pw").unwrap();

        let changes = Changes {
            attributes: Attributes {
                server: Some("other.org".into()),
                ..Default::default()
            },
            data: None,
        };
        backend.update(&inet("alice", "example.com"), &changes).unwrap();

        let found = backend
            .find(&inet("alice", "other.org").returning_all())
            .unwrap();
        assert_eq!(found[0].attributes.port, Some(8080));
        assert_eq!(found[0].attributes.label.as_deref(), Some("work"));
        assert_eq!(found[0].data.as_deref(), Some(&b"pw"[..]));
    }

    #[test]
    fn update_refuses_identity_collision() {
        let backend = MemoryBackend::new();
        backend.store(&inet("alice", "example.com"), b"a").unwrap();
        backend.store(&inet("bob", "example.com"), b"b").unwrap();

        let rename = Changes {
            attributes: Attributes {
                account: Some("bob".into()),
                ..Default::default()
            },
            data: None,
        };
        assert_eq!(
            backend.update(&inet("alice", "example.com"), &rename),
            Err(BackendError::DuplicateItem)
        );
        assert_eq!(
            backend
                .count(ItemClass::InternetPassword, &Attributes::default())
                .unwrap(),
            2
        );
    }

    #[test]
    fn erase_is_capped_by_limit() {
        let backend = MemoryBackend::new();
        backend
            .store(&inet("alice", "example.com").port(Some(1)), b"1")
            .unwrap();
        backend
            .store(&inet("alice", "example.com").port(Some(2)), b"2")
            .unwrap();
        backend
            .store(&inet("alice", "example.com").port(Some(3)), b"3")
            .unwrap();

        assert_eq!(backend.erase(&inet("alice", "example.com")).unwrap(), 1);
        assert_eq!(backend.len().unwrap(), 2);

        let removed = backend
            .erase(&inet("alice", "example.com").limit(MatchLimit::All))
            .unwrap();
        assert_eq!(removed, 2);
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn classes_are_separate() {
        let backend = MemoryBackend::new();
        backend
            .store(&Query::new(ItemClass::GenericPassword).account("alice"), b"g")
            .unwrap();

        let inet_lookup = Query::new(ItemClass::InternetPassword).account("alice");
        assert_eq!(backend.find(&inet_lookup), Err(BackendError::ItemNotFound));
    }

    #[test]
    fn generic_store_rejects_server() {
        let backend = MemoryBackend::new();
        let query = Query::new(ItemClass::GenericPassword)
            .account("alice")
            .server("example.com");
        let err = backend.store(&query, b"pw").unwrap_err();
        assert_eq!(err.code(), ERR_SEC_NO_SUCH_ATTR);
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn helpers_report_a_poisoned_lock() {
        let backend = std::sync::Arc::new(MemoryBackend::new());
        let poisoner = backend.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.items.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(backend.len().is_err());
        assert!(backend.is_empty().is_err());
        assert!(
            backend
                .count(ItemClass::GenericPassword, &Attributes::default())
                .is_err()
        );
        let item = Item {
            class: ItemClass::GenericPassword,
            attributes: Attributes::default(),
            data: None,
        };
        assert!(backend.insert_raw(item).is_err());
    }
}
