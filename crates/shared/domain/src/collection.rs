//! Lazily loaded child collections.
//!
//! Entities own their claims, logins, memberships and tokens as a
//! [`Loaded`] value. A collection starts out [`Loaded::Unloaded`]; the stores
//! fill it from storage once, after which it is the only copy they read
//! from or write to for the rest of the entity's lifetime.

/// A child collection that is either not yet fetched or fully loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded<T> {
    /// Nothing has been fetched yet
    Unloaded,
    /// Fetched once; later reads and writes go here
    Loaded(Vec<T>),
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Loaded::Unloaded
    }
}

impl<T> Loaded<T> {
    /// Check if the collection has been fetched
    pub fn is_loaded(&self) -> bool {
        matches!(self, Loaded::Loaded(_))
    }

    /// Loaded items, or `None` while unloaded
    pub fn items(&self) -> Option<&[T]> {
        match self {
            Loaded::Loaded(items) => Some(items),
            Loaded::Unloaded => None,
        }
    }

    /// Mutable access to the items, filling from `fetched` first when unloaded.
    ///
    /// `fetched` is only called for an unloaded collection.
    pub fn get_or_fill(&mut self, fetched: impl FnOnce() -> Vec<T>) -> &mut Vec<T> {
        if let Loaded::Unloaded = self {
            *self = Loaded::Loaded(fetched());
        }
        match self {
            Loaded::Loaded(items) => items,
            Loaded::Unloaded => unreachable!("collection was filled above"),
        }
    }
}

impl<T> From<Vec<T>> for Loaded<T> {
    fn from(items: Vec<T>) -> Self {
        Loaded::Loaded(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unloaded() {
        let collection: Loaded<u32> = Loaded::default();
        assert!(!collection.is_loaded());
        assert!(collection.items().is_none());
    }

    #[test]
    fn test_loaded_empty_is_not_unloaded() {
        let collection: Loaded<u32> = Loaded::from(Vec::new());
        assert!(collection.is_loaded());
        assert_eq!(collection.items(), Some(&[][..]));
    }

    #[test]
    fn test_get_or_fill_only_fetches_once() {
        let mut collection = Loaded::default();
        let mut calls = 0;

        collection
            .get_or_fill(|| {
                calls += 1;
                vec![1, 2]
            })
            .push(3);
        collection.get_or_fill(|| {
            calls += 1;
            vec![]
        });

        assert_eq!(calls, 1);
        assert_eq!(collection.items(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_get_or_fill_keeps_loaded_items() {
        let mut collection = Loaded::from(vec!["a"]);
        let items = collection.get_or_fill(|| vec!["fetched"]);
        assert_eq!(items, &vec!["a"]);
    }
}
