//! Collection permission tree (spec §3, §8 invariant 7): a chunk in
//! collection `C` is visible to a caller iff they're an admin, `C`'s
//! effective audience is public, or it intersects the caller's principal
//! ids. The effective audience is the intersection of a collection's own
//! `queryable_by` with every ancestor's effective audience — an empty set at
//! one node means "public *at this node*", but intersecting with a
//! restricted ancestor still narrows it (a child can never grant a
//! principal absent from its parent's non-empty set).

use std::collections::{HashMap, HashSet};

use crate::schema::Collection;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAuthorization {
    pub principal_ids: HashSet<String>,
    pub is_admin: bool,
}

impl UserAuthorization {
    pub fn admin() -> Self {
        Self { principal_ids: HashSet::new(), is_admin: true }
    }

    pub fn principal(id: impl Into<String>) -> Self {
        Self { principal_ids: [id.into()].into_iter().collect(), is_admin: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Audience {
    Public,
    Restricted(HashSet<String>),
}

impl Audience {
    fn intersect(self, other: Audience) -> Audience {
        match (self, other) {
            (Audience::Public, Audience::Public) => Audience::Public,
            (Audience::Public, restricted @ Audience::Restricted(_)) => restricted,
            (restricted @ Audience::Restricted(_), Audience::Public) => restricted,
            (Audience::Restricted(a), Audience::Restricted(b)) => {
                Audience::Restricted(a.intersection(&b).cloned().collect())
            }
        }
    }
}

pub struct CollectionTree<'a> {
    collections: &'a HashMap<String, Collection>,
}

impl<'a> CollectionTree<'a> {
    pub fn new(collections: &'a HashMap<String, Collection>) -> Self {
        Self { collections }
    }

    fn effective(&self, path: &str) -> Audience {
        let Some(collection) = self.collections.get(path) else {
            return Audience::Restricted(HashSet::new());
        };
        let own = if collection.queryable_by.is_empty() {
            Audience::Public
        } else {
            Audience::Restricted(collection.queryable_by.clone())
        };
        let parent_effective = match &collection.parent_path {
            Some(parent) => self.effective(parent),
            None => Audience::Public,
        };
        own.intersect(parent_effective)
    }

    /// `canQuery(C, auth)` from spec §8 invariant 7.
    pub fn can_query(&self, path: &str, auth: &UserAuthorization) -> bool {
        if auth.is_admin {
            return true;
        }
        if !self.collections.contains_key(path) {
            return false;
        }
        match self.effective(path) {
            Audience::Public => true,
            Audience::Restricted(set) => set.iter().any(|p| auth.principal_ids.contains(p)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(entries: Vec<Collection>) -> HashMap<String, Collection> {
        entries.into_iter().map(|c| (c.path.clone(), c)).collect()
    }

    #[test]
    fn public_root_is_queryable_by_anyone() {
        let root = Collection::root("/docs");
        let map = tree_with(vec![root]);
        let tree = CollectionTree::new(&map);
        assert!(tree.can_query("/docs", &UserAuthorization::principal("9")));
    }

    #[test]
    fn scenario_s6_permission_filtered_search() {
        let secret = Collection::root("/docs/secret").with_queryable_by(["7"]);
        let public_child = Collection::child("/docs/secret/public", "/docs/secret");
        let map = tree_with(vec![secret, public_child]);
        let tree = CollectionTree::new(&map);

        let outsider = UserAuthorization::principal("9");
        assert!(!tree.can_query("/docs/secret", &outsider));
        assert!(!tree.can_query("/docs/secret/public", &outsider));

        let insider = UserAuthorization::principal("7");
        assert!(tree.can_query("/docs/secret", &insider));
        assert!(tree.can_query("/docs/secret/public", &insider));
    }

    #[test]
    fn child_cannot_grant_principal_absent_from_parent() {
        let parent = Collection::root("/docs").with_queryable_by(["7"]);
        let child = Collection::child("/docs/open", "/docs").with_queryable_by(["9"]);
        let map = tree_with(vec![parent, child]);
        let tree = CollectionTree::new(&map);
        assert!(!tree.can_query("/docs/open", &UserAuthorization::principal("9")));
        assert!(!tree.can_query("/docs/open", &UserAuthorization::principal("7")));
    }

    #[test]
    fn admin_bypasses_all_restrictions() {
        let root = Collection::root("/docs").with_queryable_by(["7"]);
        let map = tree_with(vec![root]);
        let tree = CollectionTree::new(&map);
        assert!(tree.can_query("/docs", &UserAuthorization::admin()));
    }

    #[test]
    fn unknown_collection_is_not_queryable_by_non_admins() {
        let map = HashMap::new();
        let tree = CollectionTree::new(&map);
        assert!(!tree.can_query("/nope", &UserAuthorization::principal("7")));
    }
}
