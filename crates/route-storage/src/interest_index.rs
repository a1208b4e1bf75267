//! Interest registry and its reverse relation index.
//!
//! The index is plain bookkeeping: walks are validated before they get here.
//! The registry and the reverse index always change together inside one
//! `&mut self` call, so a reader holding the lock never sees one without the
//! other.

use route_core::{
    ElementId, InterestId, InterestRelation, RelationKind, Result, RouteNetworkError,
    RouteNetworkInterest,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct InterestIndex {
    interests: HashMap<InterestId, RouteNetworkInterest>,
    /// element -> one row per distinct (interest, relation kind)
    relations: HashMap<ElementId, Vec<InterestRelation>>,
}

impl InterestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.interests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interests.is_empty()
    }

    pub fn contains(&self, id: InterestId) -> bool {
        self.interests.contains_key(&id)
    }

    pub fn get(&self, id: InterestId) -> Option<&RouteNetworkInterest> {
        self.interests.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteNetworkInterest> {
        self.interests.values()
    }

    /// Relation rows for `element`.
    pub fn relations_of(&self, element: ElementId) -> &[InterestRelation] {
        self.relations
            .get(&element)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Interests touching `element`, each with the way it touches it.
    pub fn touching(&self, element: ElementId) -> Vec<(&RouteNetworkInterest, RelationKind)> {
        self.relations_of(element)
            .iter()
            .filter_map(|rel| self.interests.get(&rel.interest_id).map(|i| (i, rel.kind)))
            .collect()
    }

    /// Distinct ids of interests referencing `element`, in row order.
    pub fn interest_ids_referencing(&self, element: ElementId) -> Vec<InterestId> {
        let mut ids: Vec<InterestId> = Vec::new();
        for rel in self.relations_of(element) {
            if !ids.contains(&rel.interest_id) {
                ids.push(rel.interest_id);
            }
        }
        ids
    }

    /// Adds a new interest.
    pub fn register(&mut self, interest: RouteNetworkInterest) -> Result<()> {
        if self.interests.contains_key(&interest.id) {
            return Err(RouteNetworkError::InterestAlreadyExists(interest.id));
        }
        self.add_rows(&interest);
        self.interests.insert(interest.id, interest);
        Ok(())
    }

    /// Replaces the element list of an interest; returns the previous list.
    pub fn update(&mut self, id: InterestId, refs: Vec<ElementId>) -> Result<Vec<ElementId>> {
        let mut interest = self
            .interests
            .remove(&id)
            .ok_or(RouteNetworkError::InterestNotFound(id))?;

        self.remove_rows(&interest);
        let previous = std::mem::replace(&mut interest.route_network_element_refs, refs);
        self.add_rows(&interest);
        self.interests.insert(id, interest);
        Ok(previous)
    }

    /// Removes an interest and all of its relation rows.
    pub fn unregister(&mut self, id: InterestId) -> Result<RouteNetworkInterest> {
        let interest = self
            .interests
            .remove(&id)
            .ok_or(RouteNetworkError::InterestNotFound(id))?;
        self.remove_rows(&interest);
        Ok(interest)
    }

    fn add_rows(&mut self, interest: &RouteNetworkInterest) {
        for (element, kind) in interest.relations() {
            let rows = self.relations.entry(element).or_default();
            let row = InterestRelation {
                interest_id: interest.id,
                kind,
            };
            if !rows.contains(&row) {
                rows.push(row);
            }
        }
    }

    /// Drops this interest's rows from every element of its current list.
    fn remove_rows(&mut self, interest: &RouteNetworkInterest) {
        for element in &interest.route_network_element_refs {
            if let Some(rows) = self.relations.get_mut(element) {
                rows.retain(|r| r.interest_id != interest.id);
                if rows.is_empty() {
                    self.relations.remove(element);
                }
            }
        }
    }
}
