// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Ordered, identity-stable collection of text details for one image.
//!
//! Every edit swaps in a new list (`Arc`) and bumps a revision counter, so
//! consumers detect changes by identity instead of deep comparison.

use super::detail::{DetailId, TextDetail};
use std::collections::HashSet;
use std::sync::Arc;

/// The detail collection of the active image.
#[derive(Debug, Clone, Default)]
pub struct DetailList {
    items: Arc<Vec<TextDetail>>,
    revision: u64,
}

impl DetailList {
    pub fn new(items: Vec<TextDetail>) -> Self {
        Self {
            items: Arc::new(items),
            revision: 0,
        }
    }

    /// Current list. Cheap to clone and never mutated afterwards.
    pub fn snapshot(&self) -> Arc<Vec<TextDetail>> {
        Arc::clone(&self.items)
    }

    pub fn items(&self) -> &[TextDetail] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Monotonic counter bumped by every write.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, index: usize) -> Option<&TextDetail> {
        self.items.get(index)
    }

    pub fn position(&self, id: &DetailId) -> Option<usize> {
        self.items.iter().position(|d| &d.id == id)
    }

    pub fn find(&self, id: &DetailId) -> Option<&TextDetail> {
        self.items.iter().find(|d| &d.id == id)
    }

    /// Replace the whole list.
    pub fn replace(&mut self, items: Vec<TextDetail>) {
        self.items = Arc::new(items);
        self.revision += 1;
    }

    /// Apply `mutator` to the detail at `index`. Returns false when out of range.
    ///
    /// The id is restored after the mutator runs.
    pub fn update<F>(&mut self, index: usize, mutator: F) -> bool
    where
        F: FnOnce(&mut TextDetail),
    {
        let Some(current) = self.items.get(index) else {
            return false;
        };
        let id = current.id.clone();

        let mut next: Vec<TextDetail> = self.items.as_ref().clone();
        mutator(&mut next[index]);
        next[index].id = id;
        self.replace(next);
        true
    }

    /// Apply `mutator` to the detail with `id`, wherever it currently sits.
    pub fn update_by_id<F>(&mut self, id: &DetailId, mutator: F) -> bool
    where
        F: FnOnce(&mut TextDetail),
    {
        match self.position(id) {
            Some(index) => self.update(index, mutator),
            None => false,
        }
    }

    /// Remove and return the detail at `index`.
    pub fn delete(&mut self, index: usize) -> Option<TextDetail> {
        if index >= self.items.len() {
            return None;
        }
        let mut next: Vec<TextDetail> = self.items.as_ref().clone();
        let removed = next.remove(index);
        self.replace(next);
        Some(removed)
    }

    /// Append a detail at the end.
    pub fn push(&mut self, detail: TextDetail) {
        let mut next: Vec<TextDetail> = self.items.as_ref().clone();
        next.push(detail);
        self.replace(next);
    }

    /// Move the hit details to the front in hit order. Returns false when
    /// nothing changed.
    pub fn reorder_hits_first(&mut self, hits: &[DetailId]) -> bool {
        let next = reorder_hits_first(&self.items, hits);
        if next == *self.items {
            return false;
        }
        self.replace(next);
        true
    }
}

/// Hit details first (in hit order), then the rest in original relative order.
///
/// Ids that are not in `details` are ignored, as are repeated hits.
pub fn reorder_hits_first(details: &[TextDetail], hits: &[DetailId]) -> Vec<TextDetail> {
    let mut seen: HashSet<&DetailId> = HashSet::new();
    let mut ordered = Vec::with_capacity(details.len());

    for id in hits {
        if !seen.insert(id) {
            continue;
        }
        if let Some(detail) = details.iter().find(|d| &d.id == id) {
            ordered.push(detail.clone());
        }
    }

    ordered.extend(details.iter().filter(|d| !seen.contains(&d.id)).cloned());
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::detail::BoundingBox;

    fn sample(n: usize) -> Vec<TextDetail> {
        (0..n)
            .map(|i| {
                TextDetail::new(
                    format!("line {}", i),
                    String::new(),
                    BoundingBox {
                        min_x: i as f64 * 10.0,
                        min_y: 0.0,
                        max_x: i as f64 * 10.0 + 5.0,
                        max_y: 5.0,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_every_write_swaps_the_list() {
        let mut list = DetailList::new(sample(3));
        let before = list.snapshot();

        assert!(list.update(1, |d| d.translated_text = "edited".to_string()));
        let after = list.snapshot();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before[1].translated_text, "");
        assert_eq!(after[1].translated_text, "edited");
        assert_eq!(list.revision(), 1);
    }

    #[test]
    fn test_update_cannot_change_id() {
        let mut list = DetailList::new(sample(2));
        let id = list.get(0).unwrap().id.clone();
        list.update(0, |d| d.id = DetailId::generate());
        assert_eq!(list.get(0).unwrap().id, id);
    }

    #[test]
    fn test_out_of_range_is_a_no_op() {
        let mut list = DetailList::new(sample(2));
        assert!(!list.update(5, |d| d.translated_text.clear()));
        assert!(list.delete(9).is_none());
        assert_eq!(list.revision(), 0);
    }

    #[test]
    fn test_update_by_id_follows_reorder() {
        let mut list = DetailList::new(sample(4));
        let target = list.get(3).unwrap().id.clone();
        list.reorder_hits_first(&[target.clone()]);

        assert!(list.update_by_id(&target, |d| d.audio_reference = Some("x.mp3".into())));
        assert_eq!(list.get(0).unwrap().audio_reference.as_deref(), Some("x.mp3"));
    }

    #[test]
    fn test_reorder_hits_first() {
        let details = sample(6);
        let ids: Vec<DetailId> = details.iter().map(|d| d.id.clone()).collect();

        let hits = vec![ids[4].clone(), ids[1].clone(), ids[4].clone(), ids[3].clone()];
        let reordered = reorder_hits_first(&details, &hits);

        let order: Vec<&DetailId> = reordered.iter().map(|d| &d.id).collect();
        assert_eq!(
            order,
            vec![&ids[4], &ids[1], &ids[3], &ids[0], &ids[2], &ids[5]]
        );
        assert_eq!(reordered.len(), details.len());
    }

    #[test]
    fn test_reorder_ignores_unknown_ids() {
        let mut list = DetailList::new(sample(3));
        assert!(!list.reorder_hits_first(&[DetailId::generate()]));
        assert_eq!(list.revision(), 0);
    }

    #[test]
    fn test_delete_returns_removed_detail() {
        let mut list = DetailList::new(sample(3));
        let id = list.get(1).unwrap().id.clone();
        let removed = list.delete(1).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(list.len(), 2);
        assert!(list.position(&id).is_none());
    }
}
