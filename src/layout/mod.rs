// SPDX-License-Identifier: MIT
//! Plugin-layout reconciliation.
//!
//! Diffs a client-submitted layout array against a space's persisted
//! placements and computes the create/update/delete set that converges the
//! stored state to the submitted one. The caller applies the whole set in a
//! single transaction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Position and size of a plugin on a space's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// One entry of the client-submitted layout.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutItem {
    /// Catalog plugin id.
    pub id: String,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl LayoutItem {
    fn geometry(&self) -> Geometry {
        Geometry {
            left: self.left,
            top: self.top,
            width: self.width,
            height: self.height,
        }
    }
}

/// A currently persisted placement, as loaded from the space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub plugin_id: String,
    pub geometry: Geometry,
}

/// The operation set produced by [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutDiff {
    /// New placements, in submitted order.
    pub created: Vec<Placement>,
    /// Existing placements whose geometry changed; carries only the new geometry.
    pub updated: Vec<Placement>,
    /// Plugin ids whose placements are no longer present.
    pub deleted: Vec<String>,
}

impl LayoutDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Compute the minimal operation set converging `existing` to `submitted`.
///
/// A map from id to item is built first, so a duplicate id in `submitted`
/// overwrites the earlier entry — the last occurrence wins. Existing
/// placements absent from the map are deleted; present ones with any geometry
/// field differing are updated; unchanged ones are left alone. Submitted ids
/// with no existing placement become creates, ordered by their first
/// occurrence in the submitted list.
///
/// No geometry validation happens here — bounds, overlap, and plugin size
/// constraints are accepted verbatim.
pub fn reconcile(existing: &[Placement], submitted: &[LayoutItem]) -> LayoutDiff {
    let mut incoming: HashMap<&str, Geometry> = HashMap::with_capacity(submitted.len());
    for item in submitted {
        incoming.insert(item.id.as_str(), item.geometry());
    }

    let mut diff = LayoutDiff::default();

    for placement in existing {
        match incoming.remove(placement.plugin_id.as_str()) {
            None => diff.deleted.push(placement.plugin_id.clone()),
            Some(geometry) => {
                if geometry != placement.geometry {
                    diff.updated.push(Placement {
                        plugin_id: placement.plugin_id.clone(),
                        geometry,
                    });
                }
            }
        }
    }

    // Whatever survived the pass over `existing` is new. Drain in submitted
    // order so inserts are deterministic; `remove` also collapses duplicate
    // ids to a single create.
    for item in submitted {
        if let Some(geometry) = incoming.remove(item.id.as_str()) {
            diff.created.push(Placement {
                plugin_id: item.id.clone(),
                geometry,
            });
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, left: i64, top: i64, width: i64, height: i64) -> LayoutItem {
        LayoutItem {
            id: id.to_string(),
            left,
            top,
            width,
            height,
        }
    }

    fn placed(id: &str, left: i64, top: i64, width: i64, height: i64) -> Placement {
        Placement {
            plugin_id: id.to_string(),
            geometry: Geometry {
                left,
                top,
                width,
                height,
            },
        }
    }

    #[test]
    fn test_unchanged_placement_is_untouched() {
        let existing = vec![placed("p1", 0, 0, 1, 1)];
        let diff = reconcile(&existing, &[item("p1", 0, 0, 1, 1)]);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_geometry_change_emits_update() {
        let existing = vec![placed("p1", 0, 0, 1, 1)];
        let diff = reconcile(&existing, &[item("p1", 0, 0, 2, 1)]);
        assert!(diff.created.is_empty());
        assert!(diff.deleted.is_empty());
        assert_eq!(diff.updated, vec![placed("p1", 0, 0, 2, 1)]);
    }

    #[test]
    fn test_missing_id_emits_delete() {
        let existing = vec![placed("p1", 3, 4, 2, 2)];
        let diff = reconcile(&existing, &[]);
        assert!(diff.created.is_empty());
        assert!(diff.updated.is_empty());
        assert_eq!(diff.deleted, vec!["p1".to_string()]);
    }

    #[test]
    fn test_new_id_emits_create() {
        let diff = reconcile(&[], &[item("p2", 1, 1, 1, 1)]);
        assert_eq!(diff.created, vec![placed("p2", 1, 1, 1, 1)]);
        assert!(diff.updated.is_empty());
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_mixed_create_update_delete() {
        let existing = vec![
            placed("keep", 0, 0, 1, 1),
            placed("move", 2, 0, 1, 1),
            placed("drop", 4, 0, 1, 1),
        ];
        let submitted = vec![
            item("keep", 0, 0, 1, 1),
            item("move", 2, 5, 1, 1),
            item("add", 6, 0, 2, 2),
        ];
        let diff = reconcile(&existing, &submitted);
        assert_eq!(diff.created, vec![placed("add", 6, 0, 2, 2)]);
        assert_eq!(diff.updated, vec![placed("move", 2, 5, 1, 1)]);
        assert_eq!(diff.deleted, vec!["drop".to_string()]);
    }

    #[test]
    fn test_duplicate_id_last_occurrence_wins_on_update() {
        let existing = vec![placed("p1", 0, 0, 1, 1)];
        let submitted = vec![item("p1", 9, 9, 9, 9), item("p1", 0, 0, 3, 1)];
        let diff = reconcile(&existing, &submitted);
        assert_eq!(diff.updated, vec![placed("p1", 0, 0, 3, 1)]);
        assert!(diff.created.is_empty());
    }

    #[test]
    fn test_duplicate_id_collapses_to_single_create() {
        let submitted = vec![item("p1", 1, 1, 1, 1), item("p1", 2, 2, 2, 2)];
        let diff = reconcile(&[], &submitted);
        assert_eq!(diff.created, vec![placed("p1", 2, 2, 2, 2)]);
    }

    #[test]
    fn test_duplicate_matching_existing_geometry_is_noop() {
        // The later duplicate restores the stored geometry, so nothing changes.
        let existing = vec![placed("p1", 0, 0, 1, 1)];
        let submitted = vec![item("p1", 5, 5, 5, 5), item("p1", 0, 0, 1, 1)];
        let diff = reconcile(&existing, &submitted);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_creates_keep_submitted_order() {
        let submitted = vec![
            item("c", 0, 0, 1, 1),
            item("a", 1, 0, 1, 1),
            item("b", 2, 0, 1, 1),
        ];
        let diff = reconcile(&[], &submitted);
        let ids: Vec<&str> = diff.created.iter().map(|p| p.plugin_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_negative_and_zero_geometry_accepted_verbatim() {
        // The reconciler does not validate geometry.
        let diff = reconcile(&[], &[item("p1", -3, 0, 0, -1)]);
        assert_eq!(diff.created, vec![placed("p1", -3, 0, 0, -1)]);
    }
}
