//! Video tile slot management.
//!
//! One ownership table keyed by tile id, with each admitted tile tagged as
//! active, pending or screen. A tile id can therefore never end up in two
//! collections at once.

use std::collections::{HashMap, VecDeque};

use crate::engine::VideoTileState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    /// Displayed in the local/remote video collection.
    Active,
    /// Overflow, waiting for an active slot, in arrival order.
    Pending,
    /// The single screen-share slot.
    Screen,
}

/// Outcome of a tile-added notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Active,
    Screen,
    Queued,
    /// Second screen share or duplicate id; not queued.
    Dropped,
}

/// Outcome of a tile-removed notification.
#[derive(Debug, Default)]
pub struct Removal {
    /// Which slot held the tile, if any.
    pub removed: Option<SlotKind>,
    /// Pending tile promoted into the freed active slot.
    pub promoted: Option<VideoTileState>,
}

struct Slot {
    kind: SlotKind,
    tile: VideoTileState,
}

pub struct TileRegistry {
    max_active: usize,
    slots: HashMap<u32, Slot>,
    /// Display order of the active collection.
    active_order: Vec<u32>,
    /// Arrival order of the pending queue.
    pending_order: VecDeque<u32>,
}

impl TileRegistry {
    pub fn new(max_active: usize) -> Self {
        Self {
            max_active,
            slots: HashMap::new(),
            active_order: Vec::new(),
            pending_order: VecDeque::new(),
        }
    }

    fn has_local_active(&self) -> bool {
        self.active_order
            .iter()
            .any(|id| self.slots[id].tile.is_local)
    }

    /// One unit of the maximum stays reserved for the local tile while it
    /// is absent.
    fn can_admit_remote(&self) -> bool {
        let current_max = if self.has_local_active() {
            self.max_active
        } else {
            self.max_active.saturating_sub(1)
        };
        self.active_order.len() < current_max
    }

    fn screen_occupied(&self) -> bool {
        self.slots.values().any(|s| s.kind == SlotKind::Screen)
    }

    /// Apply the admission policy to a newly added tile.
    pub fn add(&mut self, tile: VideoTileState) -> Admission {
        if self.slots.contains_key(&tile.tile_id) {
            return Admission::Dropped;
        }

        if tile.is_content {
            // At most one screen share; a second one is dropped, not queued.
            if self.screen_occupied() {
                return Admission::Dropped;
            }
            self.slots.insert(
                tile.tile_id,
                Slot {
                    kind: SlotKind::Screen,
                    tile,
                },
            );
            return Admission::Screen;
        }

        // The local tile is always shown, regardless of occupancy.
        if tile.is_local || self.can_admit_remote() {
            self.active_order.push(tile.tile_id);
            self.slots.insert(
                tile.tile_id,
                Slot {
                    kind: SlotKind::Active,
                    tile,
                },
            );
            return Admission::Active;
        }

        self.pending_order.push_back(tile.tile_id);
        self.slots.insert(
            tile.tile_id,
            Slot {
                kind: SlotKind::Pending,
                tile,
            },
        );
        Admission::Queued
    }

    /// Remove a tile from whichever slot holds it; freeing an active slot
    /// promotes the oldest pending tile when capacity allows.
    pub fn remove(&mut self, tile_id: u32) -> Removal {
        let Some(slot) = self.slots.remove(&tile_id) else {
            return Removal::default();
        };

        let mut out = Removal {
            removed: Some(slot.kind),
            promoted: None,
        };

        match slot.kind {
            SlotKind::Active => {
                self.active_order.retain(|id| *id != tile_id);
                if self.can_admit_remote() {
                    if let Some(next_id) = self.pending_order.pop_front() {
                        if let Some(next) = self.slots.get_mut(&next_id) {
                            next.kind = SlotKind::Active;
                            self.active_order.push(next_id);
                            out.promoted = Some(next.tile.clone());
                        }
                    }
                }
            }
            SlotKind::Pending => {
                self.pending_order.retain(|id| *id != tile_id);
            }
            SlotKind::Screen => {}
        }

        out
    }

    /// Active tiles in display order.
    pub fn active_tiles(&self) -> Vec<&VideoTileState> {
        self.active_order
            .iter()
            .map(|id| &self.slots[id].tile)
            .collect()
    }

    /// Pending tiles in arrival order.
    pub fn pending_tiles(&self) -> Vec<&VideoTileState> {
        self.pending_order
            .iter()
            .map(|id| &self.slots[id].tile)
            .collect()
    }

    pub fn screen_tile(&self) -> Option<&VideoTileState> {
        self.slots
            .values()
            .find(|s| s.kind == SlotKind::Screen)
            .map(|s| &s.tile)
    }

    pub fn active_len(&self) -> usize {
        self.active_order.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 4;

    fn remote(id: u32) -> VideoTileState {
        VideoTileState::remote(id, format!("attendee-{id}"))
    }

    fn ids(tiles: &[&VideoTileState]) -> Vec<u32> {
        tiles.iter().map(|t| t.tile_id).collect()
    }

    #[test]
    fn local_tile_is_always_admitted() {
        let mut reg = TileRegistry::new(MAX);
        for id in 1..=3 {
            assert_eq!(reg.add(remote(id)), Admission::Active);
        }
        // Remote capacity is exhausted (one slot reserved for local)...
        assert_eq!(reg.add(remote(4)), Admission::Queued);
        // ...but the local tile still goes straight in.
        assert_eq!(reg.add(VideoTileState::local(0, "me")), Admission::Active);
        assert_eq!(reg.active_len(), 4);
    }

    #[test]
    fn remote_capacity_reserves_a_slot_while_local_absent() {
        let mut reg = TileRegistry::new(MAX);
        assert_eq!(reg.add(remote(1)), Admission::Active);
        assert_eq!(reg.add(remote(2)), Admission::Active);
        assert_eq!(reg.add(remote(3)), Admission::Active);
        assert_eq!(reg.add(remote(4)), Admission::Queued);

        // With the local tile present the reserved unit is in use, so a
        // freed slot can be refilled up to the full maximum.
        let mut reg = TileRegistry::new(MAX);
        reg.add(VideoTileState::local(0, "me"));
        for id in 1..=3 {
            assert_eq!(reg.add(remote(id)), Admission::Active);
        }
        assert_eq!(reg.add(remote(4)), Admission::Queued);
    }

    #[test]
    fn single_screen_share_second_is_dropped_not_queued() {
        let mut reg = TileRegistry::new(MAX);
        assert_eq!(
            reg.add(VideoTileState::content(10, "a#content")),
            Admission::Screen
        );
        assert_eq!(
            reg.add(VideoTileState::content(11, "b#content")),
            Admission::Dropped
        );
        assert_eq!(reg.pending_len(), 0);
        assert_eq!(reg.screen_tile().unwrap().tile_id, 10);

        // Freeing the slot lets the next content tile in.
        reg.remove(10);
        assert_eq!(
            reg.add(VideoTileState::content(11, "b#content")),
            Admission::Screen
        );
    }

    #[test]
    fn duplicate_tile_id_is_ignored() {
        let mut reg = TileRegistry::new(MAX);
        assert_eq!(reg.add(remote(1)), Admission::Active);
        assert_eq!(reg.add(remote(1)), Admission::Dropped);
        assert_eq!(reg.active_len(), 1);
    }

    #[test]
    fn removal_promotes_oldest_pending_in_arrival_order() {
        // The worked example: max 4 with the local tile occupying a slot;
        // A..E arrive in order.
        let mut reg = TileRegistry::new(MAX);
        reg.add(VideoTileState::local(0, "me"));
        let (a, b, c, d, e) = (1, 2, 3, 4, 5);
        assert_eq!(reg.add(remote(a)), Admission::Active);
        assert_eq!(reg.add(remote(b)), Admission::Active);
        assert_eq!(reg.add(remote(c)), Admission::Active);
        assert_eq!(reg.add(remote(d)), Admission::Queued);
        assert_eq!(reg.add(remote(e)), Admission::Queued);

        let out = reg.remove(b);
        assert_eq!(out.removed, Some(SlotKind::Active));
        assert_eq!(out.promoted.unwrap().tile_id, d);
        assert_eq!(ids(&reg.pending_tiles()), vec![e]);
        assert_eq!(ids(&reg.active_tiles()), vec![0, a, c, d]);
    }

    #[test]
    fn pending_and_screen_removals_promote_nothing() {
        let mut reg = TileRegistry::new(MAX);
        for id in 1..=3 {
            reg.add(remote(id));
        }
        reg.add(remote(4));
        reg.add(VideoTileState::content(9, "x#content"));

        let out = reg.remove(4);
        assert_eq!(out.removed, Some(SlotKind::Pending));
        assert!(out.promoted.is_none());

        let out = reg.remove(9);
        assert_eq!(out.removed, Some(SlotKind::Screen));
        assert!(out.promoted.is_none());
        assert_eq!(reg.active_len(), 3);
    }

    #[test]
    fn zero_capacity_queues_remotes_but_admits_local() {
        let mut reg = TileRegistry::new(0);
        assert_eq!(reg.add(remote(1)), Admission::Queued);
        assert_eq!(reg.add(VideoTileState::local(0, "me")), Admission::Active);
        assert_eq!(reg.add(remote(2)), Admission::Queued);
        assert_eq!(reg.active_len(), 1);
        assert_eq!(reg.pending_len(), 2);

        // Removing the local tile promotes nothing into a zero-size set.
        let out = reg.remove(0);
        assert_eq!(out.removed, Some(SlotKind::Active));
        assert!(out.promoted.is_none());
        assert_eq!(reg.pending_len(), 2);
    }

    #[test]
    fn removing_unknown_tile_is_a_no_op() {
        let mut reg = TileRegistry::new(MAX);
        let out = reg.remove(42);
        assert!(out.removed.is_none());
        assert!(out.promoted.is_none());
    }

    #[test]
    fn a_tile_id_lives_in_exactly_one_slot_kind() {
        let mut reg = TileRegistry::new(MAX);
        reg.add(VideoTileState::local(0, "me"));
        for id in 1..=6 {
            reg.add(remote(id));
        }
        reg.add(VideoTileState::content(20, "s#content"));
        reg.remove(2);
        reg.remove(5);

        let mut seen = std::collections::HashSet::new();
        for t in reg.active_tiles() {
            assert!(seen.insert(t.tile_id));
        }
        for t in reg.pending_tiles() {
            assert!(seen.insert(t.tile_id));
        }
        if let Some(t) = reg.screen_tile() {
            assert!(seen.insert(t.tile_id));
        }
    }
}
