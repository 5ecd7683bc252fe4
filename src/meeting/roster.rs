//! Roster of attendees with presence/volume/signal/active-speaker state.

use std::collections::BTreeMap;

use crate::engine::{AttendeeInfo, SignalStrength, VolumeLevel};

/// Attendee ids carry this suffix when they denote a content share.
pub const CONTENT_DELIMITER: &str = "#content";
/// Appended to the display name of a content-share roster entry.
pub const CONTENT_NAME_SUFFIX: &str = "<<Content>>";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterAttendee {
    pub attendee_id: String,
    pub attendee_name: String,
    pub volume_level: VolumeLevel,
    pub signal_strength: SignalStrength,
    pub is_active_speaker: bool,
}

impl RosterAttendee {
    pub fn new(attendee_id: impl Into<String>, attendee_name: impl Into<String>) -> Self {
        Self {
            attendee_id: attendee_id.into(),
            attendee_name: attendee_name.into(),
            volume_level: VolumeLevel::NotSpeaking,
            signal_strength: SignalStrength::High,
            is_active_speaker: false,
        }
    }
}

/// Display name from the external user id (`<uuid>#<name>`), tagged when
/// the attendee id denotes a content share.
pub fn attendee_display_name(attendee_id: &str, external_user_id: &str) -> String {
    let name = external_user_id
        .split('#')
        .nth(1)
        .unwrap_or(external_user_id);
    if attendee_id.ends_with(CONTENT_DELIMITER) {
        format!("{name} {CONTENT_NAME_SUFFIX}")
    } else {
        name.to_string()
    }
}

/// Mapping attendee id -> state, updated by batched engine events.
/// Entries are replaced wholesale, never patched in place.
#[derive(Debug, Default)]
pub struct RosterTracker {
    entries: BTreeMap<String, RosterAttendee>,
}

impl RosterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert newly joined attendees; existing entries are left untouched.
    pub fn attendees_joined(&mut self, infos: &[AttendeeInfo]) {
        for info in infos {
            self.entries
                .entry(info.attendee_id.clone())
                .or_insert_with(|| {
                    RosterAttendee::new(
                        &info.attendee_id,
                        attendee_display_name(&info.attendee_id, &info.external_user_id),
                    )
                });
        }
    }

    /// Remove attendees unconditionally.
    pub fn attendees_removed(&mut self, infos: &[AttendeeInfo]) {
        for info in infos {
            self.entries.remove(&info.attendee_id);
        }
    }

    /// Replace entries with updated volume. Absent attendees are ignored,
    /// never inserted as a side effect.
    pub fn volumes_changed(&mut self, updates: &[(AttendeeInfo, VolumeLevel)]) {
        for (info, level) in updates {
            if let Some(cur) = self.entries.get(&info.attendee_id) {
                let next = RosterAttendee {
                    volume_level: *level,
                    ..cur.clone()
                };
                self.entries.insert(info.attendee_id.clone(), next);
            }
        }
    }

    /// Replace entries with updated signal strength; absent attendees are
    /// ignored.
    pub fn signals_changed(&mut self, updates: &[(AttendeeInfo, SignalStrength)]) {
        for (info, strength) in updates {
            if let Some(cur) = self.entries.get(&info.attendee_id) {
                let next = RosterAttendee {
                    signal_strength: *strength,
                    ..cur.clone()
                };
                self.entries.insert(info.attendee_id.clone(), next);
            }
        }
    }

    /// Recompute the active-speaker flag for every entry from membership in
    /// the notified set. Returns whether any flag changed, so the caller
    /// can skip the re-render when nothing did.
    pub fn active_speakers_detected(&mut self, speakers: &[AttendeeInfo]) -> bool {
        let active: std::collections::HashSet<&str> =
            speakers.iter().map(|i| i.attendee_id.as_str()).collect();

        let mut changed = false;
        let ids: Vec<String> = self.entries.keys().cloned().collect();
        for id in ids {
            let cur = &self.entries[&id];
            let is_active = active.contains(id.as_str());
            if cur.is_active_speaker != is_active {
                let next = RosterAttendee {
                    is_active_speaker: is_active,
                    ..cur.clone()
                };
                self.entries.insert(id, next);
                changed = true;
            }
        }
        changed
    }

    pub fn get(&self, attendee_id: &str) -> Option<&RosterAttendee> {
        self.entries.get(attendee_id)
    }

    pub fn display_name(&self, attendee_id: &str) -> String {
        self.entries
            .get(attendee_id)
            .map(|a| a.attendee_name.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn attendees(&self) -> impl Iterator<Item = &RosterAttendee> {
        self.entries.values()
    }
}
