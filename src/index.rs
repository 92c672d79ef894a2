//! Derived indexes: chart position to identity keys, and artist to the chart
//! positions the artist has occupied.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::OrderingViolation;
use crate::models::IdentityKey;

// ============================================================================
// Position Index
// ============================================================================

/// Chart position to identity keys for one processing cycle. The first key of
/// a slot is the canonical key; the others are aliases relevant to the slot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PositionIndex {
    slots: BTreeMap<u32, Vec<IdentityKey>>,
}

impl PositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a slot as the canonical key followed by its aliases.
    /// A slot therefore never holds an empty key list.
    pub fn record<I>(&mut self, position: u32, best_key: IdentityKey, aliases: I)
    where
        I: IntoIterator<Item = IdentityKey>,
    {
        let mut keys = vec![best_key];
        for alias in aliases {
            if !keys.contains(&alias) {
                keys.push(alias);
            }
        }
        self.slots.insert(position, keys);
    }

    pub fn get(&self, position: u32) -> Option<&[IdentityKey]> {
        self.slots.get(&position).map(Vec::as_slice)
    }

    /// Canonical key recorded at a position.
    pub fn best_key(&self, position: u32) -> Option<&IdentityKey> {
        self.slots.get(&position).and_then(|keys| keys.first())
    }

    /// Slots in ascending position order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[IdentityKey])> {
        self.slots.iter().map(|(position, keys)| (*position, keys.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check that the recorded positions are consecutive.
    pub fn check_consecutive(&self) -> Result<(), OrderingViolation> {
        let mut positions = self.slots.keys().copied();
        let Some(mut previous) = positions.next() else {
            return Ok(());
        };
        for position in positions {
            if position != previous + 1 {
                return Err(OrderingViolation {
                    previous,
                    missing: previous + 1,
                });
            }
            previous = position;
        }
        Ok(())
    }
}

// ============================================================================
// Artist Chart Index
// ============================================================================

/// Artist component of a key to the sorted, distinct chart positions of
/// every track credited to that artist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArtistChart {
    artists: BTreeMap<String, Vec<u32>>,
}

impl ArtistChart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a position for an artist, keeping the list sorted.
    /// Returns false if the position was already listed.
    pub fn insert(&mut self, artist: &str, position: u32) -> bool {
        let positions = self.artists.entry(artist.to_string()).or_default();
        match positions.binary_search(&position) {
            Ok(_) => false,
            Err(index) => {
                positions.insert(index, position);
                true
            }
        }
    }

    /// Positions of an artist; empty for an unknown artist.
    pub fn get(&self, artist: &str) -> &[u32] {
        self.artists.get(artist).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Artist of `keys` with the most charted tracks. On a tie the artist for
    /// whom `position` comes later in their own chart wins.
    pub fn max_artist<'a>(&self, position: u32, keys: &'a [IdentityKey]) -> Option<&'a str> {
        let mut max_tracks = 0;
        let mut max_rank = 0;
        let mut max_artist = None;
        for key in keys {
            let positions = self.get(&key.artist);
            let Ok(rank) = positions.binary_search(&position) else {
                continue;
            };
            if positions.len() > max_tracks || (positions.len() == max_tracks && rank > max_rank) {
                max_tracks = positions.len();
                max_rank = rank;
                max_artist = Some(key.artist.as_str());
            }
        }
        max_artist
    }
}
