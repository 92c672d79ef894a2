//! Detection, decision making and adjustments for collisions between tracks
//! sharing a normalized key.
//!
//! A collision is an attempt to write chart data into a key that already
//! holds data for the same slot: the same historical year, or a current-year
//! position. Collisions never fail; they are resolved here and reported as
//! an `Outcome`.

use std::fmt;

use crate::models::{Best, Catalog, IdentityKey, TrackRecord, Year};

/// Kind of write attempted for a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt<'a> {
    /// Live chart data; a stored current-year position is collision evidence.
    Current,
    /// Back-filled chart data; a stored entry for the year is collision evidence.
    Historical(&'a Year),
    /// Write under the canonical key of a row; never collides.
    Canonical,
}

impl fmt::Display for Attempt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::Current => f.write_str("current"),
            Attempt::Historical(year) => write!(f, "{}", year),
            Attempt::Canonical => f.write_str("canonical"),
        }
    }
}

/// Result of one write attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Unseen key, stored as a copy of the incoming record
    Inserted,
    /// Seen key without collision, incoming data merged under stored data
    Merged,
    /// Same current-year row seen again, nothing changed
    Duplicate,
    /// Conflicting track, stored record replaced by the incoming one
    Replaced,
    /// Conflicting track, stored record kept
    Kept,
}

impl Outcome {
    pub fn accepted(self) -> bool {
        matches!(self, Outcome::Inserted | Outcome::Merged)
    }
}

/// Running best key after an attempt, with the attempt's outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub best_key: Option<IdentityKey>,
    pub outcome: Outcome,
}

impl Resolution {
    pub fn accepted(&self) -> bool {
        self.outcome.accepted()
    }
}

/// Check if a stored record already has data for the slot being written.
pub fn check_collision(stored: &TrackRecord, attempt: Attempt<'_>) -> bool {
    match attempt {
        Attempt::Current => stored.position.is_some(),
        Attempt::Historical(year) => stored.years.contains_key(year),
        Attempt::Canonical => false,
    }
}

/// Write `incoming` under `key`, resolving collisions.
///
/// A current-year conflict always keeps the stored record. On a historical
/// conflict the stored record is only replaced when the caller's best key is
/// this key, or when no best key is known yet and the stored record is not
/// canonical. The key is never accepted on a collision.
pub fn update_record(
    catalog: &mut Catalog,
    key: &IdentityKey,
    incoming: &TrackRecord,
    attempt: Attempt<'_>,
    best_key: Option<IdentityKey>,
) -> Resolution {
    let Some(stored) = catalog.get(key) else {
        catalog.insert(key.clone(), incoming.clone());
        return Resolution {
            best_key,
            outcome: Outcome::Inserted,
        };
    };

    if check_collision(stored, attempt) {
        // A record holding a current-year position is never overwritten
        if attempt == Attempt::Current {
            let outcome = if stored.position == incoming.position {
                Outcome::Duplicate
            } else {
                log::debug!(
                    "Collision ({}): {} at {:?} kept against {:?} - {:?}",
                    attempt,
                    key,
                    stored.position,
                    incoming.artist,
                    incoming.title
                );
                Outcome::Kept
            };
            return Resolution { best_key, outcome };
        }

        let replace = best_key.as_ref() == Some(key)
            || (best_key.is_none() && !stored.is_canonical());
        let outcome = if replace {
            log::debug!(
                "Collision ({}): {} replaced by {:?} - {:?}",
                attempt,
                key,
                incoming.artist,
                incoming.title
            );
            catalog.insert(key.clone(), incoming.clone());
            Outcome::Replaced
        } else {
            log::debug!(
                "Collision ({}): {} kept against {:?} - {:?}",
                attempt,
                key,
                incoming.artist,
                incoming.title
            );
            Outcome::Kept
        };
        return Resolution { best_key, outcome };
    }

    let merged = stored.merged_over(incoming);
    let best_key = match &merged.best {
        Some(Best::Canonical) => Some(key.clone()),
        Some(Best::Alias(target)) => Some(target.clone()),
        None => best_key,
    };
    catalog.insert(key.clone(), merged);
    Resolution {
        best_key,
        outcome: Outcome::Merged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(artist: &str, title: &str) -> TrackRecord {
        TrackRecord {
            artist: artist.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn current(artist: &str, title: &str, position: u32) -> TrackRecord {
        TrackRecord {
            position: Some(position),
            ..record(artist, title)
        }
    }

    fn historical(artist: &str, title: &str, year: &str, position: u32) -> TrackRecord {
        TrackRecord {
            years: BTreeMap::from([(Year::new(year), position)]),
            ..record(artist, title)
        }
    }

    #[test]
    fn test_unseen_key_is_inserted() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        let incoming = current("Queen", "Under Pressure", 3);

        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Current, None);
        assert_eq!(resolution.outcome, Outcome::Inserted);
        assert!(resolution.accepted());
        assert_eq!(resolution.best_key, None);
        assert_eq!(catalog[&key], incoming);
    }

    #[test]
    fn test_same_current_row_is_duplicate() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        let incoming = current("Queen", "Under Pressure", 3);
        update_record(&mut catalog, &key, &incoming, Attempt::Current, None);
        let before = catalog.clone();

        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Current, None);
        assert_eq!(resolution.outcome, Outcome::Duplicate);
        assert!(!resolution.accepted());
        assert_eq!(catalog, before);
    }

    #[test]
    fn test_merge_propagates_canonical_best() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        catalog.insert(
            key.clone(),
            TrackRecord {
                best: Some(Best::Canonical),
                ..current("Queen", "Under Pressure", 3)
            },
        );

        let incoming = historical("QUEEN", "Under Pressure", "2015", 12);
        let year = Year::new("2015");
        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Historical(&year), None);
        assert_eq!(resolution.outcome, Outcome::Merged);
        assert_eq!(resolution.best_key, Some(key.clone()));
        assert_eq!(catalog[&key].artist, "Queen");
        assert_eq!(catalog[&key].years[&year], 12);
        assert_eq!(catalog[&key].position, Some(3));
    }

    #[test]
    fn test_merge_propagates_alias_target() {
        let mut catalog = Catalog::default();
        let canonical = IdentityKey::new("Queen & David Bowie", "Under Pressure");
        let alias = IdentityKey::new("Queen", "Under Pressure");
        catalog.insert(
            alias.clone(),
            TrackRecord {
                best: Some(Best::Alias(canonical.clone())),
                ..record("Queen", "Under Pressure")
            },
        );

        let year = Year::new("2015");
        let incoming = historical("Queen", "Under Pressure", "2015", 12);
        let resolution = update_record(&mut catalog, &alias, &incoming, Attempt::Historical(&year), None);
        assert!(resolution.accepted());
        assert_eq!(resolution.best_key, Some(canonical));
    }

    #[test]
    fn test_historical_collision_replaces_alias() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        let other = IdentityKey::new("Queen & David Bowie", "Under Pressure");
        catalog.insert(
            key.clone(),
            TrackRecord {
                best: Some(Best::Alias(other)),
                ..historical("Queen & David Bowie", "Under Pressure", "2016", 10)
            },
        );

        let year = Year::new("2016");
        let incoming = historical("Queen", "Under Pressure", "2016", 20);
        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Historical(&year), None);
        assert_eq!(resolution.outcome, Outcome::Replaced);
        assert!(!resolution.accepted());
        assert_eq!(catalog[&key], incoming);
    }

    #[test]
    fn test_collision_keeps_canonical_record() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        let stored = TrackRecord {
            best: Some(Best::Canonical),
            ..current("Queen", "Under Pressure", 3)
        };
        catalog.insert(key.clone(), stored.clone());

        let incoming = current("Queen", "Under Pressure", 8);
        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Current, None);
        assert_eq!(resolution.outcome, Outcome::Kept);
        assert_eq!(catalog[&key], stored);
    }

    #[test]
    fn test_collision_replaces_when_best_key_is_self() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        catalog.insert(
            key.clone(),
            TrackRecord {
                best: Some(Best::Canonical),
                ..historical("Queen", "Under Pressure", "2016", 10)
            },
        );

        let year = Year::new("2016");
        let incoming = historical("Queen", "Under Pressure", "2016", 20);
        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Historical(&year), Some(key.clone()));
        assert_eq!(resolution.outcome, Outcome::Replaced);
        assert_eq!(catalog[&key].years[&year], 20);
    }

    #[test]
    fn test_current_collision_never_replaces_alias() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        let stored = TrackRecord {
            best: Some(Best::Alias(IdentityKey::new("Queen & David Bowie", "Under Pressure"))),
            ..current("Queen & David Bowie", "Under Pressure", 1)
        };
        catalog.insert(key.clone(), stored.clone());

        let incoming = current("Queen", "Under Pressure (Live)", 2);
        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Current, None);
        assert_eq!(resolution.outcome, Outcome::Kept);
        assert_eq!(resolution.best_key, None);
        assert_eq!(catalog[&key], stored);

        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Current, Some(key.clone()));
        assert_eq!(resolution.outcome, Outcome::Kept);
        assert_eq!(catalog[&key], stored);
    }

    #[test]
    fn test_collision_kept_when_other_best_key_known() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        let stored = historical("Queen", "Under Pressure", "2016", 10);
        catalog.insert(key.clone(), stored.clone());

        let year = Year::new("2016");
        let incoming = historical("Queen", "Under Pressure", "2016", 20);
        let best = Some(IdentityKey::new("Queen & David Bowie", "Under Pressure"));
        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Historical(&year), best.clone());
        assert_eq!(resolution.outcome, Outcome::Kept);
        assert_eq!(resolution.best_key, best);
        assert_eq!(catalog[&key], stored);
    }

    #[test]
    fn test_canonical_attempt_never_collides() {
        let mut catalog = Catalog::default();
        let key = IdentityKey::new("Queen", "Under Pressure");
        catalog.insert(key.clone(), current("Queen", "Under Pressure", 3));

        let incoming = current("Queen", "Under Pressure", 8);
        let resolution = update_record(&mut catalog, &key, &incoming, Attempt::Canonical, Some(key.clone()));
        assert_eq!(resolution.outcome, Outcome::Merged);
        assert_eq!(catalog[&key].position, Some(3));
    }
}
