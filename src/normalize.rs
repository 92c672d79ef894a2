//! Artist and title normalization into alternative spellings.
//!
//! A raw artist or title from one chart source is expanded into every spelling
//! that could have been used for the same artist or title in another year or
//! source. All rules are deterministic and driven by `NormalizerConfig`.
//!
//! CONTRACT: the last element of every returned `Alternatives` is the
//! canonical (preferred display) form. Earlier elements only exist to catch
//! older spellings.

use crate::config::NormalizerConfig;

// ============================================================================
// ALTERNATIVES
// ============================================================================

/// Ordered, duplicate-free list of alternative spellings, canonical last.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alternatives {
    items: Vec<String>,
}

impl Alternatives {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list holding only the canonical form.
    pub fn single(canonical: String) -> Self {
        Self {
            items: vec![canonical],
        }
    }

    /// Add an alternative. An existing alternative keeps its position.
    pub fn insert(&mut self, alternative: String) -> bool {
        if self.contains(&alternative) {
            return false;
        }
        self.items.push(alternative);
        true
    }

    /// Move (or add) the canonical form to the end of the list.
    pub fn set_canonical(&mut self, canonical: String) {
        self.items.retain(|item| *item != canonical);
        self.items.push(canonical);
    }

    /// The canonical form, or "" for an empty list.
    pub fn canonical(&self) -> &str {
        self.items.last().map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, alternative: &str) -> bool {
        self.items.iter().any(|item| item == alternative)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// True if both lists share at least one spelling.
    pub fn intersects(&self, other: &Alternatives) -> bool {
        self.iter().any(|item| other.contains(item))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }
}

impl Extend<String> for Alternatives {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        for alternative in iter {
            self.insert(alternative);
        }
    }
}

impl IntoIterator for Alternatives {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Normalizer for one run, owning its immutable configuration.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Find variants of `text` produced by the removal rules and the
    /// translation table. Only rules that match contribute; `text` itself is
    /// never part of the result.
    pub fn find_text_alternatives(&self, text: &str) -> Vec<String> {
        let removed = self
            .config
            .removes
            .iter()
            .filter(|remove| !remove.is_empty() && text.contains(remove.as_str()))
            .map(|remove| text.replace(remove.as_str(), ""));
        let translated = self
            .config
            .translations
            .iter()
            .filter(|(from, _)| !from.is_empty() && text.contains(from.as_str()))
            .map(|(from, to)| text.replace(from.as_str(), to));

        let mut alternatives: Vec<String> = Vec::new();
        for alternative in removed.chain(translated) {
            if alternative != text && !alternatives.contains(&alternative) {
                alternatives.push(alternative);
            }
        }
        alternatives
    }

    /// Find alternative titles that could have been used in other years.
    /// A configured direct fix short-circuits every other rule.
    pub fn normalize_title(&self, title: &str) -> Alternatives {
        let title = self.config.translate(title);
        if let Some(fix) = self.config.title_fixes.get(&title) {
            return Alternatives::single(fix.clone());
        }

        let mut alternatives = Alternatives::new();
        alternatives.extend(self.find_text_alternatives(&title));

        // "Title (Live)" may have been listed as "Title"
        if let Some((prefix, _)) = title.split_once(" (") {
            if let Some(fix) = self.config.title_fixes.get(prefix) {
                return Alternatives::single(fix.clone());
            }
            alternatives.insert(prefix.to_string());
        }

        // "(Sittin' On) The Dock Of The Bay"
        if title.starts_with('(') {
            alternatives.insert(title.replace(['(', ')'], ""));
            let tail = title.rsplit(") ").next().unwrap_or(&title);
            alternatives.insert(tail.to_string());
        }

        alternatives.set_canonical(title);
        alternatives
    }

    /// Find alternative artists which may hold data on the tracks of `artist`
    /// in other years. Collaborations yield their members, reversed credits,
    /// parent groups and replaced spellings.
    pub fn normalize_artist(&self, artist: &str) -> Alternatives {
        let mut current = self.config.translate(artist);
        if self.config.artist_no_splits.contains(&current) {
            return Alternatives::single(current);
        }

        let (mut alternatives, split_count) = self.split_artist(&current);

        for (search, group) in &self.config.artist_groups {
            if current.contains(search.as_str()) {
                alternatives.insert(group.clone());
            }
        }

        for (search, replace) in &self.config.artist_replaces {
            current = current.replace(search.as_str(), replace);
            alternatives.insert(current.clone());
        }

        alternatives.extend(self.find_text_alternatives(&current));

        if let Some(full) = self.config.artist_full_replaces.get(&current) {
            current = full.clone();
            if split_count == 0 {
                alternatives.extend(self.split_artist(&current).0);
            }
        }

        alternatives.set_canonical(current);
        alternatives
    }

    /// Split a collaboration on every configured separator. Each separator
    /// that splits contributes the parts and the parts credited in reverse
    /// order. Separators inside a no-split act are left alone.
    ///
    /// Returns the alternatives and the number of separators that split.
    pub fn split_artist(&self, artist: &str) -> (Alternatives, usize) {
        let protected = self.protected_ranges(artist);
        let mut alternatives = Alternatives::new();
        let mut split_count = 0;

        for separator in &self.config.artist_splits {
            if separator.is_empty() {
                continue;
            }
            let points = split_points(artist, separator, &protected);
            if points.is_empty() {
                continue;
            }
            split_count += 1;

            let mut parts = Vec::with_capacity(points.len() + 1);
            let mut last = 0;
            for start in points {
                parts.push(&artist[last..start]);
                last = start + separator.len();
            }
            parts.push(&artist[last..]);

            for part in &parts {
                if !part.trim().is_empty() {
                    alternatives.insert(part.to_string());
                }
            }
            let reversed: Vec<&str> = parts.iter().rev().copied().collect();
            alternatives.insert(reversed.join(separator));
        }

        (alternatives, split_count)
    }

    /// Byte ranges of `artist` covered by no-split acts.
    fn protected_ranges(&self, artist: &str) -> Vec<(usize, usize)> {
        self.config
            .artist_no_splits
            .iter()
            .filter(|name| !name.is_empty())
            .flat_map(|name| {
                artist
                    .match_indices(name.as_str())
                    .map(|(start, found)| (start, start + found.len()))
            })
            .collect()
    }
}

/// Start offsets of `separator` in `artist` that do not touch a protected range.
fn split_points(artist: &str, separator: &str, protected: &[(usize, usize)]) -> Vec<usize> {
    artist
        .match_indices(separator)
        .map(|(start, _)| start)
        .filter(|&start| {
            let end = start + separator.len();
            !protected.iter().any(|&(from, to)| start < to && end > from)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
