use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

pub mod store;

/// The fixed set of reactions a user can leave on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 6] = [
        ReactionKind::Like,
        ReactionKind::Love,
        ReactionKind::Haha,
        ReactionKind::Wow,
        ReactionKind::Sad,
        ReactionKind::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Love => "love",
            ReactionKind::Haha => "haha",
            ReactionKind::Wow => "wow",
            ReactionKind::Sad => "sad",
            ReactionKind::Angry => "angry",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        ReactionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown reaction kind '{}'", s))
    }
}

/// Per-kind counts. Kinds with a zero count are never stored, so adding
/// and then removing a reaction leaves the tally exactly as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReactionTally(BTreeMap<ReactionKind, u64>);

impl ReactionTally {
    pub fn get(&self, kind: ReactionKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn sum(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn increment(&mut self, kind: ReactionKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, kind: ReactionKind) {
        if let Some(count) = self.0.get_mut(&kind) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.0.remove(&kind);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReactionKind, u64)> + '_ {
        self.0.iter().map(|(kind, count)| (*kind, *count))
    }
}

impl FromIterator<(ReactionKind, u64)> for ReactionTally {
    fn from_iter<I: IntoIterator<Item = (ReactionKind, u64)>>(iter: I) -> Self {
        ReactionTally(iter.into_iter().filter(|(_, count)| *count > 0).collect())
    }
}

impl<'de> Deserialize<'de> for ReactionTally {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<HashMap<String, Option<u64>>>::deserialize(deserializer)?;
        // Kinds this client doesn't know are dropped rather than rejected.
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, count)| {
                let kind = key.parse::<ReactionKind>().ok()?;
                Some((kind, count.unwrap_or(0)))
            })
            .collect())
    }
}

/// Maps `null` and `""` to no reaction.
pub fn deserialize_optional_kind<'de, D>(
    deserializer: D,
) -> Result<Option<ReactionKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTransition {
    Added(ReactionKind),
    Switched { from: ReactionKind, to: ReactionKind },
    Removed(ReactionKind),
}

/// Reaction state of one post as seen by the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReactionState {
    pub counts: ReactionTally,
    /// Aggregate count as reported by the server; may drift from `counts`.
    pub total: u64,
    pub mine: Option<ReactionKind>,
}

impl ReactionState {
    pub fn new(counts: ReactionTally, total: Option<u64>, mine: Option<ReactionKind>) -> Self {
        let total = total.unwrap_or_else(|| counts.sum());
        Self {
            counts,
            total,
            mine,
        }
    }

    /// Applies a click on `kind`: clicking the active kind toggles it off,
    /// anything else replaces the current reaction.
    pub fn select(&mut self, kind: ReactionKind) -> ReactionTransition {
        match self.mine {
            Some(current) if current == kind => {
                self.counts.decrement(kind);
                self.total = self.total.saturating_sub(1);
                self.mine = None;
                ReactionTransition::Removed(kind)
            }
            Some(previous) => {
                self.counts.decrement(previous);
                self.counts.increment(kind);
                self.mine = Some(kind);
                ReactionTransition::Switched {
                    from: previous,
                    to: kind,
                }
            }
            None => {
                self.counts.increment(kind);
                self.total += 1;
                self.mine = Some(kind);
                ReactionTransition::Added(kind)
            }
        }
    }

    /// Overwrites local state with what the server says happened.
    pub fn reconcile(&mut self, response: &ReactionResponse) {
        self.mine = match response.action {
            ReactionAction::Added => response.reaction_type,
            ReactionAction::Removed => None,
        };
        if let Some(counts) = &response.reaction_counts {
            self.counts = counts.clone();
            self.total = response.total_reactions.unwrap_or_else(|| counts.sum());
        } else if let Some(total) = response.total_reactions {
            self.total = total;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Added,
    Removed,
}

#[derive(Debug, Serialize)]
pub struct ReactionRequest {
    pub reaction_type: ReactionKind,
}

/// Server verdict for a reaction toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub action: ReactionAction,
    #[serde(default, deserialize_with = "deserialize_optional_kind")]
    pub reaction_type: Option<ReactionKind>,
    #[serde(default)]
    pub reaction_counts: Option<ReactionTally>,
    #[serde(default)]
    pub total_reactions: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(like: u64, love: u64) -> ReactionState {
        let counts: ReactionTally = [(ReactionKind::Like, like), (ReactionKind::Love, love)]
            .into_iter()
            .collect();
        ReactionState::new(counts, None, None)
    }

    #[test]
    fn test_select_then_switch_scenario() {
        let mut reactions = state(3, 1);

        reactions.select(ReactionKind::Love);
        assert_eq!(reactions.counts.get(ReactionKind::Like), 3);
        assert_eq!(reactions.counts.get(ReactionKind::Love), 2);
        assert_eq!(reactions.mine, Some(ReactionKind::Love));

        let transition = reactions.select(ReactionKind::Like);
        assert_eq!(
            transition,
            ReactionTransition::Switched {
                from: ReactionKind::Love,
                to: ReactionKind::Like
            }
        );
        assert_eq!(reactions.counts.get(ReactionKind::Like), 4);
        assert_eq!(reactions.counts.get(ReactionKind::Love), 1);
        assert_eq!(reactions.mine, Some(ReactionKind::Like));
        assert_eq!(reactions.total, 5);
    }

    #[test]
    fn test_toggle_twice_is_identity() {
        let original = state(3, 1);
        for kind in ReactionKind::ALL {
            let mut reactions = original.clone();
            reactions.select(kind);
            assert_eq!(reactions.select(kind), ReactionTransition::Removed(kind));
            assert_eq!(reactions, original, "toggling {} twice", kind);
        }
    }

    #[test]
    fn test_toggle_off_existing_reaction() {
        let mut reactions = ReactionState::new(
            [(ReactionKind::Haha, 1)].into_iter().collect(),
            Some(1),
            Some(ReactionKind::Haha),
        );
        reactions.select(ReactionKind::Haha);
        assert_eq!(reactions.counts, ReactionTally::default());
        assert_eq!(reactions.total, 0);
        assert_eq!(reactions.mine, None);
    }

    #[test]
    fn test_empty_reaction_type_is_none() {
        let response: ReactionResponse =
            serde_json::from_value(json!({ "action": "added", "reaction_type": "" })).unwrap();
        assert_eq!(response.reaction_type, None);

        let response: ReactionResponse =
            serde_json::from_value(json!({ "action": "removed", "reaction_type": null })).unwrap();
        assert_eq!(response.reaction_type, None);
    }

    #[test]
    fn test_reconcile_overwrites_local_guess() {
        let mut reactions = state(3, 1);
        reactions.select(ReactionKind::Love);

        let response: ReactionResponse = serde_json::from_value(json!({
            "action": "added",
            "reaction_type": "wow",
            "reaction_counts": { "like": 3, "love": 1, "wow": 1 }
        }))
        .unwrap();
        reactions.reconcile(&response);

        assert_eq!(reactions.mine, Some(ReactionKind::Wow));
        assert_eq!(reactions.counts.get(ReactionKind::Love), 1);
        assert_eq!(reactions.total, 5);
    }

    #[test]
    fn test_tally_drops_zero_and_unknown_kinds() {
        let tally: ReactionTally =
            serde_json::from_value(json!({ "like": 2, "love": 0, "party": 7 })).unwrap();
        assert_eq!(tally.iter().collect::<Vec<_>>(), vec![(ReactionKind::Like, 2)]);
    }
}
