// src/stabilizer.rs - Majority-vote smoothing of per-frame labels
use crate::classifier::ActionLabel;
use crate::config::EngineConfig;
use crate::history::BoundedHistory;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Per-track vote buffer plus the last committed label.
#[derive(Debug, Clone)]
pub struct LabelHistory {
    votes: BoundedHistory<ActionLabel>,
    committed: ActionLabel,
}

impl LabelHistory {
    pub fn committed(&self) -> &ActionLabel {
        &self.committed
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stabilized {
    /// Label to report to the host.
    pub label: ActionLabel,
    /// `label` has enough votes to display but not to commit.
    pub provisional: bool,
    /// Label the segment tracker follows.
    pub committed: ActionLabel,
}

#[derive(Debug, Clone)]
pub struct LabelStabilizer {
    window: usize,
    min_confident_frames: usize,
    provisional_min_votes: usize,
    precedence: Vec<String>,
}

impl LabelStabilizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: config.stabilization_window,
            min_confident_frames: config.min_confident_frames,
            provisional_min_votes: config.provisional_min_votes,
            precedence: config.label_precedence.clone(),
        }
    }

    pub fn new_history(&self) -> LabelHistory {
        LabelHistory {
            votes: BoundedHistory::new(self.window),
            committed: ActionLabel::Unknown,
        }
    }

    /// Records `instant` and returns the stabilized label. The result depends
    /// only on the buffered votes and the previously committed label.
    pub fn observe(&self, history: &mut LabelHistory, instant: ActionLabel) -> Stabilized {
        history.votes.push(instant);

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for label in history.votes.iter() {
            if let ActionLabel::Named(name) = label {
                *counts.entry(name.as_str()).or_insert(0) += 1;
            }
        }

        // Decisive labels first, even if a more common one is also present
        let decisive = counts
            .iter()
            .filter(|&(_, &count)| count >= self.min_confident_frames)
            .map(|(&name, _)| name)
            .min_by_key(|&name| self.rank(name));

        if let Some(name) = decisive {
            let label = ActionLabel::named(name);
            history.committed = label.clone();
            return Stabilized {
                label: label.clone(),
                provisional: false,
                committed: label,
            };
        }

        let most_common = counts
            .iter()
            .map(|(&name, &count)| (name, count))
            .min_by_key(|&(name, count)| (Reverse(count), self.rank(name)));

        if let Some((name, count)) = most_common {
            let already_committed =
                matches!(&history.committed, ActionLabel::Named(c) if c == name);
            if count >= self.provisional_min_votes && !already_committed {
                return Stabilized {
                    label: ActionLabel::named(name),
                    provisional: true,
                    committed: history.committed.clone(),
                };
            }
        }

        Stabilized {
            label: history.committed.clone(),
            provisional: false,
            committed: history.committed.clone(),
        }
    }

    fn rank<'a>(&self, name: &'a str) -> (usize, &'a str) {
        let position = self
            .precedence
            .iter()
            .position(|p| p == name)
            .unwrap_or(self.precedence.len());
        (position, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stabilizer(window: usize, min_confident: usize) -> LabelStabilizer {
        LabelStabilizer::new(&EngineConfig {
            stabilization_window: window,
            min_confident_frames: min_confident,
            provisional_min_votes: 2,
            ..Default::default()
        })
    }

    fn named(name: &str) -> ActionLabel {
        ActionLabel::named(name)
    }

    #[test]
    fn test_commits_after_min_confident_frames() {
        let s = stabilizer(10, 3);
        let mut h = s.new_history();

        assert_eq!(s.observe(&mut h, named("Sitting")).label, ActionLabel::Unknown);

        let second = s.observe(&mut h, named("Sitting"));
        assert_eq!(second.label, named("Sitting"));
        assert!(second.provisional);
        assert_eq!(second.committed, ActionLabel::Unknown);

        let third = s.observe(&mut h, named("Sitting"));
        assert!(!third.provisional);
        assert_eq!(third.committed, named("Sitting"));
    }

    #[test]
    fn test_precedence_beats_frequency() {
        let s = stabilizer(10, 2);
        let mut h = s.new_history();
        for label in ["Standing", "Standing", "Standing", "Clapping", "Clapping"] {
            s.observe(&mut h, named(label));
        }
        assert_eq!(h.committed(), &named("Clapping"));
    }

    #[test]
    fn test_unlisted_labels_rank_after_listed() {
        let s = stabilizer(10, 2);
        let mut h = s.new_history();
        for label in ["Waving", "Waving", "Standing", "Standing"] {
            s.observe(&mut h, named(label));
        }
        assert_eq!(h.committed(), &named("Standing"));
    }

    #[test]
    fn test_holds_committed_label_through_noise() {
        let s = stabilizer(4, 2);
        let mut h = s.new_history();
        s.observe(&mut h, named("Sitting"));
        s.observe(&mut h, named("Sitting"));

        for _ in 0..4 {
            let out = s.observe(&mut h, ActionLabel::Unknown);
            assert_eq!(out.label, named("Sitting"));
            assert!(!out.provisional);
        }
        assert_eq!(h.len(), 4);
    }

    #[test]
    fn test_insufficient_data_is_not_a_vote() {
        let s = stabilizer(5, 1);
        let mut h = s.new_history();
        let out = s.observe(&mut h, ActionLabel::InsufficientData);
        assert_eq!(out.label, ActionLabel::Unknown);
    }

    #[test]
    fn test_same_buffer_same_output() {
        let s = stabilizer(3, 2);
        let mut a = s.new_history();
        let mut b = s.new_history();

        // Different prefixes, identical final buffers
        for label in ["Standing", "Sitting", "Clapping", "Sitting", "Sitting"] {
            s.observe(&mut a, named(label));
        }
        for label in ["Clapping", "Sitting", "Sitting"] {
            s.observe(&mut b, named(label));
        }
        let out_a = s.observe(&mut a, named("Standing"));
        let out_b = s.observe(&mut b, named("Standing"));
        assert_eq!(out_a, out_b);
    }
}
