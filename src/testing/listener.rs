use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::{Frequency, Level};

/// Scripted stand-in for the person being tested
pub enum SimulatedListener {
    /// Hears anything at or above the threshold, at every frequency
    Threshold(Level),
    /// Per-frequency thresholds; frequencies not listed are never heard
    PerFrequency(BTreeMap<Frequency, Level>),
    /// Fixed answers, cycled
    Pattern {
        answers: Vec<bool>,
        cursor: AtomicUsize,
    },
}

impl SimulatedListener {
    pub fn threshold(db: u8) -> Self {
        SimulatedListener::Threshold(Level::new(db))
    }

    pub fn pattern(answers: Vec<bool>) -> Self {
        SimulatedListener::Pattern {
            answers,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn hears(&self, frequency: Frequency, level: Level) -> bool {
        match self {
            SimulatedListener::Threshold(threshold) => level >= *threshold,
            SimulatedListener::PerFrequency(thresholds) => thresholds
                .get(&frequency)
                .map(|threshold| level >= *threshold)
                .unwrap_or(false),
            SimulatedListener::Pattern { answers, cursor } => {
                if answers.is_empty() {
                    return false;
                }
                let i = cursor.fetch_add(1, Ordering::Relaxed);
                answers[i % answers.len()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_listener() {
        let listener = SimulatedListener::threshold(40);
        assert!(listener.hears(Frequency::Hz500, Level::new(40)));
        assert!(!listener.hears(Frequency::Hz500, Level::new(39)));
    }

    #[test]
    fn test_pattern_listener_cycles() {
        let listener = SimulatedListener::pattern(vec![true, false]);
        let answers: Vec<bool> = (0..4)
            .map(|_| listener.hears(Frequency::Hz1000, Level::new(50)))
            .collect();
        assert_eq!(answers, vec![true, false, true, false]);
    }
}
