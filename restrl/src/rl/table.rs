//! Generic tabular learner.
//!
//! A Q-table keyed by a state string (usually an operation id, sometimes a
//! composite key) mapping actions to value estimates. Tables are lazily
//! populated: unseen state/action pairs default to zero. Operations are
//! single-shot decisions, so the successor max is taken over the same
//! state's table.

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::Rng;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct QTable<A: Clone + Eq + Hash> {
    alpha: f64,
    gamma: f64,
    tables: IndexMap<String, IndexMap<A, f64>>,
}

impl<A: Clone + Eq + Hash> QTable<A> {
    pub fn new(alpha: f64, gamma: f64) -> Self {
        Self {
            alpha,
            gamma,
            tables: IndexMap::new(),
        }
    }

    /// Pre-populate a state's action slots at zero. Existing estimates are
    /// kept.
    pub fn seed_actions<I>(&mut self, state: &str, actions: I)
    where
        I: IntoIterator<Item = A>,
    {
        let table = self.tables.entry(state.to_string()).or_default();
        for action in actions {
            table.entry(action).or_insert(0.0);
        }
    }

    /// Argmax action for a state; ties break toward the first-seen action.
    pub fn best(&self, state: &str) -> Option<(&A, f64)> {
        let table = self.tables.get(state)?;
        let mut best: Option<(&A, f64)> = None;
        for (action, value) in table {
            match best {
                Some((_, current)) if *value <= current => {}
                _ => best = Some((action, *value)),
            }
        }
        best
    }

    /// Uniformly random action among the state's populated slots.
    pub fn random(&self, state: &str, rng: &mut StdRng) -> Option<&A> {
        let table = self.tables.get(state)?;
        if table.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..table.len());
        table.get_index(index).map(|(action, _)| action)
    }

    /// Standard tabular update:
    /// `Q(s,a) ← Q(s,a) + α·(r + γ·max_a' Q(s,a') − Q(s,a))`.
    pub fn update(&mut self, state: &str, action: &A, reward: f64) {
        let table = self.tables.entry(state.to_string()).or_default();
        table.entry(action.clone()).or_insert(0.0);
        let max_next = table
            .values()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if let Some(entry) = table.get_mut(action) {
            *entry += self.alpha * (reward + self.gamma * max_next - *entry);
        }
    }

    pub fn value(&self, state: &str, action: &A) -> f64 {
        self.tables
            .get(state)
            .and_then(|t| t.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Count of zero-valued (never productively updated) action slots.
    pub fn zeros(&self, state: &str) -> usize {
        self.tables
            .get(state)
            .map(|t| t.values().filter(|v| **v == 0.0).count())
            .unwrap_or(0)
    }

    pub fn actions(&self, state: &str) -> impl Iterator<Item = &A> {
        self.tables.get(state).into_iter().flat_map(|t| t.keys())
    }

    pub fn len(&self, state: &str) -> usize {
        self.tables.get(state).map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, state: &str) -> bool {
        self.len(state) == 0
    }
}
