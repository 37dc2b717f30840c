//! Exploration scheduling across the decision axes.
//!
//! Each iteration exactly one target is drawn: a single agent to explore
//! (and be updated), `None` for pure exploitation, or `All` for broad
//! simultaneous exploration. The probability of `All` decays exponentially
//! with the elapsed fraction of the time budget; a fixed slice of the
//! remainder is redistributed toward agents with the most unexplored table
//! cells for the current operation; the rest is spread uniformly, which
//! keeps a permanent floor under every axis.

use rand::rngs::StdRng;
use rand::Rng;

/// The axis chosen to explore this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreTarget {
    ParameterBody,
    DataSource,
    Value,
    Dependency,
    Header,
    None,
    All,
}

/// Zero-valued cell counts per axis for the current operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCounts {
    pub parameter_body: usize,
    pub data_source: usize,
    pub value: usize,
    pub dependency: usize,
    pub header: usize,
}

impl ZeroCounts {
    fn for_target(&self, target: ExploreTarget) -> usize {
        match target {
            ExploreTarget::ParameterBody => self.parameter_body,
            ExploreTarget::DataSource => self.data_source,
            ExploreTarget::Value => self.value,
            ExploreTarget::Dependency => self.dependency,
            ExploreTarget::Header => self.header,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExplorationScheduler {
    header_enabled: bool,
    all_initial: f64,
    all_floor: f64,
    decay: f64,
    priority_share: f64,
}

impl ExplorationScheduler {
    pub fn new(header_enabled: bool) -> Self {
        Self {
            header_enabled,
            all_initial: 0.5,
            all_floor: 0.05,
            decay: 3.0,
            priority_share: 0.3,
        }
    }

    fn axes(&self) -> Vec<ExploreTarget> {
        let mut axes = vec![
            ExploreTarget::ParameterBody,
            ExploreTarget::DataSource,
            ExploreTarget::Value,
            ExploreTarget::Dependency,
        ];
        if self.header_enabled {
            axes.push(ExploreTarget::Header);
        }
        axes.push(ExploreTarget::None);
        axes
    }

    /// The full target distribution for a point in the run.
    ///
    /// `elapsed_fraction` is clamped to [0, 1].
    pub fn probabilities(
        &self,
        elapsed_fraction: f64,
        zeros: &ZeroCounts,
    ) -> Vec<(ExploreTarget, f64)> {
        let fraction = elapsed_fraction.clamp(0.0, 1.0);
        let p_all = (self.all_initial * (-self.decay * fraction).exp()).max(self.all_floor);
        let remaining = 1.0 - p_all;

        let axes = self.axes();
        let total_zeros: usize = axes.iter().map(|t| zeros.for_target(*t)).sum();
        let (priority_mass, uniform_mass) = if total_zeros > 0 {
            (
                remaining * self.priority_share,
                remaining * (1.0 - self.priority_share),
            )
        } else {
            (0.0, remaining)
        };
        let uniform_each = uniform_mass / axes.len() as f64;

        let mut distribution = Vec::with_capacity(axes.len() + 1);
        distribution.push((ExploreTarget::All, p_all));
        for target in axes {
            let priority = if total_zeros > 0 {
                priority_mass * zeros.for_target(target) as f64 / total_zeros as f64
            } else {
                0.0
            };
            distribution.push((target, uniform_each + priority));
        }
        distribution
    }

    /// Draw the exploring target for this iteration.
    pub fn choose(
        &self,
        elapsed_fraction: f64,
        zeros: &ZeroCounts,
        rng: &mut StdRng,
    ) -> ExploreTarget {
        let distribution = self.probabilities(elapsed_fraction, zeros);
        let mut draw: f64 = rng.gen();
        for (target, probability) in &distribution {
            if draw < *probability {
                return *target;
            }
            draw -= probability;
        }
        // Floating-point residue lands on the last entry.
        distribution
            .last()
            .map(|(target, _)| *target)
            .unwrap_or(ExploreTarget::None)
    }
}
