//! Weighted fair selection across priority classes.

use serde::{Deserialize, Serialize};

use crate::domain::Priority;

/// Relative dequeue weights per priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub critical: u32,
    pub default: u32,
    pub low: u32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            critical: 6,
            default: 3,
            low: 1,
        }
    }
}

impl PriorityWeights {
    pub fn get(&self, priority: Priority) -> u32 {
        match priority {
            Priority::Critical => self.critical,
            Priority::Default => self.default,
            Priority::Low => self.low,
        }
    }
}

/// Smooth weighted round-robin.
///
/// Each pick adds every eligible class's weight to its running credit, takes
/// the class with the highest credit and charges it the total eligible weight.
/// Over any window where all classes stay non-empty, picks are spread in
/// exact proportion to the weights, so low never starves. Ties go to the
/// higher priority. Classes with nothing ready have their credit reset.
#[derive(Debug, Clone, Default)]
pub struct WeightedSelector {
    credit: [i64; 3],
}

impl WeightedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick(
        &mut self,
        weights: &PriorityWeights,
        eligible: impl Fn(Priority) -> bool,
    ) -> Option<Priority> {
        let mut total = 0i64;
        let mut best: Option<Priority> = None;

        for priority in Priority::ALL {
            let i = priority.index();
            let weight = i64::from(weights.get(priority));
            if weight == 0 || !eligible(priority) {
                self.credit[i] = 0;
                continue;
            }
            self.credit[i] += weight;
            total += weight;
            match best {
                Some(b) if self.credit[b.index()] >= self.credit[i] => {}
                _ => best = Some(priority),
            }
        }

        if let Some(b) = best {
            self.credit[b.index()] -= total;
        }
        best
    }
}
