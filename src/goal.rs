use log::info;

use crate::ids::NetId;
use crate::settings::GoalSet;

/// One-shot victory latch over the configured goal set.
#[derive(Debug, Default)]
pub struct GoalEvaluator {
    goals: GoalSet,
    reached: bool,
}

impl GoalEvaluator {
    pub fn new(goals: GoalSet) -> Self {
        Self {
            goals,
            reached: false,
        }
    }

    /// Install the goal set from slot data. A latch that already fired stays fired.
    pub fn set_goals(&mut self, goals: GoalSet) {
        self.goals = goals;
    }

    pub fn goals(&self) -> &GoalSet {
        &self.goals
    }

    /// Every requirement met. An empty goal set is never satisfied.
    pub fn is_satisfied(&self, owned: impl Fn(NetId) -> u32) -> bool {
        !self.goals.is_empty() && self.goals.iter().all(|(id, need)| owned(id) >= need)
    }

    /// Returns true exactly once: on the first call that finds the goals satisfied.
    pub fn check(&mut self, owned: impl Fn(NetId) -> u32) -> bool {
        if self.reached || !self.is_satisfied(owned) {
            return false;
        }
        self.reached = true;
        info!("goal reached ({} requirements)", self.goals.len());
        true
    }

    pub fn reached(&self) -> bool {
        self.reached
    }
}
