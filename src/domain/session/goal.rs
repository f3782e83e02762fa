//! Session goals and the bounded goal stack.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Percentage, ValidationError};

/// What the agent is trying to achieve for the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalType {
    Relaxation,
    Bonding,
    Education,
    Safety,
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Relaxation => "RELAXATION",
            Self::Bonding => "BONDING",
            Self::Education => "EDUCATION",
            Self::Safety => "SAFETY",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle of a goal on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Active,
    Achieved,
}

/// A single goal with its progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub target_minutes: u32,
    pub progress_percent: Percentage,
    pub status: GoalStatus,
}

impl Goal {
    /// Creates a new active goal with no progress.
    pub fn new(goal_type: GoalType, target_minutes: u32) -> Self {
        Self {
            goal_type,
            target_minutes,
            progress_percent: Percentage::ZERO,
            status: GoalStatus::Active,
        }
    }
}

/// Ordered stack of active goals, at most [`GoalStack::CAPACITY`] deep.
///
/// The head (most recently pushed) is the goal currently being worked on.
/// Achieved goals are popped, so every goal held here is active.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Goal>", into = "Vec<Goal>")]
pub struct GoalStack {
    goals: Vec<Goal>,
}

impl GoalStack {
    /// Maximum stack depth.
    pub const CAPACITY: usize = 5;

    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a goal on top of the stack.
    pub fn push(&mut self, goal: Goal) -> Result<(), ValidationError> {
        if self.goals.len() >= Self::CAPACITY {
            return Err(ValidationError::capacity_exceeded(
                "active_goals",
                Self::CAPACITY,
            ));
        }
        self.goals.push(Goal {
            status: GoalStatus::Active,
            ..goal
        });
        Ok(())
    }

    /// The goal at the head of the stack.
    pub fn active(&self) -> Option<&Goal> {
        self.goals.last()
    }

    /// Records progress on the head goal.
    ///
    /// When progress reaches 100% the goal is marked achieved, popped and
    /// returned. Returns `None` if the stack is empty or the goal is still
    /// in progress.
    pub fn record_progress(&mut self, progress: Percentage) -> Option<Goal> {
        let head = self.goals.last_mut()?;
        head.progress_percent = progress;
        if !progress.is_complete() {
            return None;
        }
        let mut achieved = self.goals.pop()?;
        achieved.status = GoalStatus::Achieved;
        Some(achieved)
    }

    /// Goal types from head to bottom.
    pub fn goal_types(&self) -> Vec<GoalType> {
        self.goals.iter().rev().map(|g| g.goal_type).collect()
    }

    /// Iterates goals from bottom to head.
    pub fn iter(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

impl TryFrom<Vec<Goal>> for GoalStack {
    type Error = ValidationError;

    fn try_from(goals: Vec<Goal>) -> Result<Self, Self::Error> {
        let mut stack = GoalStack::new();
        for goal in goals {
            stack.push(goal)?;
        }
        Ok(stack)
    }
}

impl From<GoalStack> for Vec<Goal> {
    fn from(stack: GoalStack) -> Self {
        stack.goals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_stack() -> GoalStack {
        let mut stack = GoalStack::new();
        for _ in 0..GoalStack::CAPACITY {
            stack.push(Goal::new(GoalType::Relaxation, 10)).unwrap();
        }
        stack
    }

    #[test]
    fn push_beyond_capacity_fails() {
        let mut stack = full_stack();
        let err = stack.push(Goal::new(GoalType::Bonding, 5)).unwrap_err();
        assert!(matches!(err, ValidationError::CapacityExceeded { capacity: 5, .. }));
        assert_eq!(stack.len(), 5);
    }

    #[test]
    fn head_is_most_recent_push() {
        let mut stack = GoalStack::new();
        stack.push(Goal::new(GoalType::Relaxation, 10)).unwrap();
        stack.push(Goal::new(GoalType::Education, 5)).unwrap();
        assert_eq!(stack.active().unwrap().goal_type, GoalType::Education);
        assert_eq!(
            stack.goal_types(),
            vec![GoalType::Education, GoalType::Relaxation]
        );
    }

    #[test]
    fn partial_progress_keeps_goal_on_stack() {
        let mut stack = GoalStack::new();
        stack.push(Goal::new(GoalType::Relaxation, 10)).unwrap();
        assert!(stack.record_progress(Percentage::new(40)).is_none());
        assert_eq!(stack.active().unwrap().progress_percent.value(), 40);
    }

    #[test]
    fn full_progress_pops_achieved_goal() {
        let mut stack = GoalStack::new();
        stack.push(Goal::new(GoalType::Bonding, 15)).unwrap();
        stack.push(Goal::new(GoalType::Relaxation, 10)).unwrap();

        let achieved = stack.record_progress(Percentage::HUNDRED).unwrap();

        assert_eq!(achieved.goal_type, GoalType::Relaxation);
        assert_eq!(achieved.status, GoalStatus::Achieved);
        assert_eq!(stack.active().unwrap().goal_type, GoalType::Bonding);
    }

    #[test]
    fn progress_on_empty_stack_is_ignored() {
        let mut stack = GoalStack::new();
        assert!(stack.record_progress(Percentage::HUNDRED).is_none());
    }

    #[test]
    fn deserializing_oversized_stack_fails() {
        let goals: Vec<Goal> = (0..6).map(|_| Goal::new(GoalType::Safety, 1)).collect();
        let json = serde_json::to_string(&goals).unwrap();
        assert!(serde_json::from_str::<GoalStack>(&json).is_err());
    }

    #[test]
    fn goal_serializes_with_type_key() {
        let json = serde_json::to_value(Goal::new(GoalType::Relaxation, 10)).unwrap();
        assert_eq!(json["type"], "RELAXATION");
        assert_eq!(json["targetMinutes"], 10);
        assert_eq!(json["status"], "active");
    }
}
