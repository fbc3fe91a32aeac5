//! Bounded undo/redo log over full annotation snapshots

use std::collections::VecDeque;

use crate::domain::Annotation;

/// Maximum number of undo steps kept
pub const MAX_HISTORY: usize = 50;

/// Linear undo/redo history
///
/// Only committed states enter the log. Every snapshot is an owned copy, so
/// nothing handed out by `undo`/`redo` can alter the stored states.
#[derive(Clone, Debug)]
pub struct AnnotationHistory {
    past: VecDeque<Vec<Annotation>>,
    current: Vec<Annotation>,
    future: Vec<Vec<Annotation>>,
    capacity: usize,
}

impl Default for AnnotationHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }
}

impl AnnotationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            past: VecDeque::new(),
            current: Vec::new(),
            future: Vec::new(),
            capacity,
        }
    }

    /// The state after the most recent commit/undo/redo
    pub fn current(&self) -> &[Annotation] {
        &self.current
    }

    /// Record a new committed state and drop any redo states
    pub fn commit(&mut self, state: &[Annotation]) {
        let previous = std::mem::replace(&mut self.current, state.to_vec());
        self.past.push_back(previous);
        if self.past.len() > self.capacity {
            self.past.pop_front();
        }
        self.future.clear();
    }

    /// Step back; `None` when there is nothing to undo
    pub fn undo(&mut self) -> Option<Vec<Annotation>> {
        let previous = self.past.pop_back()?;
        let current = std::mem::replace(&mut self.current, previous);
        self.future.push(current);
        Some(self.current.clone())
    }

    /// Step forward; `None` when there is nothing to redo
    pub fn redo(&mut self) -> Option<Vec<Annotation>> {
        let next = self.future.pop()?;
        let current = std::mem::replace(&mut self.current, next);
        self.past.push_back(current);
        if self.past.len() > self.capacity {
            self.past.pop_front();
        }
        Some(self.current.clone())
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.current.clear();
        self.future.clear();
    }

    /// Drop all undo/redo states and start over from `state`
    pub fn reset(&mut self, state: &[Annotation]) {
        self.past.clear();
        self.future.clear();
        self.current = state.to_vec();
    }

    /// Number of available undo steps
    pub fn depth(&self) -> usize {
        self.past.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShapeColor;
    use crate::domain::{Point, Shape};

    fn rect(i: usize) -> Annotation {
        let o = i as f32;
        Annotation::new(
            Shape::Rectangle,
            vec![Point::new(o, o), Point::new(o + 10.0, o + 10.0)],
            ShapeColor::default(),
            3.0,
        )
    }

    /// Commit `n` states, each one shape longer than the last
    fn build(history: &mut AnnotationHistory, n: usize) -> Vec<Annotation> {
        let mut shapes = Vec::new();
        for i in 0..n {
            shapes.push(rect(i));
            history.commit(&shapes);
        }
        shapes
    }

    #[test]
    fn test_undo_all_then_redo_all() {
        let mut history = AnnotationHistory::new();
        let final_state = build(&mut history, 7);

        for _ in 0..7 {
            assert!(history.undo().is_some());
        }
        assert!(history.current().is_empty());
        assert!(history.undo().is_none());

        let mut last = None;
        for _ in 0..7 {
            last = history.redo();
        }
        assert_eq!(last.unwrap(), final_state);
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_commit_discards_redo() {
        let mut history = AnnotationHistory::new();
        build(&mut history, 3);
        history.undo();
        history.undo();
        assert!(history.can_redo());
        history.commit(&[rect(42)]);
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = AnnotationHistory::new();
        build(&mut history, MAX_HISTORY + 10);
        assert_eq!(history.depth(), MAX_HISTORY);
        let mut steps = 0;
        while history.undo().is_some() {
            steps += 1;
        }
        assert_eq!(steps, MAX_HISTORY);
        // The oldest reachable state still holds the first ten shapes
        assert_eq!(history.current().len(), 10);
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut history = AnnotationHistory::new();
        build(&mut history, 2);
        let mut snapshot = history.undo().unwrap();
        snapshot[0].points[0] = Point::new(999.0, 999.0);
        assert_eq!(history.current()[0], rect(0));
    }

    #[test]
    fn test_clear() {
        let mut history = AnnotationHistory::new();
        build(&mut history, 4);
        history.undo();
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.current().is_empty());
    }

    #[test]
    fn test_reset_makes_state_the_baseline() {
        let mut history = AnnotationHistory::new();
        build(&mut history, 3);
        let restored = vec![rect(7), rect(8)];
        history.reset(&restored);
        assert!(!history.can_undo());
        history.commit(&[rect(7), rect(8), rect(9)]);
        assert_eq!(history.undo().unwrap(), restored);
    }
}
