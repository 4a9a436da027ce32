//! Newest-first record of answered questions for interactive sessions.

use std::collections::VecDeque;

use crate::models::AnswerRecord;

/// Answers given so far, most recent first.
#[derive(Debug, Clone, Default)]
pub struct AnswerHistory {
    records: VecDeque<AnswerRecord>,
}

impl AnswerHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, answer: AnswerRecord) {
        self.records.push_front(answer);
    }

    /// Iterate from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&AnswerRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
