//! Duplicate question suppression (RFC 6762 §7.3).
//!
//! If some other querier just asked a question and already knew everything
//! we know, our own answer machinery (and the multicast channel) learns
//! nothing from processing it again within the suppression window.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::config::DUPLICATE_QUESTION_INTERVAL;
use crate::message::record::{Question, Record};

/// Recently seen questions and the known-answers they carried.
#[derive(Default)]
pub struct QuestionHistory {
    history: HashMap<Question, (Instant, HashSet<Record>)>,
}

impl QuestionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a question and its known-answer set.
    pub fn add_question_at_time(
        &mut self,
        question: Question,
        now: Instant,
        known_answers: HashSet<Record>,
    ) {
        self.history.insert(question, (now, known_answers));
    }

    /// True if the question was asked within the window by someone who
    /// already knew at least as much as `known_answers`.
    pub fn suppresses(
        &self,
        question: &Question,
        now: Instant,
        known_answers: &HashSet<Record>,
    ) -> bool {
        let Some((asked, prev_known)) = self.history.get(question) else {
            return false;
        };
        if now.saturating_duration_since(*asked) > DUPLICATE_QUESTION_INTERVAL {
            return false;
        }
        // A previous asker who knew an answer the current set lacks would
        // be deprived of a refresh if we stayed silent.
        prev_known.iter().all(|r| known_answers.contains(r))
    }

    /// Drops entries older than the suppression window.
    pub fn expire(&mut self, now: Instant) {
        self.history
            .retain(|_, (asked, _)| now.saturating_duration_since(*asked) <= DUPLICATE_QUESTION_INTERVAL);
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
