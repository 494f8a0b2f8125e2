//! Outgoing multicast answer aggregation (RFC 6762 §6.4).
//!
//! Two instances run side by side: the standard queue (500 ms window, no
//! extra delay) and the rate-limited queue (200 ms window behind an extra
//! 1 s delay) for answers already multicast within the last second.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::{RESPONSE_JITTER_MAX, RESPONSE_JITTER_MIN};
use crate::responder::AnswerWithAdditionals;

struct AnswerGroup {
    /// Earliest send time; the response jitter lands here.
    send_after: Instant,
    /// Latest send time; the end of the aggregation window.
    send_before: Instant,
    answers: AnswerWithAdditionals,
}

pub(crate) struct MulticastOutgoingQueue {
    queue: VecDeque<AnswerGroup>,
    extra_delay: Duration,
    aggregation_window: Duration,
}

impl MulticastOutgoingQueue {
    pub fn new(extra_delay: Duration, aggregation_window: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            extra_delay,
            aggregation_window,
        }
    }

    pub fn add(&mut self, now: Instant, answers: AnswerWithAdditionals) {
        let jitter = Duration::from_millis(rand::random_range(
            RESPONSE_JITTER_MIN.as_millis() as u64..=RESPONSE_JITTER_MAX.as_millis() as u64,
        ));
        self.add_with_jitter(now, answers, jitter);
    }

    pub fn add_with_jitter(
        &mut self,
        now: Instant,
        answers: AnswerWithAdditionals,
        jitter: Duration,
    ) {
        let send_after = now + jitter + self.extra_delay;
        let send_before = now + self.aggregation_window + self.extra_delay;
        if let Some(last) = self.queue.back_mut()
            && send_after <= last.send_after
        {
            // The new answers would be ready before the last pending group
            // goes out; going out slightly early with it is fine.
            last.answers.extend(answers);
            return;
        }
        self.queue.push_back(AnswerGroup {
            send_after,
            send_before,
            answers,
        });
    }

    /// Pops everything due at `now` as one combined multicast batch, or
    /// None if the front of the queue can still wait for more answers.
    pub fn ready(&mut self, now: Instant) -> Option<AnswerWithAdditionals> {
        if self.queue.len() > 1
            && let Some(front) = self.queue.front()
            && front.send_before > now
        {
            // More groups are coming up behind; hold the front until its
            // window closes so they can all ship together.
            return None;
        }

        let mut answers = AnswerWithAdditionals::new();
        while let Some(front) = self.queue.front() {
            if front.send_after > now {
                break;
            }
            if let Some(group) = self.queue.pop_front() {
                answers.extend(group.answers);
            }
        }
        if answers.is_empty() {
            return None;
        }

        // Anything we are about to send needn't be sent again by a group
        // still waiting.
        for pending in &mut self.queue {
            pending.answers.retain(|record, _| !answers.contains_key(record));
        }
        Some(answers)
    }

    /// When the engine should call [`ready`](Self::ready) next.
    pub fn next_time(&self) -> Option<Instant> {
        let front = self.queue.front()?;
        if self.queue.len() == 1 {
            Some(front.send_after)
        } else {
            Some(front.send_before)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
