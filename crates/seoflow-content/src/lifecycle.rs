//! Topic state machine.
//!
//! ```text
//! proposed -> draft -> ready -> published
//! proposed | draft | ready -> blocked      (gate failure)
//! blocked -> draft                         (regeneration)
//! proposed -> ready                        (approval of an evaluated draft)
//! proposed | draft | ready | blocked -> rejected
//! ```

use seoflow_core::{Topic, TopicStatus};

use crate::ContentError;

#[must_use]
pub fn is_legal_transition(from: TopicStatus, to: TopicStatus) -> bool {
    use TopicStatus::{Blocked, Draft, Proposed, Published, Ready, Rejected};
    matches!(
        (from, to),
        (Proposed | Blocked, Draft)
            | (Proposed | Draft, Ready)
            | (Ready, Published)
            | (Proposed | Draft | Ready, Blocked)
            | (Proposed | Draft | Ready | Blocked, Rejected)
    )
}

/// # Errors
///
/// [`ContentError::IllegalTransition`] when `topic` may not move to `to`.
pub fn ensure_transition(topic: &Topic, to: TopicStatus) -> Result<(), ContentError> {
    if is_legal_transition(topic.status, to) {
        Ok(())
    } else {
        Err(ContentError::IllegalTransition {
            topic_id: topic.id,
            from: topic.status,
            to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TopicStatus; 6] = [
        TopicStatus::Proposed,
        TopicStatus::Draft,
        TopicStatus::Ready,
        TopicStatus::Published,
        TopicStatus::Blocked,
        TopicStatus::Rejected,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!is_legal_transition(TopicStatus::Published, to));
            assert!(!is_legal_transition(TopicStatus::Rejected, to));
        }
    }

    #[test]
    fn only_ready_topics_publish() {
        let publishable: Vec<_> = ALL
            .into_iter()
            .filter(|from| is_legal_transition(*from, TopicStatus::Published))
            .collect();
        assert_eq!(publishable, vec![TopicStatus::Ready]);
    }

    #[test]
    fn blocked_topics_return_through_draft_only() {
        assert!(is_legal_transition(TopicStatus::Blocked, TopicStatus::Draft));
        assert!(!is_legal_transition(TopicStatus::Blocked, TopicStatus::Ready));
        assert!(!is_legal_transition(TopicStatus::Blocked, TopicStatus::Published));
    }

    #[test]
    fn self_transitions_are_illegal() {
        for status in ALL {
            assert!(!is_legal_transition(status, status), "{status}");
        }
    }
}
