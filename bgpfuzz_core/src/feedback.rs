use crate::transport::SendStatus;
use std::collections::HashSet;

/// Decides whether the outcome of a test case is worth rewarding.
pub trait Feedback {
    fn name(&self) -> &'static str;
    fn is_interesting(&mut self, input: &[u8], status: &SendStatus) -> bool;
}

/// Rewards the first occurrence of every distinct target reaction, keyed by
/// the status class and the response bytes.
#[derive(Debug, Default)]
pub struct UniqueResponseFeedback {
    pub known_hashes: HashSet<[u8; 16]>,
}

impl UniqueResponseFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    fn digest(status: &SendStatus) -> [u8; 16] {
        let mut ctx = md5::Context::new();
        ctx.consume(status.class().as_bytes());
        ctx.consume([0u8]);
        ctx.consume(status.response());
        ctx.compute().0
    }
}

impl Feedback for UniqueResponseFeedback {
    fn name(&self) -> &'static str {
        "UniqueResponseFeedback"
    }

    fn is_interesting(&mut self, _input: &[u8], status: &SendStatus) -> bool {
        self.known_hashes.insert(Self::digest(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_response_feedback_works() {
        let mut feedback = UniqueResponseFeedback::new();
        let accepted = SendStatus::Accepted(vec![1, 2, 3]);

        assert!(feedback.is_interesting(&[0], &accepted));
        assert!(!feedback.is_interesting(&[1], &accepted));
        assert!(feedback.is_interesting(&[1], &SendStatus::Accepted(vec![4])));
        assert!(feedback.is_interesting(&[1], &SendStatus::Closed));
        assert!(!feedback.is_interesting(&[2], &SendStatus::Closed));
        assert_eq!(feedback.known_hashes.len(), 3);
    }

    #[test]
    fn status_class_is_part_of_the_key() {
        let mut feedback = UniqueResponseFeedback::new();
        assert!(feedback.is_interesting(&[], &SendStatus::Accepted(vec![])));
        assert!(feedback.is_interesting(&[], &SendStatus::Timeout));
        assert!(feedback.is_interesting(&[], &SendStatus::Other("a".into())));
    }
}
