//! Debate transcript messages.

use serde::{Deserialize, Serialize};

/// One utterance in the main debate or a crux room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub persona_id: String,
    pub text: String,
    pub round: u32,
}

impl TranscriptMessage {
    pub fn new(persona_id: &str, text: &str, round: u32) -> Self {
        Self {
            persona_id: persona_id.to_string(),
            text: text.to_string(),
            round,
        }
    }
}

/// The last `size` messages.
pub fn recent_window(messages: &[TranscriptMessage], size: usize) -> &[TranscriptMessage] {
    let start = messages.len().saturating_sub(size);
    &messages[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_window() {
        let msgs: Vec<_> = (0..5)
            .map(|i| TranscriptMessage::new("a", &i.to_string(), 1))
            .collect();
        assert_eq!(recent_window(&msgs, 2)[0].text, "3");
        assert_eq!(recent_window(&msgs, 10).len(), 5);
        assert!(recent_window(&[], 3).is_empty());
    }
}
