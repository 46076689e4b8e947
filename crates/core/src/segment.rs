use std::ops::RangeInclusive;

use crate::config::BlockConfig;
use crate::types::{Block, Word};

/// Partitions a transcript into speaker-bounded blocks.
///
/// A block never spans a speaker change. A turn longer than `max_words` is
/// split: each piece ends at the first sentence-ending word past
/// `soft_min_words`, or at exactly `max_words` when no such word exists.
/// Pauses never count toward a block's size and stay with the turn they
/// follow.
#[derive(Debug, Clone)]
pub struct BlockSegmenter {
    max_words: usize,
    soft_min_words: usize,
}

impl BlockSegmenter {
    pub fn new(config: &BlockConfig) -> Self {
        Self {
            max_words: config.max_words.max(1),
            soft_min_words: config.soft_min_words.min(config.max_words),
        }
    }

    pub fn segment(&self, words: &[Word]) -> Vec<Block> {
        // spoken[i] = spoken words strictly before index i
        let mut spoken = Vec::with_capacity(words.len() + 1);
        spoken.push(0usize);
        for word in words {
            let last = spoken.last().copied().unwrap_or(0);
            spoken.push(last + usize::from(word.is_spoken()));
        }

        let mut blocks = Vec::new();
        for turn in speaker_turns(words) {
            let (turn_start, turn_end) = (*turn.start(), *turn.end());
            let mut start = turn_start;
            while start <= turn_end {
                let remaining = spoken[turn_end + 1] - spoken[start];
                let end = if remaining <= self.max_words {
                    turn_end
                } else {
                    self.forced_split(words, start, turn_end)
                };
                blocks.push(build_block(blocks.len(), words, start, end));
                start = end + 1;
            }
        }
        blocks
    }

    fn forced_split(&self, words: &[Word], start: usize, turn_end: usize) -> usize {
        let mut count = 0;
        for (index, word) in words.iter().enumerate().take(turn_end + 1).skip(start) {
            if !word.is_spoken() {
                continue;
            }
            count += 1;
            if count > self.soft_min_words && ends_sentence(&word.text) {
                return index;
            }
            if count == self.max_words {
                return index;
            }
        }
        turn_end
    }
}

/// Maximal runs of one speaker. Pauses join the run they follow; leading
/// pauses join the first run.
fn speaker_turns(words: &[Word]) -> Vec<RangeInclusive<usize>> {
    let mut turns = Vec::new();
    let mut start = 0;
    let mut speaker: Option<&str> = None;

    for (index, word) in words.iter().enumerate() {
        if !word.is_spoken() {
            continue;
        }
        match speaker {
            Some(current) if current != word.speaker_id => {
                turns.push(start..=index - 1);
                start = index;
                speaker = Some(&word.speaker_id);
            }
            None => speaker = Some(&word.speaker_id),
            Some(_) => {}
        }
    }

    if !words.is_empty() {
        turns.push(start..=words.len() - 1);
    }
    turns
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '?', '!'])
}

fn build_block(ordinal: usize, words: &[Word], first: usize, last: usize) -> Block {
    let slice = &words[first..=last];
    let spoken: Vec<&Word> = slice.iter().filter(|w| w.is_spoken()).collect();

    Block {
        ordinal,
        first,
        last,
        speaker_id: spoken
            .first()
            .map(|w| w.speaker_id.clone())
            .unwrap_or_default(),
        start_time: slice.first().map(|w| w.start).unwrap_or_default(),
        end_time: slice.last().map(|w| w.end).unwrap_or_default(),
        text: spoken
            .iter()
            .map(|w| w.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        word_count: spoken.len(),
    }
}
