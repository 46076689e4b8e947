use std::ops::Range;

use tracing::info;

use crate::config::AlignmentConfig;
use crate::error::{IngestError, Result};
use crate::normalize::{NORMALIZATION_VERSION, TextNormalizer};
use crate::remap::IdentifierRemapper;
use crate::segment::BlockSegmenter;
use crate::types::{Block, Word, WordInput, parse_block_id};

/// A normalized token and the internal index of the word it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateToken {
    pub text: String,
    pub index: usize,
}

/// Candidate tokens of a script's source blocks.
///
/// Adjacent blocks form one run; a gap between selected blocks starts a new
/// run. A window must lie inside a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    tokens: Vec<CandidateToken>,
    runs: Vec<Range<usize>>,
}

impl CandidateSet {
    pub fn tokens(&self) -> &[CandidateToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Positions of each run in [`Self::tokens`], in transcript order.
    pub fn runs(&self) -> &[Range<usize>] {
        &self.runs
    }

    fn push_run(&mut self, run: Vec<CandidateToken>) {
        if run.is_empty() {
            return;
        }
        let start = self.tokens.len();
        self.tokens.extend(run);
        self.runs.push(start..self.tokens.len());
    }

    /// Tokens whose word index falls in `[start, end]`, keeping run breaks.
    pub fn restrict(&self, start: usize, end: usize) -> CandidateSet {
        self.runs
            .iter()
            .map(|run| {
                self.tokens[run.clone()]
                    .iter()
                    .filter(|t| (start..=end).contains(&t.index))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Each item is one run; empty runs are dropped.
impl FromIterator<Vec<CandidateToken>> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Vec<CandidateToken>>>(runs: I) -> Self {
        let mut set = CandidateSet::default();
        for run in runs {
            set.push_run(run);
        }
        set
    }
}

/// Everything derived from one ingested transcript.
///
/// Built once per request and immutable afterwards. Normalized tokens are
/// computed here, per request, instead of in any process-wide cache.
#[derive(Debug)]
pub struct TranscriptContext {
    remapper: IdentifierRemapper,
    words: Vec<Word>,
    blocks: Vec<Block>,
    tokens: Vec<Vec<String>>,
    normalizer: TextNormalizer,
    normalization_version: u32,
}

impl TranscriptContext {
    pub fn ingest(input: &[WordInput], config: &AlignmentConfig) -> Result<Self> {
        check_time_order(input)?;

        let remapper = IdentifierRemapper::new(input.iter().map(|w| w.id.as_str()))?;
        let words: Vec<Word> = input
            .iter()
            .enumerate()
            .map(|(index, w)| Word {
                index,
                text: w.text.clone(),
                start: w.start,
                end: w.end,
                speaker_id: w.speaker_id.clone(),
                kind: w.kind,
            })
            .collect();

        let normalizer = TextNormalizer::from_config(config);
        let tokens = words
            .iter()
            .map(|w| {
                if w.is_spoken() {
                    normalizer.normalize(&w.text)
                } else {
                    Vec::new()
                }
            })
            .collect();

        let blocks = BlockSegmenter::new(&config.blocks).segment(&words);
        info!(
            words = words.len(),
            blocks = blocks.len(),
            normalization_version = NORMALIZATION_VERSION,
            "Transcript ingested"
        );

        Ok(Self {
            remapper,
            words,
            blocks,
            tokens,
            normalizer,
            normalization_version: NORMALIZATION_VERSION,
        })
    }

    pub fn remapper(&self) -> &IdentifierRemapper {
        &self.remapper
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn normalization_version(&self) -> u32 {
        self.normalization_version
    }

    /// Normalized tokens of the word at `index`; empty for pauses and fillers.
    pub fn word_tokens(&self, index: usize) -> &[String] {
        self.tokens.get(index).map(Vec::as_slice).unwrap_or_default()
    }

    /// Map a `block_NNN` id to the block's ordinal, if segmentation produced it.
    pub fn find_block(&self, block_id: &str) -> Option<usize> {
        parse_block_id(block_id).filter(|&ordinal| ordinal < self.blocks.len())
    }

    /// Tokens of the given blocks in transcript order, each tagged with its
    /// word index. Duplicate ordinals are ignored; blocks that are not
    /// adjacent end up in separate runs.
    pub fn candidate_tokens(&self, block_ordinals: &[usize]) -> CandidateSet {
        let mut ordinals: Vec<usize> = block_ordinals
            .iter()
            .copied()
            .filter(|&o| o < self.blocks.len())
            .collect();
        ordinals.sort_unstable();
        ordinals.dedup();

        let mut runs = Vec::new();
        let mut rest = ordinals.as_slice();
        while let Some(&first) = rest.first() {
            let len = rest
                .iter()
                .enumerate()
                .take_while(|&(offset, &o)| o == first + offset)
                .count();
            let last = rest[len - 1];
            runs.push(self.range_tokens(self.blocks[first].first, self.blocks[last].last));
            rest = &rest[len..];
        }
        runs.into_iter().collect()
    }

    /// Tokens of every word in `[start, end]`, clamped to the transcript.
    pub fn range_tokens(&self, start: usize, end: usize) -> Vec<CandidateToken> {
        if self.is_empty() || start > end {
            return Vec::new();
        }
        let end = end.min(self.len() - 1);
        (start..=end)
            .flat_map(|index| {
                self.word_tokens(index).iter().map(move |text| CandidateToken {
                    text: text.clone(),
                    index,
                })
            })
            .collect()
    }
}

fn check_time_order(input: &[WordInput]) -> Result<()> {
    let mut previous_start = f64::NEG_INFINITY;
    for (index, word) in input.iter().enumerate() {
        let unordered = |reason: String| IngestError::UnorderedTranscript {
            id: word.id.clone(),
            index,
            reason,
        };
        if !word.start.is_finite() || !word.end.is_finite() {
            return Err(unordered("non-finite timestamp".to_string()));
        }
        if word.end < word.start {
            return Err(unordered(format!(
                "ends at {} before it starts at {}",
                word.end, word.start
            )));
        }
        if word.start < previous_start {
            return Err(unordered(format!(
                "starts at {} before the previous word at {}",
                word.start, previous_start
            )));
        }
        previous_start = word.start;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::WordKind;

    pub(crate) fn transcript(text: &str) -> Vec<WordInput> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, t)| WordInput {
                id: format!("w{i}"),
                text: t.to_string(),
                start: i as f64 * 0.5,
                end: i as f64 * 0.5 + 0.4,
                speaker_id: "spk_0".to_string(),
                kind: WordKind::Word,
            })
            .collect()
    }

    #[test]
    fn ingest_builds_words_tokens_and_blocks() {
        let input = transcript("The quick, brown fox um jumps.");
        let ctx = TranscriptContext::ingest(&input, &AlignmentConfig::default()).expect("ingest");
        assert_eq!(ctx.len(), 6);
        assert_eq!(ctx.blocks().len(), 1);
        assert_eq!(ctx.word_tokens(1), ["quick"]);
        assert!(ctx.word_tokens(4).is_empty(), "filler words carry no tokens");
        assert!(ctx.word_tokens(99).is_empty());
        assert_eq!(ctx.remapper().to_external(5), Ok("w5"));
        assert_eq!(ctx.normalization_version(), NORMALIZATION_VERSION);
    }

    #[test]
    fn rejects_start_going_backwards() {
        let mut input = transcript("a b c");
        input[2].start = 0.1;
        input[2].end = 0.2;
        let err = TranscriptContext::ingest(&input, &AlignmentConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::UnorderedTranscript { index: 2, .. }
        ));
    }

    #[test]
    fn rejects_word_ending_before_start() {
        let mut input = transcript("a b");
        input[1].end = input[1].start - 0.1;
        assert!(matches!(
            TranscriptContext::ingest(&input, &AlignmentConfig::default()),
            Err(IngestError::UnorderedTranscript { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut input = transcript("a b");
        input[1].id = "w0".to_string();
        assert!(matches!(
            TranscriptContext::ingest(&input, &AlignmentConfig::default()),
            Err(IngestError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn candidate_tokens_follow_transcript_order() {
        let mut config = AlignmentConfig::default();
        config.blocks.max_words = 2;
        config.blocks.soft_min_words = 2;
        let ctx = TranscriptContext::ingest(&transcript("a b c d e"), &config).expect("ingest");
        assert_eq!(ctx.blocks().len(), 3);

        let tokens = ctx.candidate_tokens(&[2, 0, 2]);
        let indices: Vec<usize> = tokens.tokens().iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 4]);
        assert_eq!(tokens.runs(), [0..2, 2..3]);
        assert_eq!(ctx.find_block("block_002"), Some(2));
        assert_eq!(ctx.find_block("block_003"), None);
    }

    #[test]
    fn adjacent_blocks_share_a_run() {
        let mut config = AlignmentConfig::default();
        config.blocks.max_words = 2;
        config.blocks.soft_min_words = 2;
        let ctx = TranscriptContext::ingest(&transcript("a b c d e f g"), &config).expect("ingest");
        assert_eq!(ctx.blocks().len(), 4);

        let set = ctx.candidate_tokens(&[3, 1, 0]);
        assert_eq!(set.runs(), [0..4, 4..5]);

        let restricted = set.restrict(2, 6);
        let indices: Vec<usize> = restricted.tokens().iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![2, 3, 6]);
        assert_eq!(restricted.runs(), [0..2, 2..3]);
    }

    #[test]
    fn pauses_have_indices_but_no_tokens() {
        let mut input = transcript("a b c");
        input[1].kind = WordKind::Pause;
        let ctx = TranscriptContext::ingest(&input, &AlignmentConfig::default()).expect("ingest");
        let tokens = ctx.range_tokens(0, 2);
        let indices: Vec<usize> = tokens.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
