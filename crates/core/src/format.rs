use crate::types::{Block, ScriptResult, ScriptStatus};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format blocks with their id, time range and speaker
pub fn format_blocks_with_timestamps(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| {
            format!(
                "[{} {}–{}] {}: {}",
                block.id(),
                format_timestamp(block.start_time),
                format_timestamp(block.end_time),
                block.speaker_id,
                block.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn status_label(status: ScriptStatus) -> &'static str {
    match status {
        ScriptStatus::Success => "success",
        ScriptStatus::Partial => "partial",
        ScriptStatus::Failed => "failed",
    }
}

pub fn format_script_readable(result: &ScriptResult) -> String {
    let mut output = String::new();
    let heading = result.title.as_deref().unwrap_or(&result.concept_id);
    output.push_str(&format!("# {}\n\n", heading));
    output.push_str(&format!(
        "**Status:** {} | **Duration:** {:.2}s | **Chunks:** {}\n\n",
        status_label(result.status),
        result.duration_seconds,
        result.script_chunks.len()
    ));

    if !result.script_chunks.is_empty() {
        output.push_str("## Chunks\n\n");
        for chunk in &result.script_chunks {
            let start = format_timestamp(chunk.start_time);
            let end = format_timestamp(chunk.end_time);
            output.push_str(&format!(
                "### [{}–{}] {} → {}\n\n",
                start, end, chunk.start_word_id, chunk.end_word_id
            ));
            output.push_str(&format!("{}\n\n", chunk.chunk_text));
        }
    }

    if !result.failures.is_empty() {
        output.push_str("## Failures\n\n");
        for failure in &result.failures {
            output.push_str(&format!(
                "• #{} \"{}\": {}\n",
                failure.position, failure.chunk_text, failure.error
            ));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlignmentError;
    use crate::types::{MatchMethod, QuoteFailure, ScriptChunk};

    #[test]
    fn timestamps_are_minutes_and_seconds() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(75.9), "01:15");
        assert_eq!(format_timestamp(3600.0), "60:00");
    }

    #[test]
    fn block_listing_shows_id_range_and_speaker() {
        let block = Block {
            ordinal: 3,
            first: 10,
            last: 12,
            speaker_id: "spk_1".to_string(),
            start_time: 59.5,
            end_time: 62.0,
            text: "so here we are ".to_string(),
            word_count: 4,
        };
        assert_eq!(
            format_blocks_with_timestamps(&[block]),
            "[block_003 00:59–01:02] spk_1: so here we are"
        );
    }

    #[test]
    fn readable_report_lists_chunks_and_failures() {
        let result = ScriptResult {
            concept_id: "c7".to_string(),
            title: None,
            status: ScriptStatus::Partial,
            duration_seconds: 1.9,
            script_chunks: vec![ScriptChunk {
                position: 0,
                chunk_text: "quick brown fox".to_string(),
                start_word_id: "w1".to_string(),
                end_word_id: "w3".to_string(),
                word_ids: vec!["w1".to_string(), "w2".to_string(), "w3".to_string()],
                start_time: 61.0,
                end_time: 62.9,
                method: MatchMethod::Deterministic,
                score: 1.0,
            }],
            failures: vec![QuoteFailure {
                position: 1,
                chunk_text: "a unicorn".to_string(),
                error: AlignmentError::Hallucination {
                    missing: vec!["unicorn".to_string()],
                },
                span: None,
            }],
        };

        let text = format_script_readable(&result);
        assert!(text.starts_with("# c7\n"));
        assert!(text.contains("**Status:** partial | **Duration:** 1.90s | **Chunks:** 1"));
        assert!(text.contains("### [01:01–01:02] w1 → w3"));
        assert!(text.contains("• #1 \"a unicorn\": Quote contains words absent"));
    }
}
