use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::context::CandidateToken;
use crate::error::SearchError;
use crate::provider::Provider;
use crate::search::{AssistedSearch, ProposedSpan, SearchRequest};

static VERBATIM_INDEX_PROMPT: &str = r#"You locate quotes inside a transcript.

INPUT: the transcript as a sequence of `token|index` pairs separated by spaces,
followed by a QUOTE. Tokens are lowercased with punctuation removed. The quote
may drop filler words, fix stutters, or rewrap whitespace.

TASK: find the single contiguous stretch of the transcript the quote was taken
from. Report the index of its first and last token.

OUTPUT: return ONLY valid JSON, no markdown, no explanation:
{"start_index": <number>, "end_index": <number>}
If the quote does not come from this transcript, return:
{"found": false}

RULES:
- Use indices exactly as they appear after the `|`
- Never invent indices that are not in the input
- If the quote appears more than once, pick the earliest occurrence"#;

/// Assisted search backed by a chat-completions endpoint.
pub struct LlmAssistedSearch {
    provider: Provider,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SpanReply {
    #[serde(default)]
    found: Option<bool>,
    #[serde(default)]
    start_index: Option<usize>,
    #[serde(default)]
    end_index: Option<usize>,
}

impl LlmAssistedSearch {
    pub fn new(provider: Provider) -> Result<Self, SearchError> {
        let api_key = provider.api_key()?;
        Ok(Self::with_api_key(provider, api_key))
    }

    pub fn with_api_key(provider: Provider, api_key: String) -> Self {
        Self {
            provider,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

#[async_trait]
impl AssistedSearch for LlmAssistedSearch {
    async fn search(
        &self,
        request: &SearchRequest<'_>,
    ) -> Result<Option<ProposedSpan>, SearchError> {
        let config = self.provider.config();
        let user_prompt = format!(
            "TRANSCRIPT:\n{}\n\nQUOTE:\n{}",
            render_candidates(request.candidates),
            request.quote.trim()
        );
        debug!(
            provider = self.provider.name(),
            attempt = request.attempt,
            candidates = request.candidates.len(),
            "Sending assisted search request"
        );

        let response = self
            .client
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": config.model,
                "messages": [
                    {
                        "role": "system",
                        "content": VERBATIM_INDEX_PROMPT,
                    },
                    {
                        "role": "user",
                        "content": user_prompt,
                    },
                ],
                "temperature": 0.0,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SearchError::InvalidResponse {
                reason: format!("missing message content in {}", response),
            })?;

        parse_reply(content)
    }
}

/// `token|index` pairs, space separated.
pub fn render_candidates(candidates: &[CandidateToken]) -> String {
    candidates
        .iter()
        .map(|t| format!("{}|{}", t.text, t.index))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the model's reply, tolerating a surrounding markdown fence.
pub fn parse_reply(content: &str) -> Result<Option<ProposedSpan>, SearchError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let reply: SpanReply = serde_json::from_str(body)?;
    if reply.found == Some(false) {
        return Ok(None);
    }
    match (reply.start_index, reply.end_index) {
        (Some(start_index), Some(end_index)) => Ok(Some(ProposedSpan {
            start_index,
            end_index,
        })),
        _ => Err(SearchError::InvalidResponse {
            reason: format!("reply has no span: {}", body),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_token_index_pairs() {
        let candidates = vec![
            CandidateToken {
                text: "hello".to_string(),
                index: 4,
            },
            CandidateToken {
                text: "world".to_string(),
                index: 6,
            },
        ];
        assert_eq!(render_candidates(&candidates), "hello|4 world|6");
    }

    #[test]
    fn parses_plain_span() {
        assert_eq!(
            parse_reply(r#"{"start_index": 3, "end_index": 9}"#).expect("valid reply"),
            Some(ProposedSpan {
                start_index: 3,
                end_index: 9
            })
        );
    }

    #[test]
    fn parses_fenced_span() {
        let reply = "```json\n{\"start_index\": 1, \"end_index\": 2}\n```";
        assert_eq!(
            parse_reply(reply).expect("valid reply"),
            Some(ProposedSpan {
                start_index: 1,
                end_index: 2
            })
        );
    }

    #[test]
    fn not_found_reply_is_none() {
        assert_eq!(parse_reply(r#"{"found": false}"#).expect("valid reply"), None);
    }

    #[test]
    fn malformed_replies_are_errors() {
        assert!(matches!(parse_reply("sure! here you go"), Err(SearchError::Json(_))));
        assert!(matches!(
            parse_reply(r#"{"start_index": 3}"#),
            Err(SearchError::InvalidResponse { .. })
        ));
        assert!(parse_reply(r#"{"start_index": -1, "end_index": 2}"#).is_err());
    }
}
