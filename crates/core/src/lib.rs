pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod locate;
pub mod normalize;
pub mod orchestrator;
pub mod provider;
pub mod remap;
pub mod search;
pub mod segment;
pub mod types;
pub mod validate;

pub use config::{AlignmentConfig, BlockConfig, FallbackConfig, default_config_path};
pub use context::{CandidateSet, CandidateToken, TranscriptContext};
pub use error::{AlignmentError, ConfigError, IngestError, Result, SearchError};
pub use format::{format_blocks_with_timestamps, format_script_readable, format_timestamp};
pub use locate::{DeterministicLocator, FuzzyFallbackLocator, Located};
pub use normalize::{NORMALIZATION_VERSION, TextNormalizer};
pub use orchestrator::{AlignmentEngine, ScriptPhase};
pub use provider::{Provider, ProviderConfig, ProviderError};
pub use remap::IdentifierRemapper;
pub use search::{AssistedSearch, LlmAssistedSearch, ProposedSpan, SearchRequest};
pub use segment::BlockSegmenter;
pub use types::{
    Block, MatchMethod, QuoteFailure, QuoteInput, ResolvedSpan, ScriptChunk, ScriptRequest,
    ScriptResult, ScriptStatus, Word, WordInput, WordKind,
};
pub use validate::{IntegrityCheck, ScriptValidator, ValidationReport};
