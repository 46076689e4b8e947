pub mod deterministic;
pub mod fallback;
pub mod window;

pub use deterministic::{DeterministicLocator, Located};
pub use fallback::{FALLBACK_ATTEMPTS, FuzzyFallbackLocator};
pub use window::{WindowMatch, WindowParams, best_window};
