// Public API
pub use service::{CardService, ChallengeCompletion, CurseOutcome, DrawnCard};

// Internal modules
mod service;
