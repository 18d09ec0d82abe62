// Public API
pub use cleanup_task::{start_cleanup_task, CleanupConfig, GameStats};
pub use lifecycle::TransitionError;
pub use models::{
    ActiveChallenge, ActiveCurse, AppliedCurse, Game, GameStatus, GameView, Team, TeamLocation,
    TeamRole, TeamSpec,
};
pub use registry::{GameGuard, GameRegistry};
pub use round_enforcer::{enforce_round_limits, start_round_enforcer, EnforcerConfig};
pub use service::{FoundOutcome, GameService};

// Internal modules
mod cleanup_task;
pub mod lifecycle;
mod models;
mod registry;
mod round_enforcer;
mod service;
pub mod timing;
