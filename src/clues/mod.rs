// Public API
pub use history::{ClueHistory, PurchasedClue};
pub use service::ClueService;
pub use text::{ClueRequest, ClueTextError, ClueTextGenerator, HiderSighting, StandardClueText};

// Internal modules
pub mod geo;
mod history;
mod service;
mod text;
