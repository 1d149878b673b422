mod content;
mod interaction;
mod recommendation;

pub use content::{ContentItem, Tag};
pub use interaction::{InteractionType, UserInteraction, UserInterest};
pub use recommendation::{RecommendationResult, RecommendationsResponse, DEFAULT_REASON};
