use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// A user's affinity for one tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInterest {
    pub user_id: String,
    pub tag_id: String,
    /// Affinity in [0,1]
    pub interest_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    View,
    Like,
    Share,
    Comment,
    Skip,
}

impl Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InteractionType::View => "view",
            InteractionType::Like => "like",
            InteractionType::Share => "share",
            InteractionType::Comment => "comment",
            InteractionType::Skip => "skip",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(InteractionType::View),
            "like" => Ok(InteractionType::Like),
            "share" => Ok(InteractionType::Share),
            "comment" => Ok(InteractionType::Comment),
            "skip" => Ok(InteractionType::Skip),
            other => Err(format!("unknown interaction type: {}", other)),
        }
    }
}

/// One entry of the append-only interaction log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInteraction {
    pub id: String,
    pub user_id: String,
    pub content_id: String,
    pub interaction_type: InteractionType,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_type_parses_its_display_form() {
        for kind in [
            InteractionType::View,
            InteractionType::Like,
            InteractionType::Share,
            InteractionType::Comment,
            InteractionType::Skip,
        ] {
            assert_eq!(kind.to_string().parse::<InteractionType>(), Ok(kind));
        }
    }

    #[test]
    fn test_unknown_interaction_type_is_rejected() {
        assert!("bookmark".parse::<InteractionType>().is_err());
    }

    #[test]
    fn test_interaction_type_serialization() {
        let json = serde_json::to_string(&InteractionType::Share).unwrap();
        assert_eq!(json, "\"share\"");
    }
}
