use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tag attached to content items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// A content item as read from the store
///
/// Read-mostly from this service's point of view: the only write it ever issues
/// against content rows is the bulk engagement recompute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    /// Ordered tags, loaded in the same round trip as the content row
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Popularity in [0,1]; `None` until the first recompute has run
    pub engagement_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names_preserve_order() {
        let content = ContentItem {
            id: "c1".to_string(),
            title: "Rust in Production".to_string(),
            tags: vec![
                Tag {
                    id: "t2".to_string(),
                    name: "tech".to_string(),
                },
                Tag {
                    id: "t1".to_string(),
                    name: "backend".to_string(),
                },
            ],
            engagement_score: Some(0.4),
            created_at: Utc::now(),
        };

        assert_eq!(content.tag_names(), vec!["tech", "backend"]);
    }

    #[test]
    fn test_missing_tags_deserialize_as_empty() {
        let json = r#"{"id":"c1","title":"t","engagement_score":null,"created_at":"2024-01-01T00:00:00Z"}"#;
        let content: ContentItem = serde_json::from_str(json).unwrap();
        assert!(content.tags.is_empty());
        assert_eq!(content.engagement_score, None);
    }
}
