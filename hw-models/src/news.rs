//! News articles served by the backend.

use serde::{Deserialize, Serialize};

/// An article from the `/news` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// ISO-8601 publication date.
    pub date: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_article() {
        let article: NewsArticle = serde_json::from_value(serde_json::json!({
            "id": "news-1",
            "title": "Urban Beekeeping on the Rise",
            "summary": "City dwellers are turning to beekeeping.",
            "date": "2025-05-07T14:15:00Z",
            "author": "Miguel Santos",
            "imageUrl": "https://example.com/hive.jpg",
            "content": "Permit applications increased."
        }))
        .unwrap();
        assert_eq!(article.author, "Miguel Santos");
        assert_eq!(article.image_url.as_deref(), Some("https://example.com/hive.jpg"));
    }
}
