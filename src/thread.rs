use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Upper bound on the number of top comments carried with a thread.
pub const MAX_TOP_COMMENTS: usize = 10;

/// One discovered discussion thread plus its engagement counters.
///
/// Records are immutable once fetched; every stage of the pipeline borrows
/// them read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: String,
    pub source_subcommunity: String,
    pub title: String,
    #[serde(default)]
    pub body_text: String,
    pub raw_score: i64,
    pub comment_count: u64,
    /// `None` when the source did not report a ratio.
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    /// Raw timestamp text as reported by the source. Parsed lazily by the
    /// normalizer so malformed values degrade instead of failing the fetch.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Relevance order, at most [`MAX_TOP_COMMENTS`] entries.
    #[serde(default)]
    pub top_comments: Vec<String>,
}

impl ThreadRecord {
    pub fn new(
        id: impl Into<String>,
        source_subcommunity: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_subcommunity: source_subcommunity.into(),
            title: title.into(),
            body_text: String::new(),
            raw_score: 0,
            comment_count: 0,
            upvote_ratio: None,
            created_at: None,
            top_comments: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body_text = body.into();
        self
    }

    pub fn with_engagement(
        mut self,
        raw_score: i64,
        comment_count: u64,
        upvote_ratio: Option<f64>,
    ) -> Self {
        self.raw_score = raw_score;
        self.comment_count = comment_count;
        self.upvote_ratio = upvote_ratio;
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn with_comments<I, S>(mut self, comments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.top_comments = comments
            .into_iter()
            .map(Into::into)
            .take(MAX_TOP_COMMENTS)
            .collect();
        self
    }

    pub fn has_body(&self) -> bool {
        !self.body_text.trim().is_empty()
    }
}

/// Thread dump as written by the scraper. Field names follow the platform's
/// conventions; every counter is optional so partially scraped rows still load.
#[derive(Debug, Clone, Deserialize)]
pub struct RawThread {
    pub id: Option<String>,
    #[serde(alias = "subreddit")]
    pub source_subcommunity: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "selftext")]
    pub body_text: Option<String>,
    #[serde(alias = "score")]
    pub raw_score: Option<i64>,
    #[serde(alias = "num_comments")]
    pub comment_count: Option<u64>,
    pub upvote_ratio: Option<f64>,
    #[serde(alias = "created_utc")]
    pub created_at: Option<serde_json::Value>,
    #[serde(default)]
    pub top_comments: Vec<RawComment>,
}

/// Comments arrive either as bare strings or as objects carrying a body and
/// a score.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawComment {
    Text(String),
    Detailed {
        body: String,
        #[serde(default)]
        score: Option<i64>,
        #[serde(default)]
        is_op: bool,
    },
}

impl RawComment {
    fn body(&self) -> &str {
        match self {
            RawComment::Text(text) => text,
            RawComment::Detailed { body, .. } => body,
        }
    }

    fn score(&self) -> i64 {
        match self {
            RawComment::Text(_) => 0,
            RawComment::Detailed { score, .. } => score.unwrap_or(0),
        }
    }

    fn is_op(&self) -> bool {
        matches!(self, RawComment::Detailed { is_op: true, .. })
    }
}

impl RawThread {
    /// Converts a scraped row into a record. Returns `None` when the row has
    /// no usable id or title, since neither can be defaulted.
    pub fn into_record(self) -> Option<ThreadRecord> {
        let id = self.id.filter(|value| !value.trim().is_empty())?;
        let title = self.title.filter(|value| !value.trim().is_empty())?;

        let created_at = self.created_at.and_then(|value| match value {
            serde_json::Value::String(text) => Some(text),
            serde_json::Value::Number(number) => Some(number.to_string()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });

        // Replies from the author lead, then score; plain strings keep source order.
        let mut comments = self.top_comments;
        comments.sort_by_key(|comment| (Reverse(comment.is_op()), Reverse(comment.score())));
        let top_comments = comments
            .iter()
            .map(|comment| comment.body().trim().to_string())
            .filter(|body| !body.is_empty())
            .take(MAX_TOP_COMMENTS)
            .collect();

        Some(ThreadRecord {
            id,
            source_subcommunity: self.source_subcommunity.unwrap_or_default(),
            title,
            body_text: self.body_text.unwrap_or_default(),
            raw_score: self.raw_score.unwrap_or(0),
            comment_count: self.comment_count.unwrap_or(0),
            upvote_ratio: self.upvote_ratio,
            created_at,
            top_comments,
        })
    }
}
