#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub author_username: String,
    pub created_at: String,
}

/// History row with author and title resolved at read time. Both fall back to
/// placeholders when the referenced user or post is gone.
#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub id: String,
    pub operation: String,
    pub actor_id: String,
    pub actor_username: String,
    pub post_id: String,
    pub post_title: String,
    pub timestamp: String,
}
