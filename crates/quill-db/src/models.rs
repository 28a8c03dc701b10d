/// Database row types — these map directly to SQLite rows.
/// Distinct from quill-types view models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub name: String,
    pub is_admin: bool,
}

pub struct PostRow {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub title: String,
    pub subtitle: String,
    pub date: String,
    pub body: String,
    pub img_url: String,
}

pub struct NewPost<'a> {
    pub author_id: i64,
    pub title: &'a str,
    pub subtitle: &'a str,
    pub date: &'a str,
    pub body: &'a str,
    pub img_url: &'a str,
}

/// Replacement values for an existing post. The date is never rewritten;
/// `author_id: None` keeps the current author.
pub struct PostUpdate<'a> {
    pub author_id: Option<i64>,
    pub title: &'a str,
    pub subtitle: &'a str,
    pub body: &'a str,
    pub img_url: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostEdit {
    Updated,
    MissingPost,
    MissingAuthor,
    TitleTaken,
}

pub struct CommentRow {
    pub id: i64,
    pub text: String,
    pub author_id: i64,
    pub author_name: String,
    pub author_email: String,
    pub post_id: i64,
}
