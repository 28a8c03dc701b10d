use crate::models::{CommentRow, NewPost, PostEdit, PostRow, PostUpdate, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};

const POST_COLUMNS: &str = "p.id, p.author_id, u.name, p.title, p.subtitle, p.date, p.body, p.img_url";

impl Database {
    // -- Users --

    /// Insert a user. The very first user becomes the admin; the decision is
    /// made inside the INSERT so concurrent first registrations cannot both win.
    pub fn create_user(&self, email: &str, password_hash: &str, name: &str) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (email, password, name, is_admin)
                 SELECT ?1, ?2, ?3, NOT EXISTS (SELECT 1 FROM users)",
                (email, password_hash, name),
            )?;
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, name, is_admin FROM users WHERE email = ?1",
                [email],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Posts --

    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS}
                 FROM blog_posts p
                 JOIN users u ON p.author_id = u.id
                 ORDER BY p.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Whether a post other than `except_id` already uses `title`.
    pub fn post_title_taken(&self, title: &str, except_id: Option<i64>) -> Result<bool> {
        self.with_conn(|conn| {
            let taken = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM blog_posts WHERE title = ?1 AND id IS NOT ?2)",
                rusqlite::params![title, except_id],
                |row| row.get(0),
            )?;
            Ok(taken)
        })
    }

    pub fn insert_post(&self, post: &NewPost<'_>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO blog_posts (author_id, title, subtitle, date, body, img_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    post.author_id,
                    post.title,
                    post.subtitle,
                    post.date,
                    post.body,
                    post.img_url
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Check and apply an edit in one transaction: the post must exist, a new
    /// author must exist and the title must not belong to another post.
    pub fn edit_post(&self, id: i64, update: &PostUpdate<'_>) -> Result<PostEdit> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(current_author) = tx
                .query_row("SELECT author_id FROM blog_posts WHERE id = ?1", [id], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?
            else {
                return Ok(PostEdit::MissingPost);
            };

            let author_id = update.author_id.unwrap_or(current_author);
            if author_id != current_author {
                let known: bool = tx.query_row(
                    "SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)",
                    [author_id],
                    |row| row.get(0),
                )?;
                if !known {
                    return Ok(PostEdit::MissingAuthor);
                }
            }

            let taken: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM blog_posts WHERE title = ?1 AND id != ?2)",
                rusqlite::params![update.title, id],
                |row| row.get(0),
            )?;
            if taken {
                return Ok(PostEdit::TitleTaken);
            }

            tx.execute(
                "UPDATE blog_posts
                 SET author_id = ?2, title = ?3, subtitle = ?4, body = ?5, img_url = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    author_id,
                    update.title,
                    update.subtitle,
                    update.body,
                    update.img_url
                ],
            )?;
            tx.commit()?;
            Ok(PostEdit::Updated)
        })
    }

    /// Delete a post together with its comments. Returns `false` when no such
    /// post exists.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let comments = tx.execute("DELETE FROM comments WHERE post_id = ?1", [id])?;
            let posts = tx.execute("DELETE FROM blog_posts WHERE id = ?1", [id])?;
            if posts == 0 {
                // Nothing to delete; leave the store untouched.
                tx.rollback()?;
                return Ok(false);
            }
            tx.commit()?;
            tracing::debug!("Deleted post {} with {} comments", id, comments);
            Ok(true)
        })
    }

    // -- Comments --

    /// Insert a comment if its post still exists. Returns `None` when the
    /// post is gone; the check and the insert share one transaction.
    pub fn add_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM blog_posts WHERE id = ?1)",
                [post_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO comments (text, author_id, post_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![text, author_id, post_id],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(Some(id))
        })
    }

    pub fn get_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch the author name in a single query
            let mut stmt = conn.prepare(
                "SELECT c.id, c.text, c.author_id, u.name, u.email, c.post_id
                 FROM comments c
                 JOIN users u ON c.author_id = u.id
                 WHERE c.post_id = ?1
                 ORDER BY c.id",
            )?;

            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        author_id: row.get(2)?,
                        author_name: row.get(3)?,
                        author_email: row.get(4)?,
                        post_id: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        name: row.get(3)?,
        is_admin: row.get(4)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_name: row.get(2)?,
        title: row.get(3)?,
        subtitle: row.get(4)?,
        date: row.get(5)?,
        body: row.get(6)?,
        img_url: row.get(7)?,
    })
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, email, password, name, is_admin FROM users WHERE id = ?1",
        [id],
        user_from_row,
    )
    .optional()
}

fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    let sql = format!(
        "SELECT {POST_COLUMNS}
         FROM blog_posts p
         JOIN users u ON p.author_id = u.id
         WHERE p.id = ?1"
    );
    conn.query_row(&sql, [id], post_from_row).optional()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
