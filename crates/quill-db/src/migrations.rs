use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, blog_posts, comments)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                name        TEXT NOT NULL,
                is_admin    INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE blog_posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id   INTEGER NOT NULL REFERENCES users(id),
                title       TEXT NOT NULL UNIQUE,
                subtitle    TEXT NOT NULL,
                date        TEXT NOT NULL,
                body        TEXT NOT NULL,
                img_url     TEXT NOT NULL
            );

            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                text        TEXT NOT NULL,
                author_id   INTEGER NOT NULL REFERENCES users(id),
                post_id     INTEGER NOT NULL REFERENCES blog_posts(id)
            );

            CREATE INDEX idx_comments_post ON comments(post_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
