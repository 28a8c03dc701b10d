use axum::{
    Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use md5::{Digest, Md5};
use tracing::info;

use quill_db::Database;
use quill_db::models::CommentRow;
use quill_types::api::{CommentForm, PostPage};
use quill_types::models::{Comment, UserRef};

use crate::auth::{AppState, run_blocking};
use crate::error::BlogError;
use crate::flash;
use crate::middleware::CurrentSession;
use crate::posts::get_post;

/// Gravatar image for an email: 100px, "retro" fallback, G rating.
pub fn avatar_url(email: &str) -> String {
    let digest = Md5::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?s=100&d=retro&r=g",
        hex::encode(digest)
    )
}

fn to_comment(row: CommentRow) -> Comment {
    Comment {
        id: row.id,
        text: row.text,
        post_id: row.post_id,
        author_id: row.author_id,
        author_avatar: avatar_url(&row.author_email),
        author_name: row.author_name,
    }
}

// -- Operations --

/// Comments belonging to `post_id`, oldest first.
pub fn list_comments(db: &Database, post_id: i64) -> Result<Vec<Comment>, BlogError> {
    Ok(db
        .get_comments_for_post(post_id)?
        .into_iter()
        .map(to_comment)
        .collect())
}

/// Store a comment by the session user and return the post's comments as
/// they stand after the write.
pub fn add_comment(
    db: &Database,
    identity: Option<&UserRef>,
    post_id: i64,
    text: &str,
) -> Result<Vec<Comment>, BlogError> {
    let author = identity.ok_or(BlogError::Unauthenticated)?;

    if text.trim().is_empty() {
        return Err(BlogError::invalid("Comment cannot be empty."));
    }

    let id = db
        .add_comment(post_id, author.id, text)?
        .ok_or(BlogError::NotFound)?;
    info!("Comment {} added to post {} by user {}", id, post_id, author.id);

    list_comments(db, post_id)
}

// -- Handlers --

/// GET /post/{post_id}
pub async fn show_post(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(post_id): Path<i64>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<PostPage>), BlogError> {
    let (post, comments) = run_blocking(&state, move |app| {
        let post = get_post(&app.db, post_id)?;
        let comments = list_comments(&app.db, post_id)?;
        Ok((post, comments))
    })
    .await?;
    let (jar, flash) = flash::take(jar);

    Ok((
        jar,
        Json(PostPage {
            current_user: session.current().cloned(),
            flash,
            post,
            comments,
        }),
    ))
}

/// POST /post/{post_id}
pub async fn submit_comment(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(post_id): Path<i64>,
    jar: CookieJar,
    Form(form): Form<CommentForm>,
) -> Result<Response, BlogError> {
    let identity = session.current().cloned();
    let outcome = run_blocking(&state, move |app| {
        let comments = add_comment(&app.db, identity.as_ref(), post_id, &form.body)?;
        let post = get_post(&app.db, post_id)?;
        Ok((post, comments))
    })
    .await;

    match outcome {
        Ok((post, comments)) => Ok(Json(PostPage {
            current_user: session.current().cloned(),
            flash: None,
            post,
            comments,
        })
        .into_response()),
        Err(e @ BlogError::Unauthenticated) => {
            Ok((flash::set(jar, e.to_string()), Redirect::to("/login")).into_response())
        }
        Err(e @ BlogError::Invalid(_)) => {
            let back = format!("/post/{}", post_id);
            Ok((flash::set(jar, e.to_string()), Redirect::to(&back)).into_response())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user_ref;
    use crate::posts::{create_post, delete_post};
    use quill_types::api::PostForm;

    fn seed() -> (Database, UserRef, UserRef, i64) {
        let db = Database::open_in_memory().unwrap();
        let admin = user_ref(db.create_user("admin@x.com", "hash", "Admin").unwrap());
        let a = user_ref(db.create_user("a@x.com", "hash", "A").unwrap());
        let form = PostForm {
            title: "P".into(),
            subtitle: "sub".into(),
            img_url: "https://example.com/p.jpg".into(),
            body: "body".into(),
            author_id: None,
        };
        let post = create_post(&db, Some(&admin), &form).unwrap();
        (db, admin, a, post.id)
    }

    #[test]
    fn comment_is_visible_after_write() {
        let (db, _admin, a, post_id) = seed();

        let comments = add_comment(&db, Some(&a), post_id, "hello").unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "hello");
        assert_eq!(comments[0].author_id, a.id);
        assert_eq!(comments[0].author_name, "A");

        assert_eq!(list_comments(&db, post_id).unwrap().len(), 1);
    }

    #[test]
    fn comment_text_is_stored_as_typed() {
        let (db, _admin, a, post_id) = seed();

        let comments = add_comment(&db, Some(&a), post_id, "  indented\n").unwrap();
        assert_eq!(comments[0].text, "  indented\n");
    }

    #[test]
    fn comment_carries_gravatar_of_author() {
        let (db, _admin, a, post_id) = seed();

        let comments = add_comment(&db, Some(&a), post_id, "hello").unwrap();
        assert_eq!(comments[0].author_avatar, avatar_url("a@x.com"));
        assert_eq!(avatar_url(" A@X.com "), avatar_url("a@x.com"));
    }

    #[test]
    fn avatar_url_is_md5_of_email() {
        // md5("") is the well-known d41d8cd9... digest.
        assert_eq!(
            avatar_url(""),
            "https://www.gravatar.com/avatar/d41d8cd98f00b204e9800998ecf8427e?s=100&d=retro&r=g"
        );
    }

    #[test]
    fn comment_racing_delete_is_not_found() {
        use std::sync::Arc;
        use std::thread;

        let (db, admin, a, _) = seed();
        let db = Arc::new(db);

        for round in 0..200 {
            let form = PostForm {
                title: format!("Race {round}"),
                subtitle: "sub".into(),
                img_url: "https://example.com/r.jpg".into(),
                body: "body".into(),
                author_id: None,
            };
            let post_id = create_post(&db, Some(&admin), &form).unwrap().id;

            let deleter = {
                let db = db.clone();
                let admin = admin.clone();
                thread::spawn(move || delete_post(&db, Some(&admin), post_id))
            };
            let outcome = add_comment(&db, Some(&a), post_id, "hello");
            deleter.join().unwrap().unwrap();

            match outcome {
                Ok(_) | Err(BlogError::NotFound) => {}
                Err(e) => panic!("round {round}: unexpected {e:?}"),
            }
        }
    }

    #[test]
    fn anonymous_comment_is_rejected_without_write() {
        let (db, _admin, _a, post_id) = seed();

        let err = add_comment(&db, None, post_id, "hello").unwrap_err();
        assert!(matches!(err, BlogError::Unauthenticated));
        assert!(list_comments(&db, post_id).unwrap().is_empty());
    }

    #[test]
    fn comment_on_missing_post_or_blank_text_fails() {
        let (db, _admin, a, post_id) = seed();

        assert!(matches!(
            add_comment(&db, Some(&a), post_id + 1, "hello"),
            Err(BlogError::NotFound)
        ));
        assert!(matches!(
            add_comment(&db, Some(&a), post_id, "   "),
            Err(BlogError::Invalid(_))
        ));
        assert!(list_comments(&db, post_id).unwrap().is_empty());
    }

    #[test]
    fn listing_is_per_post() {
        let (db, admin, a, post_id) = seed();
        let other = create_post(
            &db,
            Some(&admin),
            &PostForm {
                title: "Q".into(),
                subtitle: "sub".into(),
                img_url: "https://example.com/q.jpg".into(),
                body: "body".into(),
                author_id: None,
            },
        )
        .unwrap();

        add_comment(&db, Some(&a), post_id, "on P").unwrap();
        add_comment(&db, Some(&admin), other.id, "on Q").unwrap();

        let on_p = list_comments(&db, post_id).unwrap();
        assert_eq!(on_p.len(), 1);
        assert_eq!(on_p[0].text, "on P");
    }
}
