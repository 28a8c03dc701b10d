use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDate;
use tracing::info;

use quill_db::models::{NewPost, PostEdit, PostRow, PostUpdate};
use quill_db::{Database, is_unique_violation};
use quill_types::api::{FormPage, IndexPage, PostForm};
use quill_types::models::{Post, PostSummary, UserRef};

use crate::access::ensure_admin;
use crate::auth::{AppState, run_blocking};
use crate::error::BlogError;
use crate::flash;
use crate::middleware::CurrentSession;

/// Creation date as shown on the post, e.g. "April 03, 2024".
pub fn post_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

fn to_post(row: PostRow) -> Post {
    Post {
        id: row.id,
        title: row.title,
        subtitle: row.subtitle,
        date: row.date,
        body: row.body,
        img_url: row.img_url,
        author_id: row.author_id,
        author_name: row.author_name,
    }
}

fn to_summary(row: PostRow) -> PostSummary {
    PostSummary {
        id: row.id,
        title: row.title,
        subtitle: row.subtitle,
        date: row.date,
        author_id: row.author_id,
        author_name: row.author_name,
    }
}

fn validate(form: &PostForm) -> Result<(), BlogError> {
    let required = [
        (&form.title, "Title"),
        (&form.subtitle, "Subtitle"),
        (&form.img_url, "Image URL"),
        (&form.body, "Body"),
    ];
    for (value, label) in required {
        if value.trim().is_empty() {
            return Err(BlogError::Invalid(format!("{label} is required.")));
        }
    }

    let img_url = form.img_url.trim();
    if !(img_url.starts_with("http://") || img_url.starts_with("https://")) {
        return Err(BlogError::invalid("Image URL must be an http(s) URL."));
    }

    Ok(())
}

fn title_conflict(e: anyhow::Error) -> BlogError {
    if is_unique_violation(&e) {
        BlogError::DuplicateTitle
    } else {
        BlogError::Internal(e)
    }
}

// -- Operations --

pub fn list_posts(db: &Database) -> Result<Vec<PostSummary>, BlogError> {
    Ok(db.list_posts()?.into_iter().map(to_summary).collect())
}

pub fn get_post(db: &Database, post_id: i64) -> Result<Post, BlogError> {
    db.get_post(post_id)?.map(to_post).ok_or(BlogError::NotFound)
}

pub fn create_post(
    db: &Database,
    identity: Option<&UserRef>,
    form: &PostForm,
) -> Result<Post, BlogError> {
    let admin = ensure_admin(identity)?;
    validate(form)?;

    let title = form.title.trim();
    if db.post_title_taken(title, None)? {
        return Err(BlogError::DuplicateTitle);
    }

    let date = post_date(chrono::Local::now().date_naive());
    let id = db
        .insert_post(&NewPost {
            author_id: admin.id,
            title,
            subtitle: form.subtitle.trim(),
            date: &date,
            body: &form.body,
            img_url: form.img_url.trim(),
        })
        .map_err(title_conflict)?;

    info!("Post {} created by user {}", id, admin.id);
    get_post(db, id)
}

pub fn edit_post(
    db: &Database,
    identity: Option<&UserRef>,
    post_id: i64,
    form: &PostForm,
) -> Result<Post, BlogError> {
    let admin = ensure_admin(identity)?;
    validate(form)?;

    let outcome = db
        .edit_post(
            post_id,
            &PostUpdate {
                author_id: form.author_id,
                title: form.title.trim(),
                subtitle: form.subtitle.trim(),
                body: &form.body,
                img_url: form.img_url.trim(),
            },
        )
        .map_err(title_conflict)?;

    match outcome {
        PostEdit::Updated => {}
        PostEdit::MissingPost => return Err(BlogError::NotFound),
        PostEdit::MissingAuthor => return Err(BlogError::invalid("Author does not exist.")),
        PostEdit::TitleTaken => return Err(BlogError::DuplicateTitle),
    }

    info!("Post {} edited by user {}", post_id, admin.id);
    get_post(db, post_id)
}

pub fn delete_post(
    db: &Database,
    identity: Option<&UserRef>,
    post_id: i64,
) -> Result<(), BlogError> {
    let admin = ensure_admin(identity)?;
    if !db.delete_post(post_id)? {
        return Err(BlogError::NotFound);
    }
    info!("Post {} deleted by user {}", post_id, admin.id);
    Ok(())
}

// -- Handlers --

/// GET /
pub async fn index(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> Result<(CookieJar, Json<IndexPage>), BlogError> {
    let posts = run_blocking(&state, |app| list_posts(&app.db)).await?;
    let (jar, flash) = flash::take(jar);

    Ok((
        jar,
        Json(IndexPage {
            current_user: session.current().cloned(),
            flash,
            posts,
        }),
    ))
}

/// GET /new-post
pub async fn new_post_form(
    Extension(admin): Extension<UserRef>,
    jar: CookieJar,
) -> (CookieJar, Json<FormPage>) {
    let (jar, flash) = flash::take(jar);
    (
        jar,
        Json(FormPage {
            current_user: Some(admin),
            flash,
            values: None,
        }),
    )
}

/// POST /new-post
pub async fn submit_new_post(
    State(state): State<AppState>,
    Extension(admin): Extension<UserRef>,
    jar: CookieJar,
    Form(form): Form<PostForm>,
) -> Result<Response, BlogError> {
    let outcome = run_blocking(&state, move |app| create_post(&app.db, Some(&admin), &form)).await;

    match outcome {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(e @ (BlogError::DuplicateTitle | BlogError::Invalid(_))) => {
            Ok((flash::set(jar, e.to_string()), Redirect::to("/new-post")).into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /edit-post/{post_id}
pub async fn edit_post_form(
    State(state): State<AppState>,
    Extension(admin): Extension<UserRef>,
    Path(post_id): Path<i64>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<FormPage>), BlogError> {
    let post = run_blocking(&state, move |app| get_post(&app.db, post_id)).await?;
    let (jar, flash) = flash::take(jar);

    Ok((
        jar,
        Json(FormPage {
            current_user: Some(admin),
            flash,
            values: Some(PostForm::from(&post)),
        }),
    ))
}

/// POST /edit-post/{post_id}
pub async fn submit_edit_post(
    State(state): State<AppState>,
    Extension(admin): Extension<UserRef>,
    Path(post_id): Path<i64>,
    jar: CookieJar,
    Form(form): Form<PostForm>,
) -> Result<Response, BlogError> {
    let outcome =
        run_blocking(&state, move |app| edit_post(&app.db, Some(&admin), post_id, &form)).await;

    match outcome {
        Ok(post) => Ok(Redirect::to(&format!("/post/{}", post.id)).into_response()),
        Err(e @ (BlogError::DuplicateTitle | BlogError::Invalid(_))) => {
            let back = format!("/edit-post/{}", post_id);
            Ok((flash::set(jar, e.to_string()), Redirect::to(&back)).into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /delete/{post_id}
pub async fn submit_delete_post(
    State(state): State<AppState>,
    Extension(admin): Extension<UserRef>,
    Path(post_id): Path<i64>,
) -> Result<Redirect, BlogError> {
    run_blocking(&state, move |app| delete_post(&app.db, Some(&admin), post_id)).await?;
    Ok(Redirect::to("/"))
}
