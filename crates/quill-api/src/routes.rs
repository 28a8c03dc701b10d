use axum::{
    Json, Router, middleware,
    routing::get,
};
use quill_types::api::StaticPage;

use crate::auth::{self, AppState};
use crate::comments;
use crate::middleware::{CurrentSession, require_admin};
use crate::posts;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(posts::index))
        .route("/register", get(auth::auth_form).post(auth::submit_register))
        .route("/login", get(auth::auth_form).post(auth::submit_login))
        .route("/logout", get(auth::submit_logout))
        .route("/post/{post_id}", get(comments::show_post).post(comments::submit_comment))
        .route("/about", get(about))
        .route("/contact", get(contact));

    let admin_routes = Router::new()
        .route("/new-post", get(posts::new_post_form).post(posts::submit_new_post))
        .route("/edit-post/{post_id}", get(posts::edit_post_form).post(posts::submit_edit_post))
        .route("/delete/{post_id}", get(posts::submit_delete_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
}

async fn about(CurrentSession(session): CurrentSession) -> Json<StaticPage> {
    static_page(session.current().cloned(), "about")
}

async fn contact(CurrentSession(session): CurrentSession) -> Json<StaticPage> {
    static_page(session.current().cloned(), "contact")
}

fn static_page(current_user: Option<quill_types::models::UserRef>, page: &str) -> Json<StaticPage> {
    Json(StaticPage {
        current_user,
        page: page.to_string(),
    })
}
