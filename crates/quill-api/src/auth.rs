use std::sync::Arc;

use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info};

use quill_db::models::UserRow;
use quill_db::{Database, is_unique_violation};
use quill_types::api::{FormPage, LoginForm, RegisterForm};
use quill_types::models::UserRef;

use crate::error::BlogError;
use crate::flash;
use crate::middleware::CurrentSession;
use crate::password::{Pbkdf2Hasher, verify_password};
use crate::session::{Session, SessionConfig};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub hasher: Pbkdf2Hasher,
    pub session: SessionConfig,
}

impl AppStateInner {
    pub fn new(db: Database, hasher: Pbkdf2Hasher, session: SessionConfig) -> AppState {
        Arc::new(Self { db, hasher, session })
    }
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, BlogError>
where
    F: FnOnce(&AppStateInner) -> Result<T, BlogError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            BlogError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}

pub(crate) fn user_ref(row: UserRow) -> UserRef {
    UserRef {
        id: row.id,
        email: row.email,
        name: row.name,
        is_admin: row.is_admin,
    }
}

// -- Operations --

pub fn register(
    db: &Database,
    hasher: &Pbkdf2Hasher,
    session: &mut Session,
    email: &str,
    password: &str,
    name: &str,
) -> Result<UserRef, BlogError> {
    let email = email.trim();
    let name = name.trim();
    if !email.contains('@') {
        return Err(BlogError::invalid("Please enter a valid email address."));
    }
    if password.is_empty() {
        return Err(BlogError::invalid("Password is required."));
    }
    if name.is_empty() {
        return Err(BlogError::invalid("Name is required."));
    }

    if db.get_user_by_email(email)?.is_some() {
        return Err(BlogError::DuplicateEmail);
    }

    let password_hash = hasher.hash(password);

    // The unique index is the real guard against a concurrent registration.
    let row = db
        .create_user(email, &password_hash, name)
        .map_err(email_conflict)?;

    let user = user_ref(row);
    info!("Registered user {} (admin: {})", user.id, user.is_admin);
    session.bind(user.clone());
    Ok(user)
}

fn email_conflict(e: anyhow::Error) -> BlogError {
    if is_unique_violation(&e) {
        BlogError::DuplicateEmail
    } else {
        BlogError::Internal(e)
    }
}

pub fn login(
    db: &Database,
    session: &mut Session,
    email: &str,
    password: &str,
) -> Result<UserRef, BlogError> {
    let row = db
        .get_user_by_email(email.trim())?
        .ok_or(BlogError::UnknownEmail)?;

    if !verify_password(&row.password, password) {
        info!("Failed login for user {}", row.id);
        return Err(BlogError::BadPassword);
    }

    let user = user_ref(row);
    session.bind(user.clone());
    Ok(user)
}

pub fn logout(session: &mut Session) {
    session.clear();
}

pub fn current_identity(session: &Session) -> Option<&UserRef> {
    session.current()
}

// -- Handlers --

/// GET /register and GET /login
pub async fn auth_form(
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> (CookieJar, Json<FormPage>) {
    let (jar, flash) = flash::take(jar);
    (
        jar,
        Json(FormPage {
            current_user: session.current().cloned(),
            flash,
            values: None,
        }),
    )
}

/// POST /register
pub async fn submit_register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, BlogError> {
    let outcome = run_blocking(&state, move |app| {
        let mut session = Session::anonymous();
        register(&app.db, &app.hasher, &mut session, &form.email, &form.password, &form.name)?;
        Ok(session)
    })
    .await;

    match outcome {
        Ok(session) => {
            let jar = state.session.persist(jar, &session)?;
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e @ BlogError::DuplicateEmail) => {
            Ok((flash::set(jar, e.to_string()), Redirect::to("/login")).into_response())
        }
        Err(e @ BlogError::Invalid(_)) => {
            Ok((flash::set(jar, e.to_string()), Redirect::to("/register")).into_response())
        }
        Err(e) => Err(e),
    }
}

/// POST /login
pub async fn submit_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, BlogError> {
    let outcome = run_blocking(&state, move |app| {
        let mut session = Session::anonymous();
        login(&app.db, &mut session, &form.email, &form.password)?;
        Ok(session)
    })
    .await;

    match outcome {
        Ok(session) => {
            let jar = state.session.persist(jar, &session)?;
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e @ (BlogError::UnknownEmail | BlogError::BadPassword)) => {
            Ok((flash::set(jar, e.to_string()), Redirect::to("/login")).into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /logout
pub async fn submit_logout(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), BlogError> {
    logout(&mut session);
    let jar = state.session.persist(jar, &session)?;
    Ok((jar, Redirect::to("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, Pbkdf2Hasher) {
        (Database::open_in_memory().unwrap(), Pbkdf2Hasher::new(1_000))
    }

    #[test]
    fn register_binds_session_and_first_user_is_admin() {
        let (db, hasher) = setup();
        let mut session = Session::anonymous();

        let admin = register(&db, &hasher, &mut session, "admin@x.com", "secret", "Admin").unwrap();
        assert!(admin.is_admin);
        assert_eq!(current_identity(&session), Some(&admin));

        let mut other = Session::anonymous();
        let a = register(&db, &hasher, &mut other, "a@x.com", "pw1", "A").unwrap();
        assert!(!a.is_admin);
    }

    #[test]
    fn duplicate_email_leaves_first_user_intact() {
        let (db, hasher) = setup();
        let mut session = Session::anonymous();
        register(&db, &hasher, &mut session, "a@x.com", "pw1", "A").unwrap();

        let mut second = Session::anonymous();
        let err = register(&db, &hasher, &mut second, "a@x.com", "pw2", "Imposter").unwrap_err();
        assert!(matches!(err, BlogError::DuplicateEmail));
        assert!(!second.is_authenticated());

        let row = db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(row.name, "A");
        assert!(verify_password(&row.password, "pw1"));
    }

    #[test]
    fn store_unique_violation_maps_to_duplicate_email() {
        let (db, hasher) = setup();
        let mut session = Session::anonymous();
        register(&db, &hasher, &mut session, "a@x.com", "pw1", "A").unwrap();

        // Skip the lookup, as a concurrent registration would.
        let err = db
            .create_user("a@x.com", &hasher.hash("pw2"), "B")
            .map(|row| row.id)
            .map_err(email_conflict)
            .unwrap_err();
        assert!(matches!(err, BlogError::DuplicateEmail));

        let err = email_conflict(anyhow::anyhow!("database is locked"));
        assert!(matches!(err, BlogError::Internal(_)));
    }

    #[test]
    fn password_is_never_stored_in_plaintext() {
        let (db, hasher) = setup();
        let mut session = Session::anonymous();
        register(&db, &hasher, &mut session, "a@x.com", "pw1", "A").unwrap();

        let row = db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_ne!(row.password, "pw1");
        assert!(row.password.starts_with("pbkdf2:sha256:"));
    }

    #[test]
    fn login_checks_email_then_password() {
        let (db, hasher) = setup();
        let mut session = Session::anonymous();
        register(&db, &hasher, &mut session, "a@x.com", "pw1", "A").unwrap();

        let mut fresh = Session::anonymous();
        assert!(matches!(
            login(&db, &mut fresh, "nobody@x.com", "pw1"),
            Err(BlogError::UnknownEmail)
        ));
        assert!(matches!(
            login(&db, &mut fresh, "a@x.com", "wrong"),
            Err(BlogError::BadPassword)
        ));
        assert!(!fresh.is_authenticated());

        let user = login(&db, &mut fresh, "a@x.com", "pw1").unwrap();
        assert_eq!(current_identity(&fresh).map(|u| u.id), Some(user.id));
    }

    #[test]
    fn register_rejects_incomplete_forms() {
        let (db, hasher) = setup();
        let mut session = Session::anonymous();
        assert!(matches!(
            register(&db, &hasher, &mut session, "not-an-email", "pw", "A"),
            Err(BlogError::Invalid(_))
        ));
        assert!(matches!(
            register(&db, &hasher, &mut session, "a@x.com", "", "A"),
            Err(BlogError::Invalid(_))
        ));
        assert!(matches!(
            register(&db, &hasher, &mut session, "a@x.com", "pw", "  "),
            Err(BlogError::Invalid(_))
        ));
        assert!(db.get_user_by_email("a@x.com").unwrap().is_none());
    }

    #[test]
    fn logout_twice_stays_anonymous() {
        let (db, hasher) = setup();
        let mut session = Session::anonymous();
        register(&db, &hasher, &mut session, "a@x.com", "pw1", "A").unwrap();

        logout(&mut session);
        assert!(current_identity(&session).is_none());
        logout(&mut session);
        assert!(current_identity(&session).is_none());
    }
}
