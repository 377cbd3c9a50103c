use crate::{
    assets::static_router,
    config::Config,
    db,
    error::AppError,
    middleware::request_logger,
    model::{NewMessage, User},
    session::{Session, SessionStore},
    store::{SqliteStore, StoreError, TopicStore},
    views,
};
use anyhow::Result;
use axum::{
    extract::{rejection::FormRejection, FromRef, Path, State},
    http::{header, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use rand::RngCore;
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TopicStore>,
    pub sessions: SessionStore,
    pub config: Config,
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl AppState {
    /// Open the configured database and build the session signer.
    pub fn new(config: Config) -> Result<Self> {
        let pool = db::open_pool(&config.database)?;
        Ok(Self::with_store(config, Arc::new(SqliteStore::new(pool))))
    }

    pub fn with_store(config: Config, store: Arc<dyn TopicStore>) -> Self {
        let secret = match &config.session_key {
            Some(key) => key.as_bytes().to_vec(),
            None => {
                warn!("no session key configured; sessions will not survive a restart");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };
        let sessions = SessionStore::new(&secret, config.session_ttl);
        Self {
            store,
            sessions,
            config,
        }
    }
}

/// Build the HTTP application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(topic_list))
        .route("/topics", get(topic_list).post(topic_create))
        .route("/topics/", get(topic_list))
        .route("/topics/new", get(topic_new))
        .route("/topics/:id", get(topic_show))
        .route("/topics/:id/messages", post(message_create))
        .route("/join", get(join_show).post(join_create))
        .merge(static_router())
        .layer(middleware::from_fn(request_logger))
        .with_state(state)
}

/// `302 Found` pointing at `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn topic_path(id: i64) -> String {
    format!("/topics/{id}")
}

/// Route ids are plain digit strings; anything else names nothing.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::NotFound);
    }
    raw.parse().map_err(|_| AppError::NotFound)
}

/// A body that is not a readable form counts as an empty submission.
fn form_or_blank<T: Default>(form: Result<Form<T>, FormRejection>) -> T {
    match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!(%rejection, "unreadable form body");
            T::default()
        }
    }
}

async fn topic_list(
    State(state): State<AppState>,
    mut session: Session,
) -> Result<Response, AppError> {
    let topics = state.store.recent_topics()?;
    let flashes = session.take_flashes();
    let page = views::topic_list(&topics, session.user(), &flashes);
    Ok((session, Html(page.into_string())).into_response())
}

async fn topic_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut session: Session,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let Some(topic) = state.store.topic(id)? else {
        session.save_flash("Topic not found");
        return Ok((session, found("/topics")).into_response());
    };
    let flashes = session.take_flashes();
    let page = views::topic_show(&topic, session.user(), &flashes);
    Ok((session, Html(page.into_string())).into_response())
}

async fn topic_new(mut session: Session) -> Response {
    let Some(user) = session.user().cloned() else {
        session.save_flash("Log in to post a message");
        return (session, found("/topics")).into_response();
    };
    let flashes = session.take_flashes();
    let page = views::topic_new(&user, &flashes);
    (session, Html(page.into_string())).into_response()
}

#[derive(Deserialize, Default)]
struct TopicForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

async fn topic_create(
    State(state): State<AppState>,
    mut session: Session,
    form: Result<Form<TopicForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = form_or_blank(form);
    let Some(user) = session.user().cloned() else {
        session.save_flash("Log in to post a topic");
        return Ok((session, found("/topics")).into_response());
    };
    let title = form.title.trim();
    let content = form.content.trim();
    if title.is_empty() || content.is_empty() {
        session.save_flash("Inputs cannot be blank");
        return Ok((session, found("/topics/new")).into_response());
    }
    let topic = state
        .store
        .create_topic_with_message(title, content, &user)?;
    info!(topic_id = topic.id, author = user.initials(), "topic created");
    Ok((session, found(&topic_path(topic.id))).into_response())
}

#[derive(Deserialize, Default)]
struct MessageForm {
    #[serde(default)]
    content: String,
}

async fn message_create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut session: Session,
    form: Result<Form<MessageForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = form_or_blank(form);
    let Some(user) = session.user().cloned() else {
        session.save_flash("Please join to create a message");
        return Ok((session, found("/topics")).into_response());
    };
    let id = parse_id(&id)?;
    let content = form.content.trim();
    if content.is_empty() {
        session.save_flash("Content cannot be blank");
        return Ok((session, found(&topic_path(id))).into_response());
    }
    let message = NewMessage {
        topic_id: id,
        content: content.into(),
        author: user,
    };
    match state.store.create_message(message) {
        Ok(message) => {
            info!(topic_id = id, message_id = message.id, "message created");
            Ok((session, found(&topic_path(id))).into_response())
        }
        Err(StoreError::TopicNotFound(_)) => {
            session.save_flash("Topic not found");
            Ok((session, found("/topics")).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn join_show(mut session: Session) -> Response {
    if session.user().is_some() {
        return found("/topics");
    }
    let flashes = session.take_flashes();
    let page = views::join(&flashes);
    (session, Html(page.into_string())).into_response()
}

#[derive(Deserialize, Default)]
struct JoinForm {
    #[serde(default)]
    initials: String,
    #[serde(default)]
    theme: String,
}

async fn join_create(
    mut session: Session,
    form: Result<Form<JoinForm>, FormRejection>,
) -> Response {
    let form = form_or_blank(form);
    match User::from_form(&form.initials, &form.theme) {
        Ok(user) => {
            info!(initials = user.initials(), "visitor joined");
            session.save_user(user);
            (session, found("/topics")).into_response()
        }
        Err(e) => {
            session.save_flash(e.to_string());
            (session, found("/join")).into_response()
        }
    }
}

/// Run the HTTP server until Ctrl+C.
pub async fn run_http_server(config: Config) -> Result<()> {
    let addr: SocketAddr = config.bind.parse()?;
    let state = AppState::new(config)?;
    info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(build_router(state).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
