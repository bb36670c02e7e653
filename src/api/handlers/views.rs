//! Server-rendered pages. Failures render the error page instead of JSON.

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tera::Context;
use tower_cookies::Cookies;
use tracing::error;

use crate::api::dtos::requests::{AlertQuery, LoginRequest, UserDataForm};
use crate::api::extractors::{auth::NOT_LOGGED_IN, maybe_auth::MaybeAuthUser, query::AppQuery};
use crate::api::handlers::{auth::set_jwt_cookie, factory::update_record};
use crate::domain::models::user::{User, UserPatch};
use crate::error::AppError;
use crate::state::AppState;

const BOOKING_ALERT: &str = "Your booking was successful! Please check your email for a confirmation. \
    If your booking doesn't show up here immediately, please come back later.";

pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
) -> Response {
    let result = async {
        let tours = state.tour_repo.list_visible().await?;
        let mut ctx = page_context("All Tours", user.as_ref());
        ctx.insert("tours", &tours);
        render(&state, "views/overview.html", &ctx)
    }
    .await;

    respond(&state, user.as_ref(), result)
}

pub async fn get_tour(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(slug): Path<String>,
) -> Response {
    let result = async {
        let tour = state
            .tour_repo
            .find_by_slug(&slug)
            .await?
            .ok_or_else(|| AppError::NotFound("There is no tour with that name.".into()))?;
        let reviews = state.review_repo.find_by_tour(&tour.id).await?;

        let mut ctx = page_context(&format!("{} Tour", tour.name), user.as_ref());
        ctx.insert("tour", &tour);
        ctx.insert("reviews", &reviews);
        render(&state, "views/tour.html", &ctx)
    }
    .await;

    respond(&state, user.as_ref(), result)
}

pub async fn get_login_form(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
) -> Response {
    let ctx = page_context("Log into your account", user.as_ref());
    let result = render(&state, "views/login.html", &ctx);
    respond(&state, user.as_ref(), result)
}

/// Form login for browsers: sets the cookie and goes back to the overview.
pub async fn submit_login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Form(form): Form<LoginRequest>,
) -> Response {
    let result = async {
        let user = state.auth_service.login(&form.email, &form.password).await?;
        set_jwt_cookie(&state, &cookies, &user)?;
        Ok(Redirect::to("/").into_response())
    }
    .await;

    respond(&state, None, result)
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
) -> Response {
    let result = logged_in(user.as_ref()).and_then(|user| {
        let ctx = page_context("Your account", Some(user));
        render(&state, "views/account.html", &ctx)
    });

    respond(&state, user.as_ref(), result)
}

pub async fn get_my_tours(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppQuery(query): AppQuery<AlertQuery>,
) -> Response {
    let result = async {
        let current = logged_in(user.as_ref())?;
        let bookings = state.booking_repo.find_by_user(&current.id).await?;
        let tour_ids: Vec<String> = bookings.into_iter().map(|b| b.tour_id).collect();
        let tours = state.tour_repo.find_by_ids(&tour_ids).await?;

        let mut ctx = page_context("My Tours", Some(current));
        ctx.insert("bookings", &true);
        ctx.insert("tours", &tours);
        if query.alert.as_deref() == Some("booking") {
            ctx.insert("alert", BOOKING_ALERT);
        }
        render(&state, "views/account.html", &ctx)
    }
    .await;

    respond(&state, user.as_ref(), result)
}

pub async fn update_user_data(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Form(form): Form<UserDataForm>,
) -> Response {
    let result = async {
        let current = logged_in(user.as_ref())?;
        let patch = UserPatch {
            name: Some(form.name),
            email: Some(form.email),
            ..UserPatch::default()
        };
        let updated = update_record::<User>(&state, &current.id, patch).await?;

        let ctx = page_context("Your account", Some(&updated));
        render(&state, "views/account.html", &ctx)
    }
    .await;

    respond(&state, user.as_ref(), result)
}

fn logged_in(user: Option<&User>) -> Result<&User, AppError> {
    user.ok_or_else(|| AppError::Unauthorized(NOT_LOGGED_IN.into()))
}

fn page_context(title: &str, user: Option<&User>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("title", title);
    if let Some(user) = user {
        ctx.insert("user", user);
    }
    ctx
}

fn render(state: &AppState, template: &str, ctx: &Context) -> Result<Response, AppError> {
    state
        .templates
        .render(template, ctx)
        .map(|html| Html(html).into_response())
        .map_err(|e| {
            error!("Failed to render {}: {:?}", template, e);
            AppError::InternalWithMsg(format!("Template rendering failed: {}", template))
        })
}

#[derive(Serialize)]
struct ErrorPage<'a> {
    title: &'a str,
    message: String,
}

fn respond(state: &AppState, user: Option<&User>, result: Result<Response, AppError>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => error_page(state, user, err),
    }
}

/// Operational errors show their message. Anything else shows a generic
/// one, except in development.
fn error_page(state: &AppState, user: Option<&User>, err: AppError) -> Response {
    let status = err.status();
    let message = match err.client_message() {
        Some(message) => message,
        None if state.config.environment.is_production() => "Please try again later.".to_string(),
        None => err.to_string(),
    };
    if status.is_server_error() {
        error!("View failed: {:?}", err);
    }

    let page = ErrorPage { title: "Something went wrong!", message };
    let mut ctx = match Context::from_serialize(&page) {
        Ok(ctx) => ctx,
        Err(_) => Context::new(),
    };
    if let Some(user) = user {
        ctx.insert("user", user);
    }

    match state.templates.render("views/error.html", &ctx) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Error page failed to render: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, page.message).into_response()
        }
    }
}
