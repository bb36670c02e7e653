use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request},
    handler::HandlerWithoutStateExt,
    http::Uri,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{auth, booking, factory, health, review, tour, user, views};
use crate::api::middleware::{
    auth::{protect, restrict_to, ADMIN, ADMIN_OR_LEAD, CUSTOMER, CUSTOMER_OR_ADMIN, STAFF},
    errors::{expose_error_details, handle_panic},
    rate_limit::limit_by_ip,
    security::add_security_headers,
};
use crate::domain::models::{booking::Booking, review::Review, tour::Tour, user::User};
use crate::error::AppError;
use tower_http::{
    catch_panic::CatchPanicLayer,
    classify::ServerErrorsFailureClass,
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tower_cookies::CookieManagerLayer;
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

const JSON_BODY_LIMIT: usize = 10 * 1024;
const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;
const WEBHOOK_BODY_LIMIT: usize = 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let public_dir = state.config.public_dir.clone();

    let router = Router::new()
        .route("/health", get(health::health_check))

        // Payment provider callback, raw body
        .route(
            "/webhook-checkout",
            post(booking::webhook_checkout).route_layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)),
        )

        .merge(view_routes(&state))
        .nest("/api/v1", api_routes(&state))
        .fallback_service(
            ServeDir::new(public_dir)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(not_found.into_service()),
        )

        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(UPLOAD_BODY_LIMIT))
        .layer(from_fn_with_state(state.clone(), expose_error_details))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        user_id = tracing::field::Empty,
                        user_role = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .layer(CookieManagerLayer::new());

    add_security_headers(router).with_state(state)
}

fn view_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let pages = Router::new()
        .route("/", get(views::get_overview))
        .route("/tour/{slug}", get(views::get_tour))
        .route("/login", get(views::get_login_form))
        .route("/me", get(views::get_account))
        .route("/my-tours", get(views::get_my_tours));

    // Form posts draw from the same per-IP quota as the API.
    let forms = Router::new()
        .route("/login", post(views::submit_login))
        .route("/submit-user-data", post(views::update_user_data))
        .route_layer(from_fn_with_state(state.clone(), limit_by_ip));

    pages.merge(forms)
}

fn api_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/tours", tour_routes(state))
        .nest("/users", user_routes(state))
        .nest("/reviews", review_routes(state))
        .nest("/bookings", booking_routes(state))
        .layer(from_fn_with_state(state.clone(), limit_by_ip))
}

fn tour_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/top-5-cheap", get(tour::top_5_cheap))
        .route("/tour-stats", get(tour::tour_stats))
        .route("/tours-within/{distance}/center/{latlng}/unit/{unit}", get(tour::get_tours_within))
        .route("/distances/{latlng}/unit/{unit}", get(tour::get_distances))
        .route("/", get(factory::get_all::<Tour>))
        .route("/{id}", get(factory::get_one::<Tour>));

    let staff = Router::new()
        .route("/monthly-plan/{year}", get(tour::get_monthly_plan))
        .route_layer(from_fn(restrict_to(STAFF)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let managers = Router::new()
        .route("/", post(factory::create_one::<Tour>))
        .route(
            "/{id}",
            patch(tour::update_tour)
                .route_layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
                .delete(factory::delete_one::<Tour>),
        )
        .route_layer(from_fn(restrict_to(ADMIN_OR_LEAD)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    // Nested reviews: GET /tours/{id}/reviews, POST /tours/{id}/reviews
    let reviews = Router::new()
        .route("/{id}/reviews", get(review::list_tour_reviews))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let reviewers = Router::new()
        .route("/{id}/reviews", post(review::create_tour_review))
        .route_layer(from_fn(restrict_to(CUSTOMER)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(staff).merge(managers).merge(reviews).merge(reviewers)
}

fn user_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/{token}", patch(auth::reset_password));

    let me = Router::new()
        .route("/updateMyPassword", patch(auth::update_my_password))
        .route("/me", get(user::get_me))
        .route(
            "/updateMe",
            patch(user::update_me).route_layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/deleteMe", axum::routing::delete(user::delete_me))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let admin = Router::new()
        .route("/", get(factory::get_all::<User>).post(user::create_user))
        .route(
            "/{id}",
            get(factory::get_one::<User>)
                .patch(factory::update_one::<User>)
                .delete(factory::delete_one::<User>),
        )
        .route_layer(from_fn(restrict_to(ADMIN)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(me).merge(admin)
}

fn review_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let readers = Router::new()
        .route("/", get(factory::get_all::<Review>))
        .route("/{id}", get(factory::get_one::<Review>));

    let authors = Router::new()
        .route("/", post(review::create_review))
        .route_layer(from_fn(restrict_to(CUSTOMER)));

    let editors = Router::new()
        .route("/{id}", patch(factory::update_one::<Review>).delete(factory::delete_one::<Review>))
        .route_layer(from_fn(restrict_to(CUSTOMER_OR_ADMIN)));

    readers
        .merge(authors)
        .merge(editors)
        .route_layer(from_fn_with_state(state.clone(), protect))
}

fn booking_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let customers = Router::new()
        .route("/checkout-session/{tour_id}", get(booking::get_checkout_session));

    let managers = Router::new()
        .route("/", get(factory::get_all::<Booking>).post(factory::create_one::<Booking>))
        .route(
            "/{id}",
            get(factory::get_one::<Booking>)
                .patch(factory::update_one::<Booking>)
                .delete(factory::delete_one::<Booking>),
        )
        .route_layer(from_fn(restrict_to(ADMIN_OR_LEAD)));

    customers
        .merge(managers)
        .route_layer(from_fn_with_state(state.clone(), protect))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri.path()))
}
