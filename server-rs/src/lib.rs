use axum::{
    http::HeaderValue,
    middleware as axum_mw,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use cache::Cache;
use config::Config;
use middleware::rate_limit::RateLimiter;
use services::geocoding::GeocodingClient;
use services::mailer::{EmailClient, MailingListClient};
use services::notifier::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub cache: Cache,
    pub config: Arc<Config>,
    pub notifier: Notifier,
    pub mailing_list: Option<MailingListClient>,
    pub geocoder: GeocodingClient,
    pub rate_limiter: RateLimiter,
    pub mutation_rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, db: sqlx::PgPool, cache: Cache) -> Self {
        let notifier = Notifier::new(db.clone(), EmailClient::new(&config.mail));
        let rate_limiter =
            RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs);
        let mutation_rate_limiter =
            RateLimiter::new(config.rate_limit.mutation_max, config.rate_limit.window_secs);

        Self {
            mailing_list: MailingListClient::new(&config.mailing_list),
            geocoder: GeocodingClient::new(&config.geocoding),
            db,
            cache,
            notifier,
            rate_limiter,
            mutation_rate_limiter,
            config: Arc::new(config),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    cors.allow_origin(origins)
}

pub fn build_router(state: AppState) -> Router {
    let authenticate = || axum_mw::from_fn_with_state(state.clone(), middleware::auth::authenticate);
    let reject_banned = || axum_mw::from_fn_with_state(state.clone(), middleware::admin::reject_banned);
    let mutation_limit =
        || axum_mw::from_fn_with_state(state.clone(), middleware::rate_limit::mutation_rate_limit);

    // --- Auth routes (no auth required except resend) ---
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/verify-email", post(routes::auth::verify_email))
        .route(
            "/resend-verification",
            post(routes::auth::resend_verification)
                .layer(mutation_limit())
                .layer(authenticate()),
        );

    let user_routes = Router::new()
        .route("/me", get(routes::users::get_me).put(routes::users::update_me))
        .route("/me/stats", get(routes::users::my_stats))
        .route("/search", get(routes::users::search_users))
        .route("/:id", get(routes::users::get_profile))
        .layer(reject_banned())
        .layer(authenticate());

    // Reads are public; handlers that need a user take `AuthUser` and
    // answer 401 without one.
    let event_routes = Router::new()
        .route("/", get(routes::events::list_events).post(routes::events::create_event))
        .route("/mine", get(routes::events::my_events))
        .route(
            "/:id",
            get(routes::events::get_event)
                .put(routes::events::update_event)
                .delete(routes::events::delete_event),
        )
        .route("/:id/join", post(routes::events::join_event).layer(mutation_limit()))
        .route("/:id/leave", post(routes::events::leave_event).layer(mutation_limit()))
        .route("/:id/invite", post(routes::events::invite).layer(mutation_limit()))
        .route("/:id/results", put(routes::events::record_results))
        .route("/:id/complete", post(routes::events::complete_event))
        .route(
            "/:id/memories",
            get(routes::memories::list_event_memories).post(routes::memories::create_memory),
        )
        .route(
            "/:id/chat",
            get(routes::chats::list_messages).post(routes::chats::post_message),
        )
        .layer(reject_banned())
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::optional_auth,
        ));

    let friend_routes = Router::new()
        .route("/", get(routes::friends::list_friends))
        .route("/requests", get(routes::friends::friend_requests))
        .route("/request", post(routes::friends::send_request))
        .route("/requests/:id/accept", post(routes::friends::accept_request))
        .route("/requests/:id/reject", post(routes::friends::reject_request))
        .route("/requests/:id/cancel", post(routes::friends::cancel_request))
        .route("/status/:id", get(routes::friends::friendship_status))
        .route("/:id", delete(routes::friends::remove_friend))
        .layer(reject_banned())
        .layer(authenticate());

    let notification_routes = Router::new()
        .route("/", get(routes::notifications::list_notifications))
        .route("/unread-count", get(routes::notifications::unread_count))
        .route("/read-all", post(routes::notifications::mark_all_read))
        .route("/:id/read", post(routes::notifications::mark_read))
        .route("/:id", delete(routes::notifications::delete_notification))
        .layer(reject_banned())
        .layer(authenticate());

    let memory_routes = Router::new()
        .route("/community", get(routes::memories::community_feed))
        .route(
            "/:id/like",
            post(routes::memories::like_memory).delete(routes::memories::unlike_memory),
        )
        .route("/:id", delete(routes::memories::delete_memory))
        .layer(reject_banned())
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::optional_auth,
        ));

    let saved_routes = Router::new()
        .route("/", get(routes::saved::list_saved))
        .route(
            "/:eventId",
            put(routes::saved::save_event).delete(routes::saved::unsave_event),
        )
        .layer(reject_banned())
        .layer(authenticate());

    let location_routes = Router::new()
        .route("/", get(routes::locations::list_venues))
        .route("/search", get(routes::locations::geocode))
        .route("/:id", get(routes::locations::get_venue));

    let admin_routes = Router::new()
        .route("/analytics", get(routes::admin::analytics))
        .route("/users", get(routes::admin::list_users))
        .route("/users/:id/ban", post(routes::admin::ban_user))
        .route("/users/:id/unban", post(routes::admin::unban_user))
        .route("/users/:id/admin", put(routes::admin::set_admin))
        .route("/events", get(routes::admin::list_events))
        .route("/events/:id", delete(routes::admin::delete_event))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::admin::require_admin,
        ))
        .layer(authenticate());

    // --- Compose full API ---
    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/events", event_routes)
        .nest("/friends", friend_routes)
        .nest("/notifications", notification_routes)
        .nest("/memories", memory_routes)
        .nest("/saved-events", saved_routes)
        .nest("/locations", location_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(routes::health::health))
        // Global middleware
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
