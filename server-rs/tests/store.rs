//! Tests against a real Postgres. They run when `DATABASE_URL` points at a
//! disposable database and return early otherwise.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::{types::Json, PgPool};
use tower::ServiceExt;
use uuid::Uuid;

use webpadel_api::cache::Cache;
use webpadel_api::config::Config;
use webpadel_api::error::AppError;
use webpadel_api::middleware::auth::generate_tokens;
use webpadel_api::models::event::PlayerEntry;
use webpadel_api::models::user::User;
use webpadel_api::services::friendships::{self, FriendAction, FriendshipError, FriendshipState, SendOutcome};
use webpadel_api::services::membership::{self, MembershipError};
use webpadel_api::{build_router, db, AppState};

struct Store {
    pool: PgPool,
    config: Config,
}

impl Store {
    async fn connect() -> Option<Store> {
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("DATABASE_URL not set; skipping");
            return None;
        }
        let mut config = Config::from_env();
        config.jwt.secret = "store-secret".into();
        config.mail.api_url = String::new();
        config.mailing_list.api_key = String::new();

        let pool = db::create_pool(&config).await.expect("connect");
        db::migrate(&pool).await.expect("migrate");
        Some(Store { pool, config })
    }

    fn app(&self) -> Router {
        build_router(AppState::new(self.config.clone(), self.pool.clone(), Cache::disabled()))
    }

    fn token(&self, user: &User) -> String {
        generate_tokens(user.id, user.role(), &self.config.jwt).unwrap().0
    }

    /// Token that still claims the admin role, whatever the account says.
    fn admin_token(&self, user: &User) -> String {
        generate_tokens(user.id, Some("admin"), &self.config.jwt).unwrap().0
    }

    async fn user(&self, is_admin: bool) -> User {
        sqlx::query_as(
            r#"INSERT INTO users (id, email, display_name, is_admin)
            VALUES ($1, $2, 'Player', $3) RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(format!("{}@store.test", Uuid::new_v4()))
        .bind(is_admin)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    /// Public event tomorrow with the organizer as first player.
    async fn event(&self, organizer: &User, max_players: i32, others: &[&User]) -> Uuid {
        let id = Uuid::new_v4();
        let players: Vec<PlayerEntry> = std::iter::once(organizer)
            .chain(others.iter().copied())
            .map(User::player_entry)
            .collect();
        let ids: Vec<Uuid> = players.iter().map(|p| p.id).collect();

        sqlx::query(
            r#"INSERT INTO events (id, title, date, start_time, end_time, location_kind,
                location_name, level, max_players, sport, players, organizer_id)
            VALUES ($1, 'Evening match', CURRENT_DATE + 1, '18:00', '19:30', 'custom',
                'Club court', 'beginner', $2, 'padel', $3, $4)"#,
        )
        .bind(id)
        .bind(max_players)
        .bind(Json(players))
        .bind(organizer.id)
        .execute(&self.pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO chats (id, participant_ids) VALUES ($1, $2)")
            .bind(id)
            .bind(&ids)
            .execute(&self.pool)
            .await
            .unwrap();
        id
    }

    async fn memory(&self, event_id: Uuid, author: &User) -> Uuid {
        sqlx::query_scalar(
            r#"INSERT INTO memories (id, event_id, image_url, created_by)
            VALUES ($1, $2, 'https://img.test/m.jpg', $3) RETURNING id"#,
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(author.id)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    async fn player_count(&self, event_id: Uuid) -> i32 {
        sqlx::query_scalar("SELECT jsonb_array_length(players) FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    async fn pending_between(&self, a: Uuid, b: Uuid) -> i64 {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM friend_requests
            WHERE status = 'pending' AND ((from_id = $1 AND to_id = $2) OR (from_id = $2 AND to_id = $1))"#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }
}

async fn send(app: Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn lists_memory(body: &Value, id: Uuid) -> bool {
    body["memories"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["id"] == json!(id))
}

#[tokio::test]
async fn deleted_event_is_gone_with_its_bookmarks() {
    let Some(store) = Store::connect().await else { return };
    let organizer = store.user(false).await;
    let fan = store.user(false).await;
    let event = store.event(&organizer, 4, &[]).await;

    let (status, _) = send(
        store.app(),
        Method::PUT,
        &format!("/api/v1/saved-events/{event}"),
        Some(&store.token(&fan)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        store.app(),
        Method::DELETE,
        &format!("/api/v1/events/{event}"),
        Some(&store.token(&organizer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(store.app(), Method::GET, &format!("/api/v1/events/{event}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Event not found");

    let saved: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saved_events WHERE event_id = $1")
        .bind(event)
        .fetch_one(&store.pool)
        .await
        .unwrap();
    assert_eq!(saved, 0);
}

#[tokio::test]
async fn deleted_memory_leaves_every_listing() {
    let Some(store) = Store::connect().await else { return };
    let organizer = store.user(false).await;
    let author = store.user(false).await;
    let event = store.event(&organizer, 4, &[&author]).await;
    let memory = store.memory(event, &author).await;

    let event_uri = format!("/api/v1/events/{event}/memories");
    let feed_uri = "/api/v1/memories/community?limit=100";

    let (_, body) = send(store.app(), Method::GET, &event_uri, None, None).await;
    assert!(lists_memory(&body, memory));
    let (_, body) = send(store.app(), Method::GET, feed_uri, None, None).await;
    assert!(lists_memory(&body, memory));

    let (status, _) = send(
        store.app(),
        Method::DELETE,
        &format!("/api/v1/memories/{memory}"),
        Some(&store.token(&author)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(store.app(), Method::GET, &event_uri, None, None).await;
    assert!(!lists_memory(&body, memory));
    let (_, body) = send(store.app(), Method::GET, feed_uri, None, None).await;
    assert!(!lists_memory(&body, memory));
}

#[tokio::test]
async fn accepted_request_links_both_lists() {
    let Some(store) = Store::connect().await else { return };
    let a = store.user(false).await;
    let b = store.user(false).await;

    let request = match friendships::send_request(&store.pool, a.id, b.id).await.unwrap() {
        SendOutcome::Requested(r) => r,
        SendOutcome::Accepted(_) => panic!("nothing to accept yet"),
    };
    friendships::answer_request(&store.pool, b.id, request.id, FriendAction::Accept)
        .await
        .unwrap();

    assert!(friendships::friend_ids(&store.pool, a.id).await.unwrap().contains(&b.id));
    assert!(friendships::friend_ids(&store.pool, b.id).await.unwrap().contains(&a.id));
    assert_eq!(store.pending_between(a.id, b.id).await, 0);
}

#[tokio::test]
async fn concurrent_joins_stop_at_capacity() {
    let Some(store) = Store::connect().await else { return };
    let organizer = store.user(false).await;
    let event = store.event(&organizer, 4, &[]).await;

    let mut joins = tokio::task::JoinSet::new();
    for _ in 0..6 {
        let user = store.user(false).await;
        let pool = store.pool.clone();
        joins.spawn(async move { membership::join_event(&pool, event, &user, None).await });
    }

    let (mut joined, mut full) = (0, 0);
    while let Some(result) = joins.join_next().await {
        match result.unwrap() {
            Ok(_) => joined += 1,
            Err(AppError::Membership(MembershipError::EventFull)) => full += 1,
            Err(e) => panic!("unexpected join failure: {e}"),
        }
    }
    assert_eq!((joined, full), (3, 3));
    assert_eq!(store.player_count(event).await, 4);
}

#[tokio::test]
async fn join_survives_a_failing_chat_update() {
    let Some(store) = Store::connect().await else { return };
    let organizer = store.user(false).await;
    let player = store.user(false).await;
    let event = store.event(&organizer, 4, &[]).await;

    sqlx::query(
        r#"CREATE OR REPLACE FUNCTION reject_chat_update() RETURNS trigger AS $$
        BEGIN RAISE EXCEPTION 'chat unavailable'; END
        $$ LANGUAGE plpgsql"#,
    )
    .execute(&store.pool)
    .await
    .unwrap();
    let trigger = format!("reject_chat_{}", event.simple());
    sqlx::query(&format!(
        "CREATE TRIGGER {trigger} BEFORE UPDATE ON chats FOR EACH ROW \
         WHEN (OLD.id = '{event}') EXECUTE FUNCTION reject_chat_update()"
    ))
    .execute(&store.pool)
    .await
    .unwrap();

    let uri = format!("/api/v1/events/{event}/join");
    let (status, body) = send(store.app(), Method::POST, &uri, Some(&store.token(&player)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["players"].as_array().unwrap().len(), 2);
    assert_eq!(store.player_count(event).await, 2);

    let (status, body) = send(store.app(), Method::POST, &uri, Some(&store.token(&player)), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_JOINED");

    sqlx::query(&format!("DROP TRIGGER {trigger} ON chats"))
        .execute(&store.pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn revoked_admin_cannot_delete_with_an_old_token() {
    let Some(store) = Store::connect().await else { return };
    let organizer = store.user(false).await;
    let former_admin = store.user(false).await;
    let event = store.event(&organizer, 4, &[]).await;
    let memory = store.memory(event, &organizer).await;
    let stale = store.admin_token(&former_admin);

    let (status, _) =
        send(store.app(), Method::DELETE, &format!("/api/v1/events/{event}"), Some(&stale), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) =
        send(store.app(), Method::DELETE, &format!("/api/v1/memories/{memory}"), Some(&stale), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(store.player_count(event).await, 1);

    let admin = store.user(true).await;
    let (status, _) = send(
        store.app(),
        Method::DELETE,
        &format!("/api/v1/memories/{memory}"),
        Some(&store.token(&admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn banned_user_cannot_bookmark_or_touch_notifications() {
    let Some(store) = Store::connect().await else { return };
    let organizer = store.user(false).await;
    let banned = store.user(false).await;
    let event = store.event(&organizer, 4, &[]).await;
    sqlx::query("UPDATE users SET is_banned = true WHERE id = $1")
        .bind(banned.id)
        .execute(&store.pool)
        .await
        .unwrap();
    let token = store.token(&banned);

    let (status, body) = send(
        store.app(),
        Method::PUT,
        &format!("/api/v1/saved-events/{event}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account suspended");

    let (status, _) =
        send(store.app(), Method::POST, "/api/v1/notifications/read-all", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn crossing_requests_end_as_friends() {
    let Some(store) = Store::connect().await else { return };
    let a = store.user(false).await;
    let b = store.user(false).await;

    let (ab, ba) = tokio::join!(
        friendships::send_request(&store.pool, a.id, b.id),
        friendships::send_request(&store.pool, b.id, a.id),
    );
    let accepted = [ab.unwrap(), ba.unwrap()]
        .iter()
        .filter(|o| matches!(o, SendOutcome::Accepted(_)))
        .count();
    assert_eq!(accepted, 1);

    assert_eq!(store.pending_between(a.id, b.id).await, 0);
    assert_eq!(
        friendships::state_between(&store.pool, a.id, b.id).await.unwrap(),
        FriendshipState::Friends
    );
}

#[tokio::test]
async fn duplicate_send_reports_already_requested() {
    let Some(store) = Store::connect().await else { return };
    let a = store.user(false).await;
    let b = store.user(false).await;

    let (first, second) = tokio::join!(
        friendships::send_request(&store.pool, a.id, b.id),
        friendships::send_request(&store.pool, a.id, b.id),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(AppError::Friendship(FriendshipError::AlreadyRequested))
    )));
    assert_eq!(store.pending_between(a.id, b.id).await, 1);
}

#[tokio::test]
async fn simultaneous_registrations_conflict_cleanly() {
    let Some(store) = Store::connect().await else { return };
    let email = format!("{}@store.test", Uuid::new_v4());
    let body = json!({
        "email": email,
        "password": "secret1",
        "confirmPassword": "secret1",
        "displayName": "Ana",
        "level": "beginner",
        "sports": ["padel"],
    });

    let app = store.app();
    let (first, second) = tokio::join!(
        send(app.clone(), Method::POST, "/api/v1/auth/register", None, Some(body.clone())),
        send(app.clone(), Method::POST, "/api/v1/auth/register", None, Some(body.clone())),
    );
    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
    let conflict = if first.0 == StatusCode::CONFLICT { first.1 } else { second.1 };
    assert_eq!(conflict["error"], "Email already registered");
}
