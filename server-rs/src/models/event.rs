use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

pub const SPORTS: &[&str] = &["padel", "tennis", "pickleball", "squash", "badminton"];

/// Skill levels shared by user profiles and events. Events may also be
/// open to every level.
pub const LEVELS: &[&str] = &["beginner", "intermediate", "advanced", "pro"];
pub const OPEN_LEVEL: &str = "all";

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";

pub const LOCATION_VENUE: &str = "venue";
pub const LOCATION_CUSTOM: &str = "custom";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: Uuid,
    pub name: String,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetScore {
    #[serde(rename = "teamA")]
    pub team_a: u8,
    #[serde(rename = "teamB")]
    pub team_b: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    TeamA,
    TeamB,
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResults {
    pub sets: Vec<SetScore>,
    pub winner: Winner,
    #[serde(rename = "teamA")]
    pub team_a: Vec<Uuid>,
    #[serde(rename = "teamB")]
    pub team_b: Vec<Uuid>,
}

impl MatchResults {
    /// Winner implied by sets won; `None` when no sets were recorded.
    pub fn winner_from_sets(&self) -> Option<Winner> {
        if self.sets.is_empty() {
            return None;
        }
        let a = self.sets.iter().filter(|s| s.team_a > s.team_b).count();
        let b = self.sets.iter().filter(|s| s.team_b > s.team_a).count();
        Some(match a.cmp(&b) {
            std::cmp::Ordering::Greater => Winner::TeamA,
            std::cmp::Ordering::Less => Winner::TeamB,
            std::cmp::Ordering::Equal => Winner::Draw,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location_kind: String,
    pub venue_id: Option<String>,
    pub location_name: String,
    pub location_address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub level: String,
    pub price: f64,
    pub max_players: i32,
    pub is_private: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub sport: String,
    pub players: Json<Vec<PlayerEntry>>,
    pub results: Option<Json<MatchResults>>,
    pub status: String,
    pub cover_url: Option<String>,
    pub organizer_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.end_time).and_utc()
    }

    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    /// Memories may be shared once the match is over, whether or not the
    /// organizer has closed it.
    pub fn accepts_memories(&self, now: DateTime<Utc>) -> bool {
        self.is_completed() || self.ends_at() <= now
    }

    pub fn player_ids(&self) -> Vec<Uuid> {
        self.players.0.iter().map(|p| p.id).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLocation {
    pub kind: String,
    #[serde(rename = "venueId")]
    pub venue_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: EventLocation,
    pub level: String,
    pub price: f64,
    pub max_players: i32,
    pub spots_left: i32,
    pub is_private: bool,
    pub sport: String,
    pub players: Vec<PlayerEntry>,
    pub results: Option<MatchResults>,
    pub status: String,
    pub cover_url: Option<String>,
    pub organizer_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&Event> for EventView {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id,
            title: e.title.clone(),
            description: e.description.clone(),
            date: e.date,
            start_time: e.start_time,
            end_time: e.end_time,
            location: EventLocation {
                kind: e.location_kind.clone(),
                venue_id: e.venue_id.clone(),
                name: e.location_name.clone(),
                address: e.location_address.clone(),
                lat: e.lat,
                lng: e.lng,
            },
            level: e.level.clone(),
            price: e.price,
            max_players: e.max_players,
            spots_left: (e.max_players - e.players.0.len() as i32).max(0),
            is_private: e.is_private,
            sport: e.sport.clone(),
            players: e.players.0.clone(),
            results: e.results.as_ref().map(|r| r.0.clone()),
            status: e.status.clone(),
            cover_url: e.cover_url.clone(),
            organizer_id: e.organizer_id,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationInput {
    #[serde(rename = "venueId")]
    pub venue_id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub sport: String,
    pub date: Option<NaiveDate>,
    #[serde(rename = "startTime")]
    pub start_time: Option<NaiveTime>,
    #[serde(rename = "endTime")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub location: LocationInput,
    pub level: String,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "maxPlayers")]
    pub max_players: i32,
    #[serde(rename = "isPrivate", default)]
    pub is_private: bool,
    pub password: Option<String>,
    #[serde(rename = "coverUrl")]
    pub cover_url: Option<String>,
    #[serde(rename = "invitedFriends", default)]
    pub invited_friends: Vec<Uuid>,
    #[serde(rename = "emailInvites", default)]
    pub email_invites: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(rename = "startTime")]
    pub start_time: Option<NaiveTime>,
    #[serde(rename = "endTime")]
    pub end_time: Option<NaiveTime>,
    pub location: Option<LocationInput>,
    pub level: Option<String>,
    pub price: Option<f64>,
    #[serde(rename = "maxPlayers")]
    pub max_players: Option<i32>,
    #[serde(rename = "isPrivate")]
    pub is_private: Option<bool>,
    pub password: Option<String>,
    #[serde(rename = "coverUrl")]
    pub cover_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinEventRequest {
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    #[serde(rename = "friendIds", default)]
    pub friend_ids: Vec<Uuid>,
    #[serde(default)]
    pub emails: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(sets: &[(u8, u8)]) -> MatchResults {
        MatchResults {
            sets: sets
                .iter()
                .map(|&(a, b)| SetScore { team_a: a, team_b: b })
                .collect(),
            winner: Winner::Draw,
            team_a: vec![],
            team_b: vec![],
        }
    }

    #[test]
    fn winner_follows_sets_won() {
        assert_eq!(results(&[(6, 4), (3, 6), (7, 5)]).winner_from_sets(), Some(Winner::TeamA));
        assert_eq!(results(&[(2, 6), (4, 6)]).winner_from_sets(), Some(Winner::TeamB));
        assert_eq!(results(&[(6, 4), (4, 6)]).winner_from_sets(), Some(Winner::Draw));
        assert_eq!(results(&[]).winner_from_sets(), None);
    }
}
