//! Step validation for the multi-step create-event and registration flows.
//!
//! Clients gate their "Next" button on the same predicates; the server
//! re-checks every step on submit and reports the first one that fails.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::models::event::{CreateEventRequest, LocationInput, LEVELS, OPEN_LEVEL, SPORTS};
use crate::models::user::RegisterRequest;

/// Invitations per event, friends and emails combined. A padel match is
/// four players including the organizer.
pub const MAX_INVITES: usize = 3;
pub const MIN_PLAYERS: i32 = 2;
pub const MAX_PLAYERS: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Basics,
    Schedule,
    Location,
    Details,
    Invites,
    Account,
    Profile,
    Preferences,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct WizardError {
    pub step: WizardStep,
    pub reason: String,
}

impl WizardError {
    pub fn new(step: WizardStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

pub trait Wizard {
    const STEPS: &'static [WizardStep];

    fn can_proceed(&self, step: WizardStep) -> Result<(), WizardError>;

    fn validate(&self) -> Result<(), WizardError> {
        Self::STEPS.iter().try_for_each(|step| self.can_proceed(*step))
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub(crate) fn check_title(title: &str) -> Result<(), &'static str> {
    let len = title.trim().chars().count();
    if !(3..=100).contains(&len) {
        return Err("Title must be 3-100 characters");
    }
    Ok(())
}

pub(crate) fn check_schedule(
    date: Option<NaiveDate>,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
    today: NaiveDate,
) -> Result<(), &'static str> {
    let (Some(date), Some(start), Some(end)) = (date, start, end) else {
        return Err("Date, start time and end time are required");
    };
    if date < today {
        return Err("Event date cannot be in the past");
    }
    if start >= end {
        return Err("End time must be after start time");
    }
    Ok(())
}

pub(crate) fn check_location(location: &LocationInput) -> Result<(), &'static str> {
    let has_venue = location
        .venue_id
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty());
    let has_name = location
        .name
        .as_deref()
        .is_some_and(|n| !n.trim().is_empty());
    if !has_venue && !has_name {
        return Err("Pick a venue or enter a location");
    }
    match (location.lat, location.lng) {
        (None, None) => Ok(()),
        (Some(lat), Some(lng)) => {
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
                Ok(())
            } else {
                Err("Coordinates are out of range")
            }
        }
        _ => Err("Latitude and longitude must be given together"),
    }
}

pub(crate) fn check_event_level(level: &str) -> Result<(), &'static str> {
    if level == OPEN_LEVEL || LEVELS.contains(&level) {
        Ok(())
    } else {
        Err("Unknown level")
    }
}

pub(crate) fn check_price(price: f64) -> Result<(), &'static str> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err("Price cannot be negative")
    }
}

pub(crate) fn check_capacity(max_players: i32) -> Result<(), &'static str> {
    if (MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
        Ok(())
    } else {
        Err("Players must be between 2 and 20")
    }
}

pub(crate) fn check_password(is_private: bool, password: Option<&str>) -> Result<(), &'static str> {
    if is_private && password.map_or(0, |p| p.chars().count()) < 4 {
        return Err("Private events need a password of at least 4 characters");
    }
    Ok(())
}

/// How many email invites remain once `friends_selected` friends are picked.
pub fn email_invites_allowed(friends_selected: usize) -> usize {
    MAX_INVITES.saturating_sub(friends_selected)
}

pub struct EventWizard<'a> {
    pub draft: &'a CreateEventRequest,
    /// Friends of the organizer; only they can be invited directly.
    pub friends: &'a [Uuid],
    pub today: NaiveDate,
}

impl Wizard for EventWizard<'_> {
    const STEPS: &'static [WizardStep] = &[
        WizardStep::Basics,
        WizardStep::Schedule,
        WizardStep::Location,
        WizardStep::Details,
        WizardStep::Invites,
    ];

    fn can_proceed(&self, step: WizardStep) -> Result<(), WizardError> {
        let d = self.draft;
        let fail = |reason: &str| WizardError::new(step, reason);
        match step {
            WizardStep::Basics => {
                check_title(&d.title).map_err(fail)?;
                if !SPORTS.contains(&d.sport.as_str()) {
                    return Err(fail("Unknown sport"));
                }
                Ok(())
            }
            WizardStep::Schedule => {
                check_schedule(d.date, d.start_time, d.end_time, self.today).map_err(fail)
            }
            WizardStep::Location => check_location(&d.location).map_err(fail),
            WizardStep::Details => {
                check_event_level(&d.level).map_err(fail)?;
                check_price(d.price).map_err(fail)?;
                check_capacity(d.max_players).map_err(fail)?;
                check_password(d.is_private, d.password.as_deref()).map_err(fail)
            }
            WizardStep::Invites => {
                if d.invited_friends.len() > MAX_INVITES {
                    return Err(fail("You can invite at most 3 friends"));
                }
                if let Some(stranger) = d.invited_friends.iter().find(|id| !self.friends.contains(id)) {
                    return Err(WizardError::new(
                        step,
                        format!("User {} is not in your friend list", stranger),
                    ));
                }
                if d.email_invites.len() > email_invites_allowed(d.invited_friends.len()) {
                    return Err(WizardError::new(
                        step,
                        format!(
                            "With {} friends selected you can send {} email invites",
                            d.invited_friends.len(),
                            email_invites_allowed(d.invited_friends.len())
                        ),
                    ));
                }
                if d.email_invites.iter().any(|e| !is_valid_email(e)) {
                    return Err(fail("Invalid invite email"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

pub struct RegisterWizard<'a> {
    pub draft: &'a RegisterRequest,
}

impl Wizard for RegisterWizard<'_> {
    const STEPS: &'static [WizardStep] = &[
        WizardStep::Account,
        WizardStep::Profile,
        WizardStep::Preferences,
    ];

    fn can_proceed(&self, step: WizardStep) -> Result<(), WizardError> {
        let d = self.draft;
        let fail = |reason: &str| WizardError::new(step, reason);
        match step {
            WizardStep::Account => {
                if !is_valid_email(&d.email) {
                    return Err(fail("Enter a valid email address"));
                }
                if d.password.chars().count() < 6 {
                    return Err(fail("Password must be at least 6 characters"));
                }
                if d.password != d.confirm_password {
                    return Err(fail("Passwords do not match"));
                }
                Ok(())
            }
            WizardStep::Profile => check_display_name(&d.display_name).map_err(fail),
            WizardStep::Preferences => {
                match d.level.as_deref() {
                    Some(level) if LEVELS.contains(&level) => {}
                    _ => return Err(fail("Choose your level")),
                }
                check_sports(&d.sports).map_err(fail)
            }
            _ => Ok(()),
        }
    }
}

pub(crate) fn check_display_name(name: &str) -> Result<(), &'static str> {
    let len = name.trim().chars().count();
    if !(2..=50).contains(&len) {
        return Err("Name must be 2-50 characters");
    }
    Ok(())
}

pub(crate) fn check_sports(sports: &[String]) -> Result<(), &'static str> {
    if sports.is_empty() {
        return Err("Pick at least one sport");
    }
    if sports.iter().any(|s| !SPORTS.contains(&s.as_str())) {
        return Err("Unknown sport");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
    }

    fn draft() -> CreateEventRequest {
        CreateEventRequest {
            title: "Sunday padel".into(),
            description: None,
            sport: "padel".into(),
            date: NaiveDate::from_ymd_opt(2026, 5, 3),
            start_time: NaiveTime::from_hms_opt(10, 0, 0),
            end_time: NaiveTime::from_hms_opt(11, 30, 0),
            location: LocationInput {
                venue_id: Some("club-central".into()),
                ..Default::default()
            },
            level: "intermediate".into(),
            price: 8.5,
            max_players: 4,
            is_private: false,
            password: None,
            cover_url: None,
            invited_friends: vec![],
            email_invites: vec![],
        }
    }

    fn register() -> RegisterRequest {
        RegisterRequest {
            email: "ana@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            display_name: "Ana".into(),
            phone: None,
            level: Some("beginner".into()),
            sports: vec!["padel".into()],
            photo_url: None,
        }
    }

    fn check(d: &CreateEventRequest, friends: &[Uuid]) -> Result<(), WizardError> {
        EventWizard {
            draft: d,
            friends,
            today: today(),
        }
        .validate()
    }

    #[test]
    fn complete_draft_passes() {
        assert_eq!(check(&draft(), &[]), Ok(()));
    }

    #[test]
    fn first_failing_step_is_reported() {
        let mut d = draft();
        d.title = "x".into();
        d.max_players = 1;
        assert_eq!(check(&d, &[]).unwrap_err().step, WizardStep::Basics);
    }

    #[test]
    fn schedule_rejects_inverted_times_and_past_dates() {
        let mut d = draft();
        d.end_time = NaiveTime::from_hms_opt(9, 0, 0);
        assert_eq!(check(&d, &[]).unwrap_err().step, WizardStep::Schedule);

        let mut d = draft();
        d.date = NaiveDate::from_ymd_opt(2026, 4, 30);
        assert_eq!(check(&d, &[]).unwrap_err().step, WizardStep::Schedule);
    }

    #[test]
    fn custom_location_needs_a_name_and_paired_coordinates() {
        let mut d = draft();
        d.location = LocationInput {
            name: Some("Beach courts".into()),
            lat: Some(41.38),
            ..Default::default()
        };
        assert_eq!(check(&d, &[]).unwrap_err().step, WizardStep::Location);

        d.location.lng = Some(2.17);
        assert_eq!(check(&d, &[]), Ok(()));

        d.location = LocationInput::default();
        assert_eq!(check(&d, &[]).unwrap_err().step, WizardStep::Location);
    }

    #[test]
    fn private_event_needs_password() {
        let mut d = draft();
        d.is_private = true;
        assert_eq!(check(&d, &[]).unwrap_err().step, WizardStep::Details);
        d.password = Some("1234".into());
        assert_eq!(check(&d, &[]), Ok(()));
    }

    #[test]
    fn two_friends_leave_room_for_one_email() {
        let friends = [Uuid::from_u128(1), Uuid::from_u128(2)];
        let mut d = draft();
        d.invited_friends = friends.to_vec();
        d.email_invites = vec!["a@x.com".into()];
        assert_eq!(check(&d, &friends), Ok(()));

        d.email_invites.push("b@x.com".into());
        let err = check(&d, &friends).unwrap_err();
        assert_eq!(err.step, WizardStep::Invites);
        assert!(err.reason.contains("1 email"));
    }

    #[test]
    fn only_friends_can_be_invited() {
        let mut d = draft();
        d.invited_friends = vec![Uuid::from_u128(5)];
        assert_eq!(check(&d, &[Uuid::from_u128(1)]).unwrap_err().step, WizardStep::Invites);
    }

    #[test]
    fn invite_allowance() {
        assert_eq!(email_invites_allowed(0), 3);
        assert_eq!(email_invites_allowed(2), 1);
        assert_eq!(email_invites_allowed(5), 0);
    }

    #[test]
    fn registration_steps() {
        assert_eq!(RegisterWizard { draft: &register() }.validate(), Ok(()));

        let mut r = register();
        r.confirm_password = "other".into();
        let err = RegisterWizard { draft: &r }.validate().unwrap_err();
        assert_eq!(err.step, WizardStep::Account);

        let mut r = register();
        r.sports.clear();
        let err = RegisterWizard { draft: &r }.validate().unwrap_err();
        assert_eq!(err.step, WizardStep::Preferences);

        let r = register();
        let wizard = RegisterWizard { draft: &r };
        assert!(wizard.can_proceed(WizardStep::Profile).is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ana@example.com"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("ana example@x.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@b@c.com"));
    }
}
