pub mod events;
pub mod friendships;
pub mod geocoding;
pub mod mailer;
pub mod membership;
pub mod notifier;
pub mod verification;
pub mod wizard;
