pub mod admin;
pub mod auth;
pub mod chats;
pub mod events;
pub mod friends;
pub mod health;
pub mod locations;
pub mod memories;
pub mod notifications;
pub mod saved;
pub mod users;
