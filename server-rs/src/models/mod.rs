pub mod chat;
pub mod event;
pub mod friendship;
pub mod mail;
pub mod memory;
pub mod notification;
pub mod saved_event;
pub mod user;
pub mod venue;

pub use chat::*;
pub use event::*;
pub use friendship::*;
pub use mail::*;
pub use memory::*;
pub use notification::*;
pub use saved_event::*;
pub use user::*;
pub use venue::*;
