pub mod events;
pub mod mailer;
