pub mod classify;
pub mod errors;
pub mod events;
pub mod ids;
pub mod request;
pub mod schedule;
