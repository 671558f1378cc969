mod auth;
pub mod client;
pub mod pages;
pub mod types;

pub use auth::resolve_token;
pub use client::{sleep_with_jitter, ApiClient, ApiError, NotesApi};
