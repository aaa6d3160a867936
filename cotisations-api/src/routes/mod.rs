/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `collections`: Generic document CRUD over the store collections
/// - `settings`: Key/value settings
/// - `rankings`: Canton, village and quarter leaderboards
/// - `snapshot`: Whole-store export and import
/// - `shell`: Navigation session (routes, view events, view state)

pub mod collections;
pub mod health;
pub mod rankings;
pub mod settings;
pub mod shell;
pub mod snapshot;
