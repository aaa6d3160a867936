/// Middleware modules for the API server
///
/// - `security`: Security and caching headers on every response

pub mod security;
