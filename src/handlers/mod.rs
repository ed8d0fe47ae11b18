// handlers/mod.rs - HTTP handlers, grouped by resource
//
// Handlers stay thin: extract, call a service with the request's TenantScope,
// wrap the result in ApiResponse. Routing lives in server.rs.

pub mod audio;
pub mod auth;
pub mod catalog;
pub mod library;
pub mod system;
