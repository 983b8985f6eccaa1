//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and persistence so route handlers can
//! stay focused on request parsing, auth plumbing and status codes. Reads
//! that only shape rows into JSON go through the query catalog instead.

pub mod access;
pub mod auth;
pub mod booking;
pub mod dogs;
pub mod events;
pub mod mail;
pub mod members;
pub mod password;
pub mod programs;
pub mod refresh;
pub mod report;
pub mod storage;
pub mod timefmt;
pub mod token;
