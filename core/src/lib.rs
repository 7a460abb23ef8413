//! Async API client core for the trip journal service.
//!
//! # Overview
//! `JournalClient` authenticates a user, holds the session token, and maps
//! trip, event and media operations onto the service's REST endpoints with
//! JSON bodies. Responses are classified into a small set of `ApiError`
//! kinds; nothing is retried or cached.
//!
//! # Design
//! - Every endpoint has a pure `build_*` method returning an `HttpRequest`,
//!   so request shapes are testable without I/O.
//! - I/O goes through the `Transport` trait. `ReqwestTransport` is the
//!   default; tests plug in a scripted transport.
//! - The session token sits in a watch channel and every write is broadcast;
//!   `subscribe()` hands out an `AuthWatcher` that sees each login, logout,
//!   or 401 in order.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use client::JournalClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::{AuthWatcher, Session};
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::{
    Event, EventCreate, EventId, EventUpdate, Location, Media, MediaCreate, MediaId, Token, Trip,
    TripCreate, TripId, TripUpdate,
};
