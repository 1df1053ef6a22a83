//! Wire types for the `br` daemon HTTP surface.
//!
//! The daemon binds `localhost:<port>` and speaks JSON on every endpoint
//! except the plain-text ones (`/health`, `/html`, `/screenshot`, `/pdf`).
//! These types are the contract between the CLI front-end and the daemon;
//! both sides depend on this crate so the two can never drift apart.
//!
//! Request bodies live in [`request`], response bodies and session state
//! views (tabs, console, history, joined tree) in [`session`].

mod request;
mod session;

pub use request::*;
pub use session::*;
