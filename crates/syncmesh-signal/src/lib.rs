//! Rendezvous (signalling) server for syncmesh.
//!
//! Endpoints register the address they can be reached at, keep their entry
//! alive with heartbeats, and discover each other to dial directly:
//!
//! ```text
//!   endpoint A ──register/heartbeat──►┌──────────────┐◄──register/discover── endpoint B
//!                                     │   Registry   │
//!                                     │  (TTL map)   │
//!                                     └──────────────┘
//!   endpoint A ◄══════════════ direct TCP greeting ═══════════════ endpoint B
//! ```

pub mod api;
mod clock;
pub mod error;
pub mod registry;
pub mod server;

pub use api::build_router;
pub use error::{ApiError, ApiResult};
pub use registry::{ClientRecord, Registry, DEFAULT_CLIENT_TTL};
pub use server::{run_signal_server, SignalServer};
