//! PlayerIO - per-player bridge between a simulated robot and its controller
//!
//! One server instance serves one robot. Each simulation step it applies the
//! actuator commands received from the remote controller and answers with
//! exactly one batch of sensor measurements, while keeping the whole team
//! under a shared bandwidth budget.
//!
//! ## Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`protocol`] | length-prefixed framing and protobuf payloads |
//! | [`net`] | non-blocking listener, handshake and access control |
//! | [`actuation`] | applies decoded actuator requests |
//! | [`sampling`] | period-gated sensor sampling and camera encoding |
//! | [`quota`] | team bandwidth ledger shared across processes |
//! | [`server`] | the per-step state machine tying it together |
//! | [`devices`] | device registry abstraction and a simulated robot |

pub mod actuation;
pub mod batch;
pub mod config;
pub mod devices;
pub mod error;
pub mod net;
pub mod protocol;
pub mod quota;
pub mod sampling;
pub mod server;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Error, Result};
pub use server::PlayerServer;
