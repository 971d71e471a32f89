//! Domain models for the relay.
//!
//! Pure data structures shared by the ingestion and configuration-sync layers.
//! Models carry validation but no I/O:
//!
//! - **models** (this crate): connection state, inbound frames, machine identity, sync outcome
//! - **relay-core**: the ingestion connection manager and the configuration reconciliation loop
//! - **relay**: the binary wiring both together

pub mod connection_state;
pub mod error;
pub mod inbound_frame;
pub mod machine_identity;
pub mod sync_outcome;


pub use common::ErrorLocation;
pub use connection_state::ConnectionState;
pub use error::model_error::ModelError;
pub use inbound_frame::InboundFrame;
pub use machine_identity::MachineIdentity;
pub use machine_identity::builder::MachineIdentityBuilder;
pub use sync_outcome::SyncOutcome;
