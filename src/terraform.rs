mod client;
mod error;
mod state;

pub use client::StateClient;
pub use error::StateError;
pub use state::{SUPPORTED_STATE_VERSION, StateInstance, StateResource, TerraformState};
