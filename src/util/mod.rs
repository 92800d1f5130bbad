//! Utility modules

mod shutdown;
mod tracing_setup;

pub use shutdown::shutdown_signal;
pub use tracing_setup::init_tracing;
