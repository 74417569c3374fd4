//! Process lifecycle: graceful shutdown handling

mod shutdown;

pub use shutdown::ShutdownSignal;
