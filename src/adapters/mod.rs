// Adapters layer: concrete implementations of the domain ports for the local host.

pub mod session;

pub use session::LocalSession;
