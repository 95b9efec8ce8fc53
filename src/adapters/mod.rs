// Adapters layer: concrete implementations for external systems.

pub mod results_store;

pub use results_store::LocalResultStore;
