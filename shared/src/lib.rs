pub mod cancel;
pub mod chain;
pub mod errors;
pub mod interaction;
pub mod log;
pub mod orchestrator;
pub mod pool;
pub mod problem;
pub mod slot;
pub mod solver;
pub mod types;
