pub mod admission;
pub mod orchestrator;
pub mod progress;
pub mod request;
pub mod state;
pub mod storage;
pub mod types;
