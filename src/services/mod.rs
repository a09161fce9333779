pub mod pricing;
pub mod reaper;
pub mod snapshot;
pub mod state_machine;
