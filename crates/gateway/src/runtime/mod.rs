pub mod dispatch;
pub mod orchestrator;

pub use dispatch::{supervise, Dispatcher};
pub use orchestrator::{Orchestrator, Outcome};
