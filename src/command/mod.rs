mod change;
mod preview;
mod serve;

pub use change::run_change;
pub use preview::run_preview;
pub use serve::run_serve;
