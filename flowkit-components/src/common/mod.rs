//! General-purpose components.

pub mod asynchronous;
pub mod debug;
pub mod delay;
pub mod mixer;
pub mod modify;
pub mod router;
pub mod scheduler;
pub mod signal;
pub mod ticker;

pub use asynchronous::Async;
pub use debug::Debug;
pub use delay::Delay;
pub use mixer::Mixer;
pub use modify::Modify;
pub use router::Router;
pub use scheduler::Scheduler;
pub use signal::Signal;
pub use ticker::Ticker;
