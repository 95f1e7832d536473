//! Parallel task execution and the rendezvous channel used for cross-system
//! hand-off.

#[macro_use]
extern crate log;

mod channel;
mod scheduler;

pub use self::channel::Channel;
pub use self::scheduler::TaskScheduler;
