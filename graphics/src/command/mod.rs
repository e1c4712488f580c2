//! Command recording and submission.
//!
//! Producer threads record into their own [`CmdList`]; committing a list
//! splices its commands into the device's [`CommandQueue`], which the driver
//! thread drains against the [`Context`](crate::Context).

mod list;
mod queue;

pub use list::CmdList;
pub use queue::{Command, CommandQueue};
