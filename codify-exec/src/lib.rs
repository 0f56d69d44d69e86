//! Background interactive subprocess bound to a plan, serialized by a
//! per-plan command queue (spec section 4.5), plus the scoped binding
//! that lets resource callbacks discover the channel for their plan.

mod channel;
mod current;

pub use channel::{CommandOutput, ExecutionChannel};
pub use current::{current_channel, try_current_channel, with_channel};
