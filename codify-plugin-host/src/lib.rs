//! The plugin process: a registry of resource controllers exposed over a
//! line-delimited JSON protocol on stdio (spec sections 4.6 and 6).

mod plugin;
mod stdio;

pub use plugin::Plugin;
pub use stdio::run;
