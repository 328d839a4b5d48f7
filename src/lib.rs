//! Client-side orchestration for a refresh-rate overclocking module.
//!
//! All privileged work happens in an external executor reached through
//! [`bridge::CommandBridge`]; this crate builds commands and interprets
//! their text replies.
pub mod apps;
pub mod bridge;
pub mod catalog;
pub mod cli;
pub mod device;
pub mod labels;
pub mod outcome;
pub mod output;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod store;
pub mod workbench;

#[cfg(test)]
pub(crate) mod testing;

pub use outcome::Outcome;
pub use session::Session;
pub use settings::Settings;
