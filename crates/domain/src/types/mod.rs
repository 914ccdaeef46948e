//! Domain types and models

pub mod lenient;
pub mod message;
pub mod nodes;

pub use message::FlowMessage;
pub use nodes::{
    AutomationParams, FileAction, FileParams, LeaseAction, LeaseParams, TableAction, TableParams,
};
