//! Controller daemon: component wiring, event loops and operator commands.

mod command;
mod controller;

pub use command::{CommandReply, CommandRequest, OperatorCommand, RouteSummary};
pub use controller::{ControllerConfig, ControllerHandle, SdnIpController};
