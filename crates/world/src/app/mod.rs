mod controller;
mod input;
mod machine;

pub use controller::{Controller, WorldContext};
pub use input::{InputAction, InputSnapshot};
pub use machine::{TickReport, WorldMachine, WorldMachineFocus};
