mod bootstrap;
mod console;
mod loop_runner;
mod message_board;
mod rooms;
mod view;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
