//! Interactive shell pieces: line parsing and the command executor driving the session core.

pub mod command;
pub mod shell;

pub use command::{parse_command, Command, HELP};
pub use shell::{Reply, Shell, DEMO_ADMIN, DEMO_CUSTOMER};
