//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `project` | `Init`           |
//! | `run`     | `Run`            |
//! | `status`  | `Status`         |
//! | `config`  | `Config`         |

pub mod config;
pub mod project;
pub mod run;
pub mod status;

pub use config::cmd_config;
pub use project::cmd_init;
pub use run::{RunArgs, cmd_run};
pub use status::cmd_status;
