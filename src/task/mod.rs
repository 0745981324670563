pub mod output;
pub mod status;
pub mod task;
pub mod template;

pub use output::*;
pub use status::*;
pub use task::{Task, TaskSpec};
pub use template::*;
