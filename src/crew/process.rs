use serde::{Deserialize, Serialize};
use std::fmt;

/// How a crew orders its tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Process {
    /// Tasks run in declared order; async tasks between barriers run together
    #[default]
    #[serde(alias = "sequential")]
    Flat,
    /// Like `Flat`, plus a manager whose task runs last and may delegate
    Hierarchical,
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Process::Flat => write!(f, "flat"),
            Process::Hierarchical => write!(f, "hierarchical"),
        }
    }
}
