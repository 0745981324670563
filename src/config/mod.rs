pub mod crew_file;
pub mod settings;

pub use crew_file::{AgentDefinition, CrewDefinition, TaskDefinition, REAL_ESTATE_CREW};
pub use settings::{RunSettings, Settings, SettingsError, ToolSettings};
