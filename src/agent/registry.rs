use std::collections::HashMap;

use crate::agent::agent::{Agent, AgentHandle, AgentSpec};
use crate::crew::error::ConfigError;

/// Named agents of a crew, in registration order
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentHandle>,
    by_role: HashMap<String, usize>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: AgentSpec) -> Result<AgentHandle, ConfigError> {
        if self.by_role.contains_key(&spec.role) {
            return Err(ConfigError::DuplicateRole(spec.role));
        }
        let role = spec.role.clone();
        let agent = spec
            .build()
            .map_err(|source| ConfigError::Template { owner: role.clone(), source })?;

        let handle = AgentHandle::new(agent);
        self.by_role.insert(role, self.agents.len());
        self.agents.push(handle.clone());
        Ok(handle)
    }

    pub fn get(&self, role: &str) -> Option<&Agent> {
        self.handle(role).map(|h| &**h)
    }

    pub fn handle(&self, role: &str) -> Option<&AgentHandle> {
        self.by_role.get(role).map(|&idx| &self.agents[idx])
    }

    pub fn contains(&self, role: &str) -> bool {
        self.by_role.contains_key(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentHandle> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents other than `role`, as offered to a delegating agent
    pub fn coworkers_of<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a AgentHandle> + 'a {
        self.agents.iter().filter(move |a| a.name() != role)
    }
}
