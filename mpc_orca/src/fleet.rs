//! A set of agents, some of them driven by controllers, advanced together.
//!
//! Agents live in an arena keyed by [`AgentId`]. Each controller stores the ids of the agents
//! it avoids and reads their states from a snapshot taken at the start of every cycle, so all
//! controllers in one cycle see the same world.

use std::collections::BTreeMap;

use log::debug;
use prelude::*;
use thiserror::Error;

use crate::solver::SolverSettings;
use crate::{
    Agent, Command, ControllerError, HalfPlaneOracle, HorizonConfig, MpcOrca, Orca, StateVector,
    StepError,
};

pub type AgentId = usize;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("agent {0} already exists")]
    DuplicateAgent(AgentId),
    #[error("no agent with id {0}")]
    UnknownAgent(AgentId),
    #[error("agent {0} cannot avoid itself")]
    SelfCollider(AgentId),
    #[error("controller for agent {id}: {source}")]
    Controller {
        id: AgentId,
        #[source]
        source: ControllerError,
    },
    #[error("step for agent {id}: {source}")]
    Step {
        id: AgentId,
        #[source]
        source: StepError,
    },
}

struct Member<O> {
    controller: MpcOrca<O>,
    colliders: Vec<AgentId>,
}

pub struct Fleet<O = Orca> {
    agents: BTreeMap<AgentId, Agent>,
    members: BTreeMap<AgentId, Member<O>>,
}

impl<O> Default for Fleet<O> {
    fn default() -> Self {
        Fleet {
            agents: BTreeMap::new(),
            members: BTreeMap::new(),
        }
    }
}

impl<O: HalfPlaneOracle> Fleet<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_agent(&mut self, id: AgentId, agent: Agent) -> Result<(), FleetError> {
        if self.agents.contains_key(&id) {
            return Err(FleetError::DuplicateAgent(id));
        }
        self.agents.insert(id, agent);
        Ok(())
    }

    /// Removes an agent together with its controller. Controllers that avoid it fail their
    /// next step with [`FleetError::UnknownAgent`].
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        self.members.remove(&id);
        self.agents.remove(&id)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter().map(|(&id, agent)| (id, agent))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Refreshes the position and velocity of an agent. The radius is fixed at insertion.
    pub fn update_state(&mut self, id: AgentId, state: StateVector) -> Result<(), FleetError> {
        let agent = self
            .agents
            .get_mut(&id)
            .ok_or(FleetError::UnknownAgent(id))?;
        agent.position = state.position;
        agent.velocity = state.velocity;
        Ok(())
    }

    /// Attaches a controller to `id` that avoids `colliders`, replacing any previous one.
    pub fn attach_controller(
        &mut self,
        id: AgentId,
        colliders: Vec<AgentId>,
        config: HorizonConfig,
        settings: &SolverSettings,
        oracle: O,
    ) -> Result<(), FleetError> {
        let agent = *self.agents.get(&id).ok_or(FleetError::UnknownAgent(id))?;
        for &collider in &colliders {
            if collider == id {
                return Err(FleetError::SelfCollider(id));
            }
            if !self.agents.contains_key(&collider) {
                return Err(FleetError::UnknownAgent(collider));
            }
        }

        let controller = MpcOrca::new(
            agent.position,
            agent.radius,
            colliders.len(),
            config,
            settings,
            oracle,
        )
        .map_err(|source| FleetError::Controller { id, source })?;
        self.members.insert(
            id,
            Member {
                controller,
                colliders,
            },
        );
        Ok(())
    }

    pub fn controller(&self, id: AgentId) -> Option<&MpcOrca<O>> {
        self.members.get(&id).map(|m| &m.controller)
    }

    /// Ids of the agents the controller of `id` avoids.
    pub fn colliders_of(&self, id: AgentId) -> Option<&[AgentId]> {
        self.members.get(&id).map(|m| &m.colliders[..])
    }

    /// Runs every controller once against the current agent states. `trajectory` supplies
    /// the desired states for each controlled agent.
    ///
    /// Agent states are not advanced; apply the returned commands and call
    /// [`Fleet::update_state`].
    pub fn step<F>(&mut self, mut trajectory: F) -> Result<BTreeMap<AgentId, Command>, FleetError>
    where
        F: FnMut(AgentId, &Agent) -> Vec<StateVector>,
    {
        let _guard = flame::start_guard("fleet step");

        let snapshot = self.agents.clone();
        let lookup = |id: &AgentId| snapshot.get(id).copied().ok_or(FleetError::UnknownAgent(*id));

        let mut commands = BTreeMap::new();
        for (&id, member) in &mut self.members {
            let agent = lookup(&id)?;
            let colliders = member
                .colliders
                .iter()
                .map(&lookup)
                .collect::<Result<Vec<_>, _>>()?;
            let desired = trajectory(id, &agent);
            let command = member
                .controller
                .step(&StateVector::from(&agent), &colliders, &desired)
                .map_err(|source| FleetError::Step { id, source })?;
            debug!("fleet: agent {} {:?}", id, command.status);
            commands.insert(id, command);
        }
        Ok(commands)
    }
}

impl<O: HalfPlaneOracle + Clone> Fleet<O> {
    /// Gives every agent a controller that avoids all other agents.
    pub fn attach_controllers_avoiding_all(
        &mut self,
        config: &HorizonConfig,
        settings: &SolverSettings,
        oracle: O,
    ) -> Result<(), FleetError> {
        let ids: Vec<AgentId> = self.agents.keys().copied().collect();
        for &id in &ids {
            let colliders = ids.iter().copied().filter(|&other| other != id).collect();
            self.attach_controller(id, colliders, config.clone(), settings, oracle.clone())?;
        }
        Ok(())
    }
}
