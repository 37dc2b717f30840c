//! Tabular reinforcement learning: the shared Q-table, the seven decision
//! agents, the exploration scheduler, and the reward tables.

pub mod agents;
pub mod explore;
pub mod reward;
pub mod table;

pub use agents::{
    BodyObjAgent, DataSource, DataSourceAgent, DecisionAgent, DependencyAction, DependencyAgent,
    HeaderAgent, OperationAgent, ParameterAction, ParameterAgent, ProducerRef, ValueAction,
    ValueAgent,
};
pub use explore::{ExplorationScheduler, ExploreTarget, ZeroCounts};
pub use table::QTable;
