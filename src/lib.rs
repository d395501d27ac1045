//! Turn-guidance classification for road-network preprocessing.
//!
//! Pipeline position:
//! - An upstream intersection generator walks the node-based road graph and
//!   emits, for every incoming edge at every node, the ordered fan of
//!   outgoing roads together with their geometry.
//! - This crate classifies each fan (T intersection, fork, through road with
//!   side turns, generic multi-way) and assigns every outgoing road a turn
//!   instruction: a maneuver kind plus a direction modifier.
//! - A downstream guidance stage renders the instructions to spoken
//!   directions ("turn slight right", "end of road, turn left").
//!
//! Key principle: classification is a pure function over one intersection.
//! The handler only reads the shared edge table and name tables, so
//! independent intersections can be classified from as many threads as
//! desired; [`TurnHandler::classify_batch`] does exactly that.

pub mod angles;
pub mod classify;
pub mod config;
pub mod fork;
pub mod graph;
pub mod instruction;
pub mod intersection;
pub mod names;
pub mod obvious;
pub mod turn_handler;

pub use config::GuidanceConfig;
pub use graph::{EdgeData, EdgeId, MemoryGraph, NodeId, RoadClassification, RoadNetwork};
pub use instruction::{DirectionModifier, TurnInstruction, TurnType};
pub use intersection::{ConnectedRoad, Intersection};
pub use names::{requires_name_announced, NameTable, SuffixTable};
pub use turn_handler::TurnHandler;
