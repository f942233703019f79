//! Conversion between the linear step list produced by the step generator
//! and the node/edge graph edited in the diagram UI.
//!
//! Both directions are pure functions over their input: all lookup tables
//! (step numbers, used handles, visited nodes) live for a single call.

mod to_flow;
mod to_steps;


pub use to_flow::service_to_flow;
pub use to_steps::{branch_priority, flow_to_service};
