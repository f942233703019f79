use crate::{FlowGraph, Step, StepType};
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Flow has no nodes")]
    NoNodes,

    #[error("Step list is empty")]
    NoSteps,

    #[error("Id '{0}' is used more than once")]
    DuplicateId(String),

    #[error("No trigger found")]
    NoTrigger,
}

pub fn validate_flow(graph: &FlowGraph) -> Result<(), ValidationError> {
    if graph.nodes.is_empty() {
        return Err(ValidationError::NoNodes);
    }

    first_duplicate(graph.nodes.iter().map(|n| n.id.as_str()))?;

    let triggers = graph.nodes.iter().filter(|n| n.is_trigger()).count();
    match triggers {
        0 => return Err(ValidationError::NoTrigger),
        1 => {}
        n => warn!("Flow has {} trigger nodes, only the first is used", n),
    }

    Ok(())
}

pub fn validate_steps(steps: &[Step]) -> Result<(), ValidationError> {
    if steps.is_empty() {
        return Err(ValidationError::NoSteps);
    }

    first_duplicate(steps.iter().map(|s| s.id.as_str()))?;

    if !steps.iter().any(|s| s.step_type == StepType::Trigger) {
        return Err(ValidationError::NoTrigger);
    }

    Ok(())
}

fn first_duplicate<'a>(ids: impl Iterator<Item = &'a str>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId(id.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Node, NodeCategory, NodeData};

    fn node(id: &str, category: NodeCategory) -> Node {
        Node::new(
            id,
            NodeData {
                category: Some(category),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_empty_flow_fails() {
        assert_eq!(
            validate_flow(&FlowGraph::default()),
            Err(ValidationError::NoNodes)
        );
    }

    #[test]
    fn test_flow_without_trigger_fails() {
        let graph = FlowGraph {
            nodes: vec![node("a", NodeCategory::Logic)],
            edges: vec![],
        };
        assert_eq!(validate_flow(&graph), Err(ValidationError::NoTrigger));
    }

    #[test]
    fn test_duplicate_node_id_fails() {
        let graph = FlowGraph {
            nodes: vec![
                node("t", NodeCategory::Trigger),
                node("a", NodeCategory::Action),
                node("a", NodeCategory::Logic),
            ],
            edges: vec![],
        };
        assert_eq!(
            validate_flow(&graph),
            Err(ValidationError::DuplicateId("a".to_string()))
        );
    }

    #[test]
    fn test_two_triggers_are_accepted() {
        let graph = FlowGraph {
            nodes: vec![
                node("t1", NodeCategory::Trigger),
                node("t2", NodeCategory::Trigger),
            ],
            edges: vec![],
        };
        assert!(validate_flow(&graph).is_ok());
    }

    #[test]
    fn test_validate_steps() {
        assert_eq!(validate_steps(&[]), Err(ValidationError::NoSteps));

        let steps = vec![
            Step::new("t", StepType::Trigger, "Webhook"),
            Step::new("s1", StepType::Ability, "Send Email"),
        ];
        assert!(validate_steps(&steps).is_ok());

        let no_trigger = vec![Step::new("s1", StepType::Ability, "Send Email")];
        assert_eq!(validate_steps(&no_trigger), Err(ValidationError::NoTrigger));

        let dup = vec![
            Step::new("t", StepType::Trigger, "Webhook"),
            Step::new("t", StepType::If, "Check"),
        ];
        assert_eq!(
            validate_steps(&dup),
            Err(ValidationError::DuplicateId("t".to_string()))
        );
    }
}
