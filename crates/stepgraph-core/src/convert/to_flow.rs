use crate::{
    AbilityCatalog, Edge, EdgeData, FlowGraph, HandleSide, Link, Node, NodeCategory, NodeData,
    SidebarField, Step, StepType, TargetList,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

const DEFAULT_ICON: &str = "zap";

/// Convert a generated step list into a diagram graph.
///
/// Every step becomes exactly one node, in input order. Links become edges
/// once all steps are known; links whose step has a malformed `target_id`,
/// or whose target is not one of the steps, are dropped.
pub fn service_to_flow(steps: &[Step], catalog: Option<&AbilityCatalog>) -> FlowGraph {
    let mut builder = FlowBuilder::new(catalog);
    for step in steps {
        builder.push_step(step);
    }
    builder.finish()
}

/// A link recorded while walking the steps.
struct PendingLink<'a> {
    source: &'a str,
    link: &'a Link,
}

struct FlowBuilder<'a> {
    catalog: Option<&'a AbilityCatalog>,
    nodes: Vec<Node>,
    links: Vec<PendingLink<'a>>,
    // Presence marks a known step id; the value is its ordinal hint.
    step_numbers: HashMap<&'a str, Option<i64>>,
}

impl<'a> FlowBuilder<'a> {
    fn new(catalog: Option<&'a AbilityCatalog>) -> Self {
        Self {
            catalog,
            nodes: Vec::new(),
            links: Vec::new(),
            step_numbers: HashMap::new(),
        }
    }

    fn push_step(&mut self, step: &'a Step) {
        self.step_numbers.insert(step.id.as_str(), step.step_no);

        match &step.target_id {
            TargetList::Links(links) => {
                self.links.extend(links.iter().map(|link| PendingLink {
                    source: step.id.as_str(),
                    link,
                }));
            }
            TargetList::Malformed(raw) => {
                warn!(
                    "Invalid target_id format for {}: {} (expected [{{\"id\": ..., \"label\"?: ...}}])",
                    step.id, raw
                );
            }
        }

        let data = NodeData {
            title: step.title.clone(),
            description: step.description.clone(),
            icon: Some(non_empty(&step.icon).unwrap_or(DEFAULT_ICON).to_string()),
            inputs: sidebar_fields(step),
            is_island: false,
            category: Some(node_category(step, self.catalog)),
            ability_type: step.ability_type.clone(),
        };
        self.nodes.push(Node::new(step.id.clone(), data));
    }

    fn finish(self) -> FlowGraph {
        let mut handles = HandleAllocator::default();
        let mut edges = Vec::with_capacity(self.links.len());

        for pending in &self.links {
            let source = pending.source;
            let target = pending.link.id.as_str();
            if source.is_empty() || target.is_empty() {
                continue;
            }
            let Some(&target_no) = self.step_numbers.get(target) else {
                debug!("Dropped link {} -> {}: target step not found", source, target);
                continue;
            };
            let source_no = self.step_numbers.get(source).copied().flatten();

            // A link to an earlier step (e.g. closing a loop) leaves from the side.
            let backward = matches!((source_no, target_no), (Some(s), Some(t)) if s > t);
            let (source_side, target_side) = handles.assign(source, target, backward);

            edges.push(Edge {
                id: format!("e{}", edges.len() + 1),
                source: source.to_string(),
                source_handle: source_side.handle_id(source),
                target: target.to_string(),
                target_handle: target_side.handle_id(target),
                label: pending.link.label.clone(),
                data: Some(EdgeData {
                    label: pending.link.label_main.clone(),
                }),
            });
        }

        info!(
            "Built flow with {} nodes and {} edges ({} links recorded)",
            self.nodes.len(),
            edges.len(),
            self.links.len()
        );
        FlowGraph {
            nodes: self.nodes,
            edges,
        }
    }
}

/// Tracks which sides of each node already carry an edge.
#[derive(Default)]
struct HandleAllocator<'a> {
    used: HashMap<&'a str, HashSet<HandleSide>>,
}

impl<'a> HandleAllocator<'a> {
    /// Forward links go bottom → top. Backward links alternate between the
    /// right and left side of their source so parallel back-edges don't overlap.
    fn assign(&mut self, source: &'a str, target: &'a str, backward: bool) -> (HandleSide, HandleSide) {
        let source_side = if !backward {
            HandleSide::Bottom
        } else if self.is_used(source, HandleSide::Right) {
            HandleSide::Left
        } else {
            HandleSide::Right
        };
        let target_side = HandleSide::Top;

        self.used.entry(source).or_default().insert(source_side);
        self.used.entry(target).or_default().insert(target_side);
        (source_side, target_side)
    }

    fn is_used(&self, node: &str, side: HandleSide) -> bool {
        self.used.get(node).is_some_and(|sides| sides.contains(&side))
    }
}

/// Precedence: trigger, then catalog lookup for abilities, then agent.
fn node_category(step: &Step, catalog: Option<&AbilityCatalog>) -> NodeCategory {
    match (step.step_type, catalog) {
        (StepType::Trigger, _) => NodeCategory::Trigger,
        (StepType::Ability, Some(catalog)) => catalog
            .category_for(&step.title)
            .cloned()
            .unwrap_or(NodeCategory::Logic),
        (StepType::Agent, _) => NodeCategory::Agent,
        _ => NodeCategory::Logic,
    }
}

/// At most one field: the action if present, otherwise the condition.
fn sidebar_fields(step: &Step) -> Vec<SidebarField> {
    if let Some(action) = non_empty(&step.action) {
        vec![SidebarField::action(action)]
    } else if let Some(condition) = non_empty(&step.condition) {
        vec![SidebarField::condition(condition)]
    } else {
        Vec::new()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_allocator_alternates_backward_sides() {
        let mut handles = HandleAllocator::default();
        assert_eq!(
            handles.assign("loop", "a", true),
            (HandleSide::Right, HandleSide::Top)
        );
        assert_eq!(
            handles.assign("loop", "b", true),
            (HandleSide::Left, HandleSide::Top)
        );
        assert_eq!(handles.assign("loop", "c", true).0, HandleSide::Left);
    }

    #[test]
    fn test_target_handles_do_not_leak_into_source_sides() {
        let mut handles = HandleAllocator::default();
        handles.assign("x", "y", true);
        // "y" only received a top handle, so its own back-edge starts on the right.
        assert_eq!(handles.assign("y", "x", true).0, HandleSide::Right);
    }

    #[test]
    fn test_node_category_precedence() {
        let catalog: AbilityCatalog = vec![
            ("Send Email".to_string(), "action".to_string()),
            ("Webhook".to_string(), "action".to_string()),
        ]
        .into_iter()
        .collect();

        let trigger = Step::new("t", StepType::Trigger, "Webhook");
        assert_eq!(node_category(&trigger, Some(&catalog)), NodeCategory::Trigger);

        let known = Step::new("s", StepType::Ability, "Send Email");
        assert_eq!(node_category(&known, Some(&catalog)), NodeCategory::Action);
        assert_eq!(node_category(&known, None), NodeCategory::Logic);

        let unknown = Step::new("s", StepType::Ability, "Unlisted");
        assert_eq!(node_category(&unknown, Some(&catalog)), NodeCategory::Logic);

        let agent = Step::new("a", StepType::Agent, "Researcher");
        assert_eq!(node_category(&agent, Some(&catalog)), NodeCategory::Agent);

        for step_type in [StepType::If, StepType::Loop, StepType::Default, StepType::Unknown] {
            let step = Step::new("x", step_type, "Send Email");
            assert_eq!(node_category(&step, Some(&catalog)), NodeCategory::Logic);
        }
    }

    #[test]
    fn test_sidebar_prefers_action_over_condition() {
        let mut step = Step::new("c", StepType::If, "Check");
        step.condition = Some("amount > 100".to_string());
        assert_eq!(sidebar_fields(&step), vec![SidebarField::condition("amount > 100")]);

        step.action = Some("Escalate".to_string());
        assert_eq!(sidebar_fields(&step), vec![SidebarField::action("Escalate")]);

        step.action = Some(String::new());
        step.condition = None;
        assert!(sidebar_fields(&step).is_empty());
    }
}
