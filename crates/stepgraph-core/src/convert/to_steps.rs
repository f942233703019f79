use crate::{
    FlowGraph, Link, Node, NodeCategory, NodeData, SidebarField, Step, StepType, TargetList,
    TransformError,
};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

const NEGATIVE_WORDS: [&str; 6] = ["no", "false", "fail", "error", "reject", "denied"];
const POSITIVE_WORDS: [&str; 6] = ["yes", "true", "success", "pass", "accept", "approved"];

/// Rebuild a numbered step list from a diagram graph.
///
/// The walk starts at the first trigger node. Nodes not reachable from it
/// are left out; edges naming a missing node are ignored, so every emitted
/// `target_id` refers to an emitted step.
pub fn flow_to_service(graph: &FlowGraph) -> Result<Vec<Step>, TransformError> {
    let trigger = graph.trigger().ok_or(TransformError::MissingTrigger)?;

    let trigger_count = graph.nodes.iter().filter(|n| n.is_trigger()).count();
    if trigger_count > 1 {
        warn!(
            "Flow has {} trigger nodes, starting from the first ('{}')",
            trigger_count, trigger.id
        );
    }

    let index = ConnectionIndex::build(graph);
    let order = visit_order(&index, &trigger.id);

    let unreachable = graph.nodes.len().saturating_sub(order.len());
    if unreachable > 0 {
        debug!(
            "{} node(s) not reachable from trigger '{}' were omitted",
            unreachable, trigger.id
        );
    }

    let steps: Vec<Step> = order
        .iter()
        .filter_map(|id| index.node(id))
        .enumerate()
        .map(|(i, node)| to_step(node, index.connections(&node.id), i as i64 + 1))
        .collect();

    info!("Reconstructed {} steps from {} nodes", steps.len(), graph.nodes.len());
    Ok(steps)
}

/// Visiting rank of a branch label: failure-like branches first, then
/// success-like ones, then unlabeled or unrecognised ones.
pub fn branch_priority(label: Option<&str>) -> u8 {
    let Some(label) = label else {
        return 2;
    };
    let label = label.to_lowercase();
    if NEGATIVE_WORDS.iter().any(|w| label.contains(w)) {
        0
    } else if POSITIVE_WORDS.iter().any(|w| label.contains(w)) {
        1
    } else {
        2
    }
}

/// An outgoing edge of a node, kept in edge order.
struct Connection<'a> {
    target: &'a str,
    label: Option<&'a str>,
    label_main: Option<&'a str>,
}

impl Connection<'_> {
    fn to_link(&self) -> Link {
        Link {
            id: self.target.to_string(),
            label: self.label.map(String::from),
            label_main: self.label_main.map(String::from),
        }
    }
}

struct ConnectionIndex<'a> {
    nodes: HashMap<&'a str, &'a Node>,
    outgoing: HashMap<&'a str, Vec<Connection<'a>>>,
}

impl<'a> ConnectionIndex<'a> {
    fn build(graph: &'a FlowGraph) -> Self {
        let mut nodes = HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            nodes.entry(node.id.as_str()).or_insert(node);
        }

        let mut outgoing: HashMap<&str, Vec<Connection>> = HashMap::new();
        for edge in &graph.edges {
            if !nodes.contains_key(edge.source.as_str()) || !nodes.contains_key(edge.target.as_str())
            {
                debug!(
                    "Dropped edge '{}' ({} -> {}): endpoint not found",
                    edge.id, edge.source, edge.target
                );
                continue;
            }
            outgoing
                .entry(edge.source.as_str())
                .or_default()
                .push(Connection {
                    target: edge.target.as_str(),
                    label: edge.label.as_deref(),
                    label_main: edge.label_main(),
                });
        }

        Self { nodes, outgoing }
    }

    fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    fn connections(&self, id: &str) -> &[Connection<'a>] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_terminal(&self, id: &str) -> bool {
        self.connections(id).is_empty()
    }
}

/// Order in which nodes become steps.
///
/// A FIFO queue seeded with the trigger. Each dequeued node's branches are
/// scanned in priority order: terminal targets are emitted right away, next
/// to their parent, and the remaining targets go to the front of the queue so
/// a node's own children are explored before siblings already waiting.
fn visit_order<'a>(index: &ConnectionIndex<'a>, start: &'a str) -> Vec<&'a str> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([start]);

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        order.push(id);

        let mut branches: Vec<&Connection<'a>> = index.connections(id).iter().collect();
        branches.sort_by_key(|c| branch_priority(c.label));

        let mut expand = Vec::new();
        for branch in branches {
            if visited.contains(branch.target) {
                continue;
            }
            if index.is_terminal(branch.target) {
                visited.insert(branch.target);
                order.push(branch.target);
            } else {
                expand.push(branch.target);
            }
        }

        for id in expand.into_iter().rev() {
            queue.push_front(id);
        }
    }

    order
}

fn to_step(node: &Node, connections: &[Connection], step_no: i64) -> Step {
    let step_type = infer_step_type(&node.data);
    let condition = match step_type {
        StepType::If => node
            .data
            .inputs
            .iter()
            .find(|f| f.title == SidebarField::CONDITION)
            .map(|f| f.placeholder.clone())
            .filter(|c| !c.is_empty()),
        _ => None,
    };

    Step {
        id: node.id.clone(),
        step_type,
        step_no: Some(step_no),
        condition,
        title: node.data.title.clone(),
        description: node.data.description.clone(),
        icon: node.data.icon.clone(),
        action: None,
        target_id: TargetList::Links(connections.iter().map(Connection::to_link).collect()),
        ability_type: node.data.category.as_ref().map(NodeCategory::to_string),
    }
}

fn infer_step_type(data: &NodeData) -> StepType {
    match &data.category {
        Some(NodeCategory::Trigger) => StepType::Trigger,
        Some(NodeCategory::Logic) if !data.inputs.is_empty() => StepType::If,
        Some(NodeCategory::Logic) => StepType::Default,
        Some(NodeCategory::Action) => StepType::Ability,
        Some(NodeCategory::Agent) => StepType::Agent,
        _ => StepType::Ability,
    }
}
