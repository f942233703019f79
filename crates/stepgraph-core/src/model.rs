use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use tracing::debug;

// =============================================================================
// Step list (LLM-facing shape)
// =============================================================================

/// The kind of a step as emitted by the step generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Trigger,
    Ability,
    If,
    Loop,
    Agent,
    Default,
    /// Catch-all for step types the generator invented.
    #[serde(other)]
    Unknown,
}

/// One entry of the linear workflow representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    /// Missing, `null` or non-string types read as `Unknown`.
    #[serde(
        rename = "type",
        default = "unknown_step_type",
        deserialize_with = "lenient_step_type"
    )]
    pub step_type: StepType,
    /// Ordinal hint. Only compared when both sides of a link carry one.
    #[serde(default, deserialize_with = "lenient_step_no")]
    pub step_no: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default)]
    pub target_id: TargetList,
    #[serde(
        default,
        rename = "abilityType",
        skip_serializing_if = "Option::is_none"
    )]
    pub ability_type: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, step_type: StepType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_type,
            step_no: None,
            condition: None,
            title: title.into(),
            description: String::new(),
            icon: None,
            action: None,
            target_id: TargetList::default(),
            ability_type: None,
        }
    }
}

fn unknown_step_type() -> StepType {
    StepType::Unknown
}

fn lenient_step_type<'de, D>(deserializer: D) -> Result<StepType, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        raw @ Value::String(_) => serde_json::from_value(raw).unwrap_or(StepType::Unknown),
        _ => StepType::Unknown,
    })
}

/// Accepts integers, integral floats and numeric strings. Anything else is
/// treated as "no step number".
fn lenient_step_no<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// A labeled reference from one step to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(
        default,
        rename = "labelMain",
        skip_serializing_if = "Option::is_none"
    )]
    pub label_main: Option<String>,
}

impl Link {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            label_main: None,
        }
    }

    pub fn labeled(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(id)
        }
    }
}

/// The `target_id` field of a step.
///
/// Generated step lists sometimes carry flat id arrays or objects without an
/// `id`. Those are kept verbatim as `Malformed` so the converter can reject
/// the step's links as a whole instead of failing deserialization.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetList {
    Links(Vec<Link>),
    Malformed(Value),
}

impl Default for TargetList {
    fn default() -> Self {
        TargetList::Links(Vec::new())
    }
}

impl TargetList {
    /// Classify a raw `target_id` value. `null` is an empty list; an array is
    /// well-formed only if every entry is an object with a non-empty string `id`.
    pub fn from_value(raw: Value) -> Self {
        let entries = match &raw {
            Value::Null => return TargetList::default(),
            Value::Array(entries) => entries,
            _ => return TargetList::Malformed(raw),
        };

        let mut links = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(id) = entry
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
            else {
                return TargetList::Malformed(raw);
            };
            links.push(Link {
                id: id.to_string(),
                label: link_text(entry, "label", id),
                label_main: link_text(entry, "labelMain", id),
            });
        }
        TargetList::Links(links)
    }

    /// Well-formed links, or `None` when the list was malformed.
    pub fn links(&self) -> Option<&[Link]> {
        match self {
            TargetList::Links(links) => Some(links),
            TargetList::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, TargetList::Malformed(_))
    }
}

/// Scalar labels are kept as text; objects and arrays are dropped.
fn link_text(entry: &Value, key: &str, id: &str) -> Option<String> {
    match entry.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => {
            debug!("Dropped non-text {} on link to '{}': {}", key, id, other);
            None
        }
    }
}

impl Serialize for TargetList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TargetList::Links(links) => links.serialize(serializer),
            TargetList::Malformed(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TargetList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(TargetList::from_value)
    }
}

// =============================================================================
// Flow graph (diagram-facing shape)
// =============================================================================

/// Rendering category of a node.
///
/// Categories supplied by an ability catalog that fall outside the known set
/// are kept as `Custom` and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeCategory {
    Trigger,
    Logic,
    Action,
    Agent,
    Custom(String),
}

impl NodeCategory {
    pub fn as_str(&self) -> &str {
        match self {
            NodeCategory::Trigger => "trigger",
            NodeCategory::Logic => "logic",
            NodeCategory::Action => "action",
            NodeCategory::Agent => "agent",
            NodeCategory::Custom(name) => name,
        }
    }
}

impl From<&str> for NodeCategory {
    fn from(name: &str) -> Self {
        match name {
            "trigger" => NodeCategory::Trigger,
            "logic" => NodeCategory::Logic,
            "action" => NodeCategory::Action,
            "agent" => NodeCategory::Agent,
            other => NodeCategory::Custom(other.to_string()),
        }
    }
}

impl From<String> for NodeCategory {
    fn from(name: String) -> Self {
        match name.as_str() {
            "trigger" | "logic" | "action" | "agent" => NodeCategory::from(name.as_str()),
            _ => NodeCategory::Custom(name),
        }
    }
}

impl From<NodeCategory> for String {
    fn from(category: NodeCategory) -> Self {
        match category {
            NodeCategory::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A read-only field shown in the node's sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarField {
    pub title: String,
    #[serde(rename = "type", default = "default_field_kind")]
    pub kind: String,
    #[serde(default)]
    pub placeholder: String,
}

fn default_field_kind() -> String {
    "div".to_string()
}

impl SidebarField {
    pub const ACTION: &'static str = "Action";
    pub const CONDITION: &'static str = "Condition";

    pub fn action(text: impl Into<String>) -> Self {
        Self::div(Self::ACTION, text)
    }

    pub fn condition(text: impl Into<String>) -> Self {
        Self::div(Self::CONDITION, text)
    }

    fn div(title: &str, text: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            kind: default_field_kind(),
            placeholder: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub inputs: Vec<SidebarField>,
    #[serde(default, rename = "isIsland")]
    pub is_island: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<NodeCategory>,
    #[serde(
        default,
        rename = "abilityType",
        skip_serializing_if = "Option::is_none"
    )]
    pub ability_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
    #[serde(rename = "type", default = "default_node_kind")]
    pub kind: String,
}

fn default_node_kind() -> String {
    "custom".to_string()
}

impl Node {
    /// A node at the origin; layout is left to the diagram editor.
    pub fn new(id: impl Into<String>, data: NodeData) -> Self {
        Self {
            id: id.into(),
            position: Position::default(),
            data,
            kind: default_node_kind(),
        }
    }

    pub fn is_trigger(&self) -> bool {
        self.data.category == Some(NodeCategory::Trigger)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    #[serde(default, rename = "sourceHandle")]
    pub source_handle: String,
    pub target: String,
    #[serde(default, rename = "targetHandle")]
    pub target_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EdgeData>,
}

impl Edge {
    /// The secondary label carried in `data.label`.
    pub fn label_main(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.label.as_deref())
    }
}

/// Side of a node an edge attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleSide {
    Top,
    Bottom,
    Left,
    Right,
}

impl HandleSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleSide::Top => "top",
            HandleSide::Bottom => "bottom",
            HandleSide::Left => "left",
            HandleSide::Right => "right",
        }
    }

    /// Handle identifier in the `<nodeId>-<side>` form the editor expects.
    pub fn handle_id(&self, node_id: &str) -> String {
        format!("{}-{}", node_id, self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl FlowGraph {
    /// The first trigger node in node order.
    pub fn trigger(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_trigger())
    }
}
