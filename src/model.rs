//! Normalized run graph.
//!
//! Task and dependency records are flat; subflow membership is encoded in the
//! task ids (`hpl_flow.build_image`). [`GraphBuilder`] turns a [`RunRecord`]
//! into a [`FlowGraph`]: an arena of [`TaskNode`]s where every node knows its
//! parent scope and every group knows its direct children. Dependency
//! endpoints that were never declared as tasks are synthesized as scheduled
//! leaves so that every edge resolves.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{DEFAULT_GROUP_PATTERN, LayoutConfig};
use crate::error::{ConfigError, EndpointSide, ValidationError};
use crate::ir::{RunRecord, SCHEDULED_STATE, TaskKind, TaskRecord};

static DEFAULT_GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_GROUP_PATTERN).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Leaf,
    Group,
}

#[derive(Debug, Clone)]
pub struct TaskNode {
    /// Full task id, unique across the run.
    pub key: String,
    /// Id within the enclosing scope.
    pub id: String,
    pub kind: NodeKind,
    pub state: String,
    pub synthetic: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub predecessors: Vec<NodeId>,
    pub payload: Option<TaskRecord>,
    /// Grouping rule that created this container, if any.
    pub rule: Option<usize>,
}

impl TaskNode {
    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone)]
pub struct FlowGraph {
    pub id: String,
    pub name: String,
    nodes: Vec<TaskNode>,
    roots: Vec<NodeId>,
    index: HashMap<String, NodeId>,
    /// Local ids taken in each scope.
    locals: HashSet<(Option<NodeId>, String)>,
    edges: Vec<DependencyEdge>,
    dependents: Vec<NodeId>,
}

impl FlowGraph {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            nodes: Vec::new(),
            roots: Vec::new(),
            index: HashMap::new(),
            locals: HashSet::new(),
            edges: Vec::new(),
            dependents: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TaskNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx), node))
    }

    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Members of a scope: the root scope for `None`, a group's children otherwise.
    pub fn scope(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => &self.nodes[id.0].children,
            None => &self.roots,
        }
    }

    /// Deduplicated dependencies in first-seen order.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Nodes with at least one predecessor, in the order they first gained one.
    pub fn dependency_order(&self) -> &[NodeId] {
        &self.dependents
    }

    /// The node itself or the ancestor of it that sits directly in `scope`.
    pub fn member_of_scope(&self, scope: Option<NodeId>, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        loop {
            let parent = self.nodes[current.0].parent;
            if parent == scope {
                return Some(current);
            }
            current = parent?;
        }
    }

    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[node.0].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent.0].parent;
        }
        depth
    }

    /// Pre-order walk of the whole hierarchy in insertion order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    /// Groups ordered so that every group comes after all groups nested in it.
    pub fn groups_bottom_up(&self) -> Vec<NodeId> {
        let mut groups: Vec<NodeId> = self
            .preorder()
            .into_iter()
            .filter(|id| self.nodes[id.0].is_group())
            .collect();
        groups.reverse();
        groups
    }
}

/// Ordered list of id-prefix patterns. Each pattern must define the named
/// captures `group` (the owning subflow) and `rest` (the id inside it). When
/// several patterns match, the one declared first wins.
#[derive(Debug, Clone)]
pub struct GroupRules {
    rules: Vec<Regex>,
}

impl Default for GroupRules {
    fn default() -> Self {
        Self {
            rules: vec![DEFAULT_GROUP_RE.clone()],
        }
    }
}

impl GroupRules {
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn from_patterns(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let regex = Regex::new(pattern).map_err(|err| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            })?;
            let names: HashSet<&str> = regex.capture_names().flatten().collect();
            if !names.contains("group") || !names.contains("rest") {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: "pattern needs named captures `group` and `rest`".to_string(),
                });
            }
            rules.push(regex);
        }
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Splits a scope-local id into (rule index, group id, remainder).
    pub fn split<'a>(&self, local: &'a str) -> Option<(usize, &'a str, &'a str)> {
        for (idx, rule) in self.rules.iter().enumerate() {
            let Some(caps) = rule.captures(local) else {
                continue;
            };
            let (Some(group), Some(rest)) = (caps.name("group"), caps.name("rest")) else {
                continue;
            };
            // A remainder as long as the input would never terminate.
            if group.as_str().is_empty() || rest.as_str().is_empty() || rest.len() >= local.len() {
                continue;
            }
            return Some((idx, group.as_str(), rest.as_str()));
        }
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    rules: GroupRules,
}

impl GraphBuilder {
    pub fn new(rules: GroupRules) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &LayoutConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(GroupRules::from_patterns(&config.group_patterns)?))
    }

    pub fn build(&self, run: &RunRecord) -> Result<FlowGraph, ValidationError> {
        validate(run)?;

        let mut graph = FlowGraph::new(&run.id, &run.name);
        for record in &run.tasks {
            let key = record.id.trim();
            let id = self.intern(&mut graph, key);
            let node = &mut graph.nodes[id.0];
            if node.payload.is_some() {
                warn!(task = key, "duplicate task record ignored");
                continue;
            }
            node.payload = Some(record.clone());
            node.state = record.state.clone();
            node.synthetic = false;
            if record.kind == TaskKind::Flow {
                node.kind = NodeKind::Group;
            }
        }

        let mut seen: HashSet<DependencyEdge> = HashSet::new();
        for dep in &run.dependencies {
            let source = self.intern(&mut graph, dep.source.trim());
            let target = self.intern(&mut graph, dep.target.trim());
            let edge = DependencyEdge { source, target };
            if !seen.insert(edge) {
                continue;
            }
            graph.edges.push(edge);
            if source == target {
                continue;
            }
            let node = &mut graph.nodes[target.0];
            if node.predecessors.is_empty() {
                graph.dependents.push(target);
            }
            node.predecessors.push(source);
        }

        debug!(
            run = %graph.id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "built flow graph"
        );
        Ok(graph)
    }

    fn intern(&self, graph: &mut FlowGraph, key: &str) -> NodeId {
        if let Some(id) = graph.index.get(key) {
            return *id;
        }
        let mut parent: Option<NodeId> = None;
        let mut prefix = String::new();
        let mut local = key;
        while let Some((rule, group, rest)) = self.rules.split(local) {
            let group_key = format!("{prefix}{group}");
            let group_id = ensure_group(graph, parent, &group_key, group, rule);
            parent = Some(group_id);
            prefix = format!("{group_key}.");
            local = rest;
        }
        debug!(task = key, scope = ?parent, "interned task node");
        insert_node(graph, parent, key, local, NodeKind::Leaf, None)
    }
}

fn validate(run: &RunRecord) -> Result<(), ValidationError> {
    for (index, task) in run.tasks.iter().enumerate() {
        if task.id.trim().is_empty() {
            return Err(ValidationError::MissingTaskId { index });
        }
    }
    for (index, dep) in run.dependencies.iter().enumerate() {
        if dep.source.trim().is_empty() {
            return Err(ValidationError::MissingEndpoint {
                index,
                side: EndpointSide::Source,
            });
        }
        if dep.target.trim().is_empty() {
            return Err(ValidationError::MissingEndpoint {
                index,
                side: EndpointSide::Target,
            });
        }
    }
    Ok(())
}

fn ensure_group(
    graph: &mut FlowGraph,
    parent: Option<NodeId>,
    key: &str,
    local: &str,
    rule: usize,
) -> NodeId {
    if let Some(id) = graph.index.get(key).copied() {
        let node = &mut graph.nodes[id.0];
        node.kind = NodeKind::Group;
        node.rule.get_or_insert(rule);
        return id;
    }
    insert_node(graph, parent, key, local, NodeKind::Group, Some(rule))
}

fn insert_node(
    graph: &mut FlowGraph,
    parent: Option<NodeId>,
    key: &str,
    local: &str,
    kind: NodeKind,
    rule: Option<usize>,
) -> NodeId {
    // Patterns that do not rebuild the key from `group` and `rest` can map two
    // keys onto one local id; the later one keeps its full key instead.
    let local = if graph.locals.insert((parent, local.to_string())) {
        local
    } else {
        debug!(task = key, local, "local id already taken in scope");
        graph.locals.insert((parent, key.to_string()));
        key
    };
    let id = NodeId(graph.nodes.len());
    graph.nodes.push(TaskNode {
        key: key.to_string(),
        id: local.to_string(),
        kind,
        state: SCHEDULED_STATE.to_string(),
        synthetic: true,
        parent,
        children: Vec::new(),
        predecessors: Vec::new(),
        payload: None,
        rule,
    });
    graph.index.insert(key.to_string(), id);
    match parent {
        Some(parent) => graph.nodes[parent.0].children.push(id),
        None => graph.roots.push(id),
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(run: &RunRecord) -> FlowGraph {
        GraphBuilder::default().build(run).unwrap()
    }

    fn local_ids(graph: &FlowGraph, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| graph.node(*id).id.clone()).collect()
    }

    #[test]
    fn partitions_prefixed_tasks_into_groups() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a"))
            .task(TaskRecord::leaf("hpl_flow.b"))
            .task(TaskRecord::leaf("hpl_flow.c"))
            .depends("hpl_flow.b", "hpl_flow.c");
        let graph = build(&run);

        assert_eq!(local_ids(&graph, graph.roots()), vec!["a", "hpl_flow"]);
        let group = graph.get("hpl_flow").unwrap();
        assert!(graph.node(group).is_group());
        assert!(graph.node(group).synthetic);
        assert_eq!(local_ids(&graph, &graph.node(group).children), vec!["b", "c"]);

        let c = graph.get("hpl_flow.c").unwrap();
        assert_eq!(graph.node(c).parent, Some(group));
        assert_eq!(graph.node(c).predecessors, vec![graph.get("hpl_flow.b").unwrap()]);
        assert!(graph.node(graph.get("a").unwrap()).predecessors.is_empty());
    }

    #[test]
    fn nested_prefixes_nest_groups() {
        let run = RunRecord::new("r", "run").task(TaskRecord::leaf("ftb_flow.build_flow.step"));
        let graph = build(&run);

        let outer = graph.get("ftb_flow").unwrap();
        let inner = graph.get("ftb_flow.build_flow").unwrap();
        let step = graph.get("ftb_flow.build_flow.step").unwrap();
        assert_eq!(graph.node(inner).parent, Some(outer));
        assert_eq!(graph.node(step).parent, Some(inner));
        assert_eq!(graph.node(step).id, "step");
        assert_eq!(graph.depth(step), 2);
        assert_eq!(graph.groups_bottom_up(), vec![inner, outer]);
    }

    #[test]
    fn synthesizes_missing_endpoints_as_scheduled() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a").with_state("success"))
            .depends("a", "X");
        let graph = build(&run);

        let x = graph.get("X").unwrap();
        let node = graph.node(x);
        assert_eq!(node.kind, NodeKind::Leaf);
        assert_eq!(node.state, SCHEDULED_STATE);
        assert!(node.synthetic);
        assert!(node.payload.is_none());
        assert_eq!(graph.node(graph.get("a").unwrap()).state, "success");
    }

    #[test]
    fn flow_record_adopts_synthesized_container() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("hpl_flow.b"))
            .task(TaskRecord::flow("hpl_flow").with_state("running"));
        let graph = build(&run);

        let group = graph.get("hpl_flow").unwrap();
        let node = graph.node(group);
        assert!(node.is_group());
        assert!(!node.synthetic);
        assert_eq!(node.state, "running");
        assert_eq!(node.children.len(), 1);
        assert_eq!(graph.roots().len(), 1);
    }

    #[test]
    fn leaf_record_promoted_when_children_follow() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("ftb_flow"))
            .task(TaskRecord::leaf("ftb_flow.x"));
        let graph = build(&run);
        let group = graph.get("ftb_flow").unwrap();
        assert!(graph.node(group).is_group());
        assert_eq!(graph.node(group).rule, Some(0));
    }

    #[test]
    fn duplicate_dependencies_collapse() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a"))
            .task(TaskRecord::leaf("b"))
            .depends("a", "b")
            .depends("a", "b")
            .depends("b", "a");
        let graph = build(&run);
        assert_eq!(graph.edges().len(), 2);
        let b = graph.get("b").unwrap();
        assert_eq!(graph.node(b).predecessors.len(), 1);
        assert_eq!(graph.dependency_order(), &[b, graph.get("a").unwrap()]);
    }

    #[test]
    fn dependencies_stay_on_recorded_endpoints() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("prepare"))
            .task(TaskRecord::leaf("hpl_flow.b"))
            .depends("prepare", "hpl_flow.b");
        let graph = build(&run);
        let edge = graph.edges()[0];
        assert_eq!(graph.node(edge.target).key, "hpl_flow.b");
        let group = graph.get("hpl_flow").unwrap();
        assert!(graph.node(group).predecessors.is_empty());
        assert_eq!(graph.member_of_scope(None, edge.target), Some(group));
    }

    #[test]
    fn first_declared_rule_wins() {
        let rules = GroupRules::from_patterns(&[
            r"^(?P<group>[^.]+_flow)\.(?P<rest>.+)$".to_string(),
            r"^(?P<group>[^.]+)\.(?P<rest>.+)$".to_string(),
        ])
        .unwrap();
        assert_eq!(rules.split("a_flow.b"), Some((0, "a_flow", "b")));
        assert_eq!(rules.split("plain.b"), Some((1, "plain", "b")));
        assert_eq!(rules.split("plain"), None);
    }

    #[test]
    fn colliding_local_ids_keep_their_full_key() {
        let rules = GroupRules::from_patterns(&[
            r"^(?P<group>[^.:]+_flow)[.:](?P<rest>.+)$".to_string(),
        ])
        .unwrap();
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a_flow.b"))
            .task(TaskRecord::leaf("a_flow:b"));
        let graph = GraphBuilder::new(rules).build(&run).unwrap();

        let group = graph.get("a_flow").unwrap();
        let children = graph.scope(Some(group));
        assert_eq!(children.len(), 2);
        assert_eq!(local_ids(&graph, children), vec!["b", "a_flow:b"]);
        assert_eq!(graph.node(graph.get("a_flow:b").unwrap()).parent, Some(group));
    }

    #[test]
    fn no_rules_keeps_everything_at_root() {
        let run = RunRecord::new("r", "run").task(TaskRecord::leaf("hpl_flow.b"));
        let graph = GraphBuilder::new(GroupRules::none()).build(&run).unwrap();
        assert_eq!(graph.roots().len(), 1);
        assert_eq!(graph.node(graph.roots()[0]).id, "hpl_flow.b");
    }

    #[test]
    fn missing_task_id_is_rejected() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a"))
            .task(TaskRecord::leaf("  "));
        let err = GraphBuilder::default().build(&run).unwrap_err();
        assert_eq!(err, ValidationError::MissingTaskId { index: 1 });
    }

    #[test]
    fn missing_dependency_endpoint_is_rejected() {
        let run = RunRecord::new("r", "run").depends("a", "");
        let err = GraphBuilder::default().build(&run).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingEndpoint {
                index: 0,
                side: EndpointSide::Target
            }
        );
    }

    #[test]
    fn duplicate_task_record_keeps_first() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a").with_state("success"))
            .task(TaskRecord::leaf("a").with_state("failed"));
        let graph = build(&run);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(NodeId(0)).state, "success");
    }
}
