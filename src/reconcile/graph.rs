//! Dependency graph of one save.
//!
//! One node per collection with work, one node per color whose images need
//! work. A node may carry barriers: operations that must have completed
//! (and, for creates, produced an identity) before the node dispatches.

use super::plan::SavePlan;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TaskNode {
    Product,
    Colors,
    Sizes,
    Features,
    ColorImages { color_slot: usize },
}

impl fmt::Display for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product => write!(f, "product"),
            Self::Colors => write!(f, "colors"),
            Self::Sizes => write!(f, "sizes"),
            Self::Features => write!(f, "features"),
            Self::ColorImages { color_slot } => write!(f, "colors[{}].images", color_slot),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "barrier", content = "slot", rename_all = "snake_case")]
pub enum Barrier {
    /// The product create
    Product,
    /// The create or update of the color at this slot
    Color(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskGraph {
    nodes: Vec<(TaskNode, Vec<Barrier>)>,
}

impl TaskGraph {
    pub fn from_plan(plan: &SavePlan) -> Self {
        let mut graph = Self::default();
        let root: Vec<Barrier> = if plan.product.is_create() {
            vec![Barrier::Product]
        } else {
            Vec::new()
        };

        if plan.product.payload().is_some() {
            graph.nodes.push((TaskNode::Product, Vec::new()));
        }
        if !plan.colors.is_empty() {
            graph.nodes.push((TaskNode::Colors, root.clone()));
        }
        if !plan.sizes.is_empty() {
            graph.nodes.push((TaskNode::Sizes, root.clone()));
        }
        if !plan.features.is_empty() {
            graph.nodes.push((TaskNode::Features, root.clone()));
        }

        for images in &plan.images {
            let slot = images.color_slot;
            let mut barriers = root.clone();
            if plan.colors.creates_slot(slot) || plan.colors.updates_slot(slot) {
                barriers.push(Barrier::Color(slot));
            }
            graph
                .nodes
                .push((TaskNode::ColorImages { color_slot: slot }, barriers));
        }

        graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = TaskNode> + '_ {
        self.nodes.iter().map(|(node, _)| *node)
    }

    pub fn contains(&self, node: TaskNode) -> bool {
        self.nodes.iter().any(|(candidate, _)| *candidate == node)
    }

    pub fn barriers(&self, node: TaskNode) -> &[Barrier] {
        self.nodes
            .iter()
            .find(|(candidate, _)| *candidate == node)
            .map(|(_, barriers)| barriers.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes that cannot run if `barrier` fails
    pub fn dependents_of(&self, barrier: Barrier) -> Vec<TaskNode> {
        self.nodes
            .iter()
            .filter(|(_, barriers)| barriers.contains(&barrier))
            .map(|(node, _)| *node)
            .collect()
    }

    /// Whether the images of `color_slot` wait on that color's own operation
    pub fn waits_on_color(&self, color_slot: usize) -> bool {
        self.barriers(TaskNode::ColorImages { color_slot })
            .contains(&Barrier::Color(color_slot))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
