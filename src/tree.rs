//! Tree state: nodes, edges, resource gauges, score and simulation flags.
//!
//! Every mutation either applies fully or leaves the store untouched. Structural
//! changes (grow, prune, reset) re-run the layout over the whole node set.

use crate::error::GrowthError;
use crate::layout::{self, LayoutConfig, Position};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const ROOT_ID: &str = "0";
pub const ROOT_LABEL: &str = "Seed Prompt";
pub const MAX_RESOURCE: u32 = 100;
pub const MAX_ENERGY: u8 = 100;
pub const DEFAULT_GROWTH_SPEED_MS: u64 = 2000;

const GROW_SUN: u32 = 20;
const GROW_WATER: u32 = 15;
const EVOLVE_SUN: u32 = 15;
const EVOLVE_WATER: u32 = 10;
const PRUNE_REFUND_WATER: u32 = 10;
const GATHER_AMOUNT: u32 = 30;
const EVOLVE_ENERGY_GAIN: u8 = 20;

const SCORE_PER_BRANCH: u64 = 10;
const SCORE_EVOLVE: u64 = 25;
const SCORE_FRUIT: u64 = 50;
const SCORE_PRUNE: u64 = 5;

const BRANCH_NAMES: [&str; 24] = [
    "Creative", "Bold", "Playful", "Formal", "Witty", "Poetic",
    "Technical", "Simple", "Dramatic", "Mysterious", "Elegant", "Quirky",
    "Inspiring", "Concise", "Vivid", "Warm", "Cool", "Dynamic",
    "Minimal", "Expressive", "Precise", "Abstract", "Narrative", "Direct",
];

/// Growth stage of a node. Stages only ever advance, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Seed,
    Sprout,
    Branch,
    Flower,
    Fruit,
}

impl Stage {
    pub const ALL: [Stage; 5] = [Stage::Seed, Stage::Sprout, Stage::Branch, Stage::Flower, Stage::Fruit];

    /// The following stage, or `None` once fully grown.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Seed => Some(Stage::Sprout),
            Stage::Sprout => Some(Stage::Branch),
            Stage::Branch => Some(Stage::Flower),
            Stage::Flower => Some(Stage::Fruit),
            Stage::Fruit => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Seed => "seed",
            Stage::Sprout => "sprout",
            Stage::Branch => "branch",
            Stage::Flower => "flower",
            Stage::Fruit => "fruit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub stage: Stage,
    pub label: String,
    /// Informational only; nothing is gated on it.
    pub energy: u8,
    pub position: Position,
    /// Set on creation for an entry highlight, cleared by `acknowledge_new`.
    pub is_new: bool,
}

impl TreeNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, stage: Stage, energy: u8) -> Self {
        Self {
            id: id.into(),
            stage,
            label: label.into(),
            energy: energy.min(MAX_ENERGY),
            position: Position::default(),
            is_new: false,
        }
    }

    fn root() -> Self {
        Self::new(ROOT_ID, ROOT_LABEL, Stage::Seed, MAX_ENERGY)
    }
}

/// Directed parent -> child link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub is_new: bool,
}

impl TreeEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("e-{}-{}", source, target),
            source,
            target,
            is_new: false,
        }
    }
}

/// Read-only copy of everything a front end needs to draw the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSnapshot {
    pub nodes: Vec<TreeNode>,
    pub edges: Vec<TreeEdge>,
    pub sunlight: u32,
    pub water: u32,
    pub score: u64,
    pub is_auto_growing: bool,
    pub is_paused: bool,
    pub growth_speed_ms: u64,
}

/// Operations the growth scheduler and front ends drive the tree through.
pub trait TreeOps {
    fn nodes(&self) -> &[TreeNode];

    fn node(&self, id: &str) -> Option<&TreeNode> {
        self.nodes().iter().find(|n| n.id == id)
    }

    fn grow_branch(&mut self, parent_id: &str, animated: bool) -> bool;
    fn evolve_node(&mut self, node_id: &str) -> bool;
    fn prune_node(&mut self, node_id: &str) -> bool;
    fn add_resources(&mut self);

    /// Passive regeneration, clamped to the gauge maximum.
    fn regenerate(&mut self, sun: u32, water: u32);

    fn is_paused(&self) -> bool;
    fn start_auto_growth(&mut self);
    fn stop_auto_growth(&mut self);
    fn toggle_pause(&mut self);
    fn set_growth_speed(&mut self, ms: u64);
}

pub struct TreeStore {
    nodes: Vec<TreeNode>,
    edges: Vec<TreeEdge>,
    sunlight: u32,
    water: u32,
    score: u64,
    is_auto_growing: bool,
    is_paused: bool,
    growth_speed_ms: u64,
    next_id: u64,
    layout: LayoutConfig,
    rng: StdRng,
}

impl TreeStore {
    pub fn new(layout: LayoutConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut store = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            sunlight: MAX_RESOURCE,
            water: MAX_RESOURCE,
            score: 0,
            is_auto_growing: false,
            is_paused: false,
            growth_speed_ms: DEFAULT_GROWTH_SPEED_MS,
            next_id: 1,
            layout,
            rng,
        };
        store.reset();
        store
    }

    pub fn edges(&self) -> &[TreeEdge] {
        &self.edges
    }

    pub fn sunlight(&self) -> u32 {
        self.sunlight
    }

    pub fn water(&self) -> u32 {
        self.water
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn is_auto_growing(&self) -> bool {
        self.is_auto_growing
    }

    pub fn growth_speed_ms(&self) -> u64 {
        self.growth_speed_ms
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            sunlight: self.sunlight,
            water: self.water,
            score: self.score,
            is_auto_growing: self.is_auto_growing,
            is_paused: self.is_paused,
            growth_speed_ms: self.growth_speed_ms,
        }
    }

    /// Ids of the direct children of `id`, in creation order.
    pub fn children(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .map(|e| e.target.as_str())
            .collect()
    }

    fn check_resources(&self, sun: u32, water: u32) -> Result<(), GrowthError> {
        if self.sunlight < sun || self.water < water {
            return Err(GrowthError::InsufficientResources {
                needed_sun: sun,
                needed_water: water,
                sunlight: self.sunlight,
                water: self.water,
            });
        }
        Ok(())
    }

    fn relayout(&mut self) {
        let positions = layout::layout(&self.nodes, &self.edges, &self.layout);
        for (node, pos) in self.nodes.iter_mut().zip(positions) {
            node.position = pos;
        }
    }

    /// Sprout 1-3 children under `parent_id`. Returns the new node ids.
    pub fn try_grow_branch(&mut self, parent_id: &str, animated: bool) -> Result<Vec<String>, GrowthError> {
        self.check_resources(GROW_SUN, GROW_WATER)?;
        if self.node(parent_id).is_none() {
            return Err(GrowthError::UnknownNode(parent_id.to_string()));
        }

        let branch_count = self.rng.gen_range(1..=3u64);
        let mut new_ids = Vec::with_capacity(branch_count as usize);
        for _ in 0..branch_count {
            let id = self.next_id.to_string();
            self.next_id += 1;

            let label = BRANCH_NAMES[self.rng.gen_range(0..BRANCH_NAMES.len())];
            let energy = self.rng.gen_range(60..100u8);
            let mut node = TreeNode::new(id.clone(), label, Stage::Sprout, energy);
            node.is_new = animated;
            self.nodes.push(node);

            let mut edge = TreeEdge::new(parent_id, id.clone());
            edge.is_new = animated;
            self.edges.push(edge);

            new_ids.push(id);
        }

        self.relayout();
        self.sunlight = self.sunlight.saturating_sub(GROW_SUN);
        self.water = self.water.saturating_sub(GROW_WATER);
        self.score += SCORE_PER_BRANCH * branch_count;

        tracing::debug!(
            parent = parent_id,
            branches = branch_count,
            sunlight = self.sunlight,
            water = self.water,
            "branch grown"
        );
        Ok(new_ids)
    }

    /// Advance `node_id` one stage. Returns the stage it reached.
    pub fn try_evolve_node(&mut self, node_id: &str) -> Result<Stage, GrowthError> {
        self.check_resources(EVOLVE_SUN, EVOLVE_WATER)?;
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| GrowthError::UnknownNode(node_id.to_string()))?;
        let next = node
            .stage
            .next()
            .ok_or_else(|| GrowthError::FullyGrown(node_id.to_string()))?;

        node.stage = next;
        node.energy = node.energy.saturating_add(EVOLVE_ENERGY_GAIN).min(MAX_ENERGY);

        self.sunlight = self.sunlight.saturating_sub(EVOLVE_SUN);
        self.water = self.water.saturating_sub(EVOLVE_WATER);
        self.score += if next == Stage::Fruit { SCORE_FRUIT } else { SCORE_EVOLVE };

        tracing::debug!(node = node_id, stage = %next, score = self.score, "node evolved");
        Ok(next)
    }

    /// Remove `node_id` together with its whole subtree. Returns how many nodes went.
    pub fn try_prune_node(&mut self, node_id: &str) -> Result<usize, GrowthError> {
        if node_id == ROOT_ID {
            return Err(GrowthError::RootIsPermanent);
        }
        if self.node(node_id).is_none() {
            return Err(GrowthError::UnknownNode(node_id.to_string()));
        }

        let mut doomed: HashSet<String> = HashSet::new();
        let mut stack = vec![node_id.to_string()];
        while let Some(id) = stack.pop() {
            for edge in self.edges.iter().filter(|e| e.source == id) {
                if !doomed.contains(&edge.target) {
                    stack.push(edge.target.clone());
                }
            }
            doomed.insert(id);
        }

        self.nodes.retain(|n| !doomed.contains(&n.id));
        self.edges
            .retain(|e| !doomed.contains(&e.source) && !doomed.contains(&e.target));

        self.relayout();
        self.water = (self.water + PRUNE_REFUND_WATER).min(MAX_RESOURCE);
        self.score += SCORE_PRUNE;

        tracing::debug!(node = node_id, removed = doomed.len(), water = self.water, "subtree pruned");
        Ok(doomed.len())
    }

    /// Manual position override. The next structural change lays it out again.
    pub fn set_position(&mut self, node_id: &str, position: Position) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == node_id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Clear the "new" markers once the front end has shown them.
    pub fn acknowledge_new(&mut self) {
        for node in &mut self.nodes {
            node.is_new = false;
        }
        for edge in &mut self.edges {
            edge.is_new = false;
        }
    }

    /// Back to a lone seed with full gauges and a stopped simulation.
    pub fn reset(&mut self) {
        self.nodes = vec![TreeNode::root()];
        self.edges.clear();
        self.sunlight = MAX_RESOURCE;
        self.water = MAX_RESOURCE;
        self.score = 0;
        self.is_auto_growing = false;
        self.is_paused = false;
        self.next_id = 1;
        self.relayout();
    }
}

impl TreeOps for TreeStore {
    fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    fn grow_branch(&mut self, parent_id: &str, animated: bool) -> bool {
        self.try_grow_branch(parent_id, animated).is_ok()
    }

    fn evolve_node(&mut self, node_id: &str) -> bool {
        self.try_evolve_node(node_id).is_ok()
    }

    fn prune_node(&mut self, node_id: &str) -> bool {
        self.try_prune_node(node_id).is_ok()
    }

    fn add_resources(&mut self) {
        self.regenerate(GATHER_AMOUNT, GATHER_AMOUNT);
        tracing::debug!(sunlight = self.sunlight, water = self.water, "resources gathered");
    }

    fn regenerate(&mut self, sun: u32, water: u32) {
        self.sunlight = self.sunlight.saturating_add(sun).min(MAX_RESOURCE);
        self.water = self.water.saturating_add(water).min(MAX_RESOURCE);
    }

    fn is_paused(&self) -> bool {
        self.is_paused
    }

    fn start_auto_growth(&mut self) {
        self.is_auto_growing = true;
        self.is_paused = false;
    }

    fn stop_auto_growth(&mut self) {
        self.is_auto_growing = false;
        self.is_paused = false;
    }

    fn toggle_pause(&mut self) {
        self.is_paused = !self.is_paused;
    }

    fn set_growth_speed(&mut self, ms: u64) {
        self.growth_speed_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn store() -> TreeStore {
        TreeStore::new(LayoutConfig::default(), Some(42))
    }

    fn drain(store: &mut TreeStore, sunlight: u32, water: u32) {
        store.sunlight = sunlight;
        store.water = water;
    }

    #[test]
    fn starts_with_lone_seed() {
        let s = store();
        assert_eq!(s.nodes().len(), 1);
        let root = s.node(ROOT_ID).unwrap();
        assert_eq!(root.stage, Stage::Seed);
        assert_eq!(root.label, ROOT_LABEL);
        assert_eq!((s.sunlight(), s.water(), s.score()), (100, 100, 0));
        assert_eq!(s.growth_speed_ms(), DEFAULT_GROWTH_SPEED_MS);
    }

    #[test]
    fn growing_from_the_seed() {
        let mut s = store();
        let new_ids = s.try_grow_branch(ROOT_ID, true).unwrap();
        let count = new_ids.len();

        assert!((1..=3).contains(&count));
        assert_eq!(s.nodes().len(), 1 + count);
        assert_eq!(s.edges().len(), count);
        assert_eq!(s.sunlight(), 80);
        assert_eq!(s.water(), 85);
        assert_eq!(s.score(), 10 * count as u64);

        for id in &new_ids {
            let node = s.node(id).unwrap();
            assert_eq!(node.stage, Stage::Sprout);
            assert!((60..100).contains(&node.energy));
            assert!(BRANCH_NAMES.contains(&node.label.as_str()));
            assert!(node.is_new);
        }
        assert!(s.edges().iter().all(|e| e.source == ROOT_ID && e.is_new));
        assert_eq!(s.edges()[0].id, format!("e-0-{}", new_ids[0]));
    }

    #[test]
    fn unanimated_growth_is_not_marked_new() {
        let mut s = store();
        s.try_grow_branch(ROOT_ID, false).unwrap();
        assert!(s.nodes().iter().all(|n| !n.is_new));
        assert!(s.edges().iter().all(|e| !e.is_new));
    }

    #[test]
    fn ids_count_up_and_are_not_reused() {
        let mut s = store();
        let first = s.try_grow_branch(ROOT_ID, false).unwrap();
        assert_eq!(first[0], "1");
        s.try_prune_node(&first[0]).unwrap();
        let second = s.try_grow_branch(ROOT_ID, false).unwrap();
        assert_eq!(second[0], (first.len() + 1).to_string());
    }

    #[test]
    fn growth_gated_on_sunlight() {
        let mut s = store();
        drain(&mut s, 19, 100);
        let before = s.snapshot();
        assert!(!s.grow_branch(ROOT_ID, true));
        assert!(matches!(
            s.try_grow_branch(ROOT_ID, true),
            Err(GrowthError::InsufficientResources { needed_sun: 20, .. })
        ));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn growth_gated_on_water() {
        let mut s = store();
        drain(&mut s, 100, 14);
        assert!(!s.grow_branch(ROOT_ID, true));
        assert_eq!(s.nodes().len(), 1);
    }

    #[test]
    fn growth_needs_a_real_parent() {
        let mut s = store();
        let before = s.snapshot();
        assert_eq!(
            s.try_grow_branch("nope", true),
            Err(GrowthError::UnknownNode("nope".into()))
        );
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn seed_evolves_all_the_way_to_fruit() {
        let mut s = store();
        let stages: Vec<Stage> = (0..4).map(|_| s.try_evolve_node(ROOT_ID).unwrap()).collect();
        assert_eq!(stages, vec![Stage::Sprout, Stage::Branch, Stage::Flower, Stage::Fruit]);
        assert_eq!(s.score(), 25 * 3 + 50);
        assert_eq!(s.sunlight(), 40);
        assert_eq!(s.water(), 60);

        let before = s.snapshot();
        assert!(!s.evolve_node(ROOT_ID));
        assert_eq!(s.try_evolve_node(ROOT_ID), Err(GrowthError::FullyGrown(ROOT_ID.into())));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn evolution_caps_energy() {
        let mut s = store();
        s.try_evolve_node(ROOT_ID).unwrap();
        assert_eq!(s.node(ROOT_ID).unwrap().energy, MAX_ENERGY);
    }

    #[test]
    fn evolution_gated_on_resources() {
        let mut s = store();
        drain(&mut s, 15, 9);
        assert!(!s.evolve_node(ROOT_ID));
        assert_eq!(s.node(ROOT_ID).unwrap().stage, Stage::Seed);
        drain(&mut s, 15, 10);
        assert!(s.evolve_node(ROOT_ID));
        assert_eq!((s.sunlight(), s.water()), (0, 0));
    }

    #[test]
    fn evolution_keeps_positions() {
        let mut s = store();
        s.try_grow_branch(ROOT_ID, false).unwrap();
        let moved = Position::new(-500.0, 3.0);
        assert!(s.set_position(ROOT_ID, moved));
        s.try_evolve_node(ROOT_ID).unwrap();
        assert_eq!(s.node(ROOT_ID).unwrap().position, moved);
    }

    #[test]
    fn seed_cannot_be_pruned() {
        let mut s = store();
        s.try_grow_branch(ROOT_ID, false).unwrap();
        let before = s.snapshot();
        assert!(!s.prune_node(ROOT_ID));
        assert_eq!(s.try_prune_node(ROOT_ID), Err(GrowthError::RootIsPermanent));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn pruning_unknown_node_fails() {
        let mut s = store();
        let before = s.snapshot();
        assert!(!s.prune_node("42"));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn pruning_takes_the_whole_subtree() {
        let mut s = store();
        s.nodes.push(TreeNode::new("A", "a", Stage::Sprout, 70));
        s.nodes.push(TreeNode::new("B", "b", Stage::Sprout, 70));
        s.nodes.push(TreeNode::new("C", "c", Stage::Sprout, 70));
        s.edges.push(TreeEdge::new(ROOT_ID, "A"));
        s.edges.push(TreeEdge::new("A", "B"));
        s.edges.push(TreeEdge::new("A", "C"));
        drain(&mut s, 50, 95);

        assert_eq!(s.try_prune_node("A"), Ok(3));
        assert_eq!(s.nodes().len(), 1);
        assert_eq!(s.nodes()[0].id, ROOT_ID);
        assert!(s.edges().is_empty());
        assert_eq!(s.water(), 100);
        assert_eq!(s.sunlight(), 50);
        assert_eq!(s.score(), 5);
    }

    #[test]
    fn pruning_one_branch_leaves_siblings() {
        let mut s = store();
        s.nodes.push(TreeNode::new("A", "a", Stage::Sprout, 70));
        s.nodes.push(TreeNode::new("B", "b", Stage::Sprout, 70));
        s.nodes.push(TreeNode::new("C", "c", Stage::Sprout, 70));
        s.edges.push(TreeEdge::new(ROOT_ID, "A"));
        s.edges.push(TreeEdge::new(ROOT_ID, "B"));
        s.edges.push(TreeEdge::new("B", "C"));

        s.try_prune_node("B").unwrap();
        let ids: Vec<&str> = s.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![ROOT_ID, "A"]);
        assert_eq!(s.children(ROOT_ID), vec!["A"]);
    }

    #[test]
    fn grow_then_prune_is_observable() {
        let mut s = store();
        let kids = s.try_grow_branch(ROOT_ID, true).unwrap();
        assert_eq!(s.children(ROOT_ID).len(), kids.len());
        let grandkids = s.try_grow_branch(&kids[0], true).unwrap();
        assert!(s.node(&grandkids[0]).is_some());
        s.try_prune_node(&kids[0]).unwrap();
        assert!(s.node(&kids[0]).is_none());
        assert!(grandkids.iter().all(|id| s.node(id).is_none()));
    }

    #[test]
    fn gathering_clamps_at_full() {
        let mut s = store();
        drain(&mut s, 90, 10);
        s.add_resources();
        assert_eq!((s.sunlight(), s.water()), (100, 40));
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut s = store();
        s.try_grow_branch(ROOT_ID, true).unwrap();
        s.try_evolve_node(ROOT_ID).unwrap();
        s.start_auto_growth();
        s.toggle_pause();
        s.set_growth_speed(500);

        s.reset();
        assert_eq!(s.nodes().len(), 1);
        assert!(s.edges().is_empty());
        assert_eq!(s.node(ROOT_ID).unwrap().stage, Stage::Seed);
        assert_eq!((s.sunlight(), s.water(), s.score()), (100, 100, 0));
        assert!(!s.is_auto_growing() && !s.is_paused());
        assert_eq!(s.try_grow_branch(ROOT_ID, false).unwrap()[0], "1");
    }

    #[test]
    fn stopping_clears_pause() {
        let mut s = store();
        s.start_auto_growth();
        s.toggle_pause();
        assert!(s.is_paused() && s.is_auto_growing());
        s.stop_auto_growth();
        assert!(!s.is_paused() && !s.is_auto_growing());
    }

    #[test]
    fn acknowledge_clears_markers() {
        let mut s = store();
        s.try_grow_branch(ROOT_ID, true).unwrap();
        s.acknowledge_new();
        assert!(s.nodes().iter().all(|n| !n.is_new));
        assert!(s.edges().iter().all(|e| !e.is_new));
    }

    #[test]
    fn set_position_on_missing_node_fails() {
        let mut s = store();
        assert!(!s.set_position("7", Position::new(1.0, 1.0)));
    }

    #[test]
    fn snapshot_serializes_stage_names() {
        let s = store();
        let json = serde_json::to_string(&s.snapshot()).unwrap();
        assert!(json.contains("\"stage\":\"seed\""));
        assert!(json.contains("\"sunlight\":100"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Grow(usize),
        Evolve(usize),
        Prune(usize),
        Gather,
        Nudge(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0usize..64).prop_map(Op::Grow),
            3 => (0usize..64).prop_map(Op::Evolve),
            2 => (0usize..64).prop_map(Op::Prune),
            2 => Just(Op::Gather),
            1 => (0usize..64).prop_map(Op::Nudge),
        ]
    }

    fn pick(s: &TreeStore, i: usize) -> String {
        s.nodes()[i % s.nodes().len()].id.clone()
    }

    fn assert_rooted_tree(s: &TreeStore) -> Result<(), TestCaseError> {
        prop_assert!(s.node(ROOT_ID).is_some());
        for edge in s.edges() {
            prop_assert!(s.node(&edge.source).is_some());
            prop_assert!(s.node(&edge.target).is_some());
        }
        for node in s.nodes().iter().filter(|n| n.id != ROOT_ID) {
            let incoming = s.edges().iter().filter(|e| e.target == node.id).count();
            prop_assert_eq!(incoming, 1);
        }
        let mut seen = HashSet::new();
        let mut stack = vec![ROOT_ID.to_string()];
        while let Some(id) = stack.pop() {
            prop_assert!(seen.insert(id.clone()), "cycle through {}", id);
            stack.extend(s.children(&id).into_iter().map(String::from));
        }
        prop_assert_eq!(seen.len(), s.nodes().len());
        Ok(())
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_sequence(seed in any::<u64>(), ops in prop::collection::vec(op(), 0..80)) {
            let mut s = TreeStore::new(LayoutConfig::default(), Some(seed));
            for op in ops {
                let stages_before: HashMap<String, Stage> =
                    s.nodes().iter().map(|n| (n.id.clone(), n.stage)).collect();
                let score_before = s.score();

                match op {
                    Op::Grow(i) => { let id = pick(&s, i); s.grow_branch(&id, true); }
                    Op::Evolve(i) => { let id = pick(&s, i); s.evolve_node(&id); }
                    Op::Prune(i) => { let id = pick(&s, i); s.prune_node(&id); }
                    Op::Gather => s.add_resources(),
                    Op::Nudge(i) => { let id = pick(&s, i); s.set_position(&id, Position::new(1.0, 2.0)); }
                }

                prop_assert!(s.sunlight() <= MAX_RESOURCE);
                prop_assert!(s.water() <= MAX_RESOURCE);
                prop_assert!(s.score() >= score_before);
                for node in s.nodes() {
                    prop_assert!(node.energy <= MAX_ENERGY);
                    if let Some(&old) = stages_before.get(&node.id) {
                        prop_assert!(node.stage == old || old.next() == Some(node.stage));
                    }
                }
                assert_rooted_tree(&s)?;
            }
        }
    }
}
