//! Layered tree layout.
//!
//! Positions are computed in four passes over the whole node set: rank assignment
//! (longest path from the sources), crossing reduction (barycenter sweeps), coordinate
//! assignment (centered rows + median refinement) and a final flip for the rank
//! direction. The result is deterministic for a given node order and edge set.

use crate::tree::{TreeEdge, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-left corner of a node's box in layout space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which way the tree grows on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankDirection {
    /// Root at the bottom, leaves towards the top.
    #[default]
    BottomToTop,
    TopToBottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    /// Gap between consecutive ranks.
    pub rank_sep: f64,
    /// Gap between neighbours within a rank.
    pub node_sep: f64,
    pub direction: RankDirection,
    pub crossing_sweeps: usize,
    pub refinement_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 70.0,
            node_height: 70.0,
            rank_sep: 80.0,
            node_sep: 60.0,
            direction: RankDirection::BottomToTop,
            crossing_sweeps: 8,
            refinement_passes: 4,
        }
    }
}

impl LayoutConfig {
    /// Distance between the centers of two horizontally adjacent nodes.
    pub fn column_pitch(&self) -> f64 {
        self.node_width + self.node_sep
    }

    /// Distance between the centers of two consecutive ranks.
    pub fn rank_pitch(&self) -> f64 {
        self.node_height + self.rank_sep
    }
}

/// Adjacency over node indices. Edges whose endpoints are missing are dropped.
struct LayoutGraph {
    num_nodes: usize,
    adj: Vec<Vec<usize>>,
    radj: Vec<Vec<usize>>,
}

impl LayoutGraph {
    fn build(nodes: &[TreeNode], edges: &[TreeEdge]) -> Self {
        let num_nodes = nodes.len();
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut adj = vec![Vec::new(); num_nodes];
        let mut radj = vec![Vec::new(); num_nodes];
        for edge in edges {
            let (Some(&u), Some(&v)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
            else {
                continue;
            };
            if u == v || adj[u].contains(&v) {
                continue;
            }
            adj[u].push(v);
            radj[v].push(u);
        }

        Self { num_nodes, adj, radj }
    }
}

/// Compute a position for every node, in the same order as `nodes`.
pub fn layout(nodes: &[TreeNode], edges: &[TreeEdge], config: &LayoutConfig) -> Vec<Position> {
    if nodes.is_empty() {
        return Vec::new();
    }

    let graph = LayoutGraph::build(nodes, edges);
    let ranks = assign_ranks(&graph);
    let rows = order_rows(&ranks, &graph, config.crossing_sweeps);
    let (mut x, mut y) = assign_coordinates(&rows, &graph, config);

    if config.direction == RankDirection::BottomToTop {
        let max_y = y.iter().copied().fold(0.0, f64::max);
        for yi in y.iter_mut() {
            *yi = max_y - *yi;
        }
    }

    tracing::trace!(nodes = nodes.len(), ranks = rows.len(), "layout recomputed");

    x.iter()
        .zip(&y)
        .map(|(&cx, &cy)| Position::new(cx - config.node_width / 2.0, cy - config.node_height / 2.0))
        .collect()
}

// ---------------------------------------------------------------------------
// Ranks: longest path from the sources
// ---------------------------------------------------------------------------

fn assign_ranks(graph: &LayoutGraph) -> Vec<usize> {
    let n = graph.num_nodes;
    let mut in_deg: Vec<usize> = graph.radj.iter().map(Vec::len).collect();

    // Kahn's algorithm, always taking the lowest index for a stable order.
    let mut ready: Vec<usize> = (0..n).filter(|&v| in_deg[v] == 0).collect();
    ready.reverse();
    let mut topo = Vec::with_capacity(n);
    let mut visited = vec![false; n];

    while let Some(u) = ready.pop() {
        topo.push(u);
        visited[u] = true;
        for &v in &graph.adj[u] {
            in_deg[v] -= 1;
            if in_deg[v] == 0 {
                let pos = ready.partition_point(|&x| x > v);
                ready.insert(pos, v);
            }
        }
    }

    // Anything left sits on a cycle; append it so every node still gets a rank.
    topo.extend((0..n).filter(|&v| !visited[v]));

    let mut order = vec![0usize; n];
    for (i, &v) in topo.iter().enumerate() {
        order[v] = i;
    }

    let mut rank = vec![0usize; n];
    for &u in &topo {
        for &v in &graph.adj[u] {
            // Back edges of a cycle are ignored.
            if order[v] > order[u] && rank[v] <= rank[u] {
                rank[v] = rank[u] + 1;
            }
        }
    }
    rank
}

// ---------------------------------------------------------------------------
// Row ordering: barycenter sweeps, keeping the best ordering seen
// ---------------------------------------------------------------------------

fn order_rows(ranks: &[usize], graph: &LayoutGraph, sweeps: usize) -> Vec<Vec<usize>> {
    let num_rows = ranks.iter().copied().max().unwrap_or(0) + 1;
    let mut rows: Vec<Vec<usize>> = vec![Vec::new(); num_rows];
    for (v, &r) in ranks.iter().enumerate() {
        rows[r].push(v);
    }

    let mut best_crossings = count_crossings(&rows, &graph.adj);
    let mut best_rows = rows.clone();

    for sweep in 0..sweeps {
        if best_crossings == 0 && sweep > 0 {
            break;
        }
        if sweep % 2 == 0 {
            for i in 1..num_rows {
                barycenter_sort(&mut rows, i, i - 1, &graph.radj);
            }
        } else {
            for i in (0..num_rows.saturating_sub(1)).rev() {
                barycenter_sort(&mut rows, i, i + 1, &graph.adj);
            }
        }

        let c = count_crossings(&rows, &graph.adj);
        if c < best_crossings || (sweep == 0 && c == best_crossings) {
            best_crossings = c;
            best_rows = rows.clone();
        }
    }

    best_rows
}

fn count_crossings(rows: &[Vec<usize>], adj: &[Vec<usize>]) -> usize {
    let mut crossings = 0;
    for pair in rows.windows(2) {
        let pos_b: HashMap<usize, usize> = pair[1].iter().enumerate().map(|(p, &v)| (v, p)).collect();

        let mut segments: Vec<(usize, usize)> = Vec::new();
        for (pa, &u) in pair[0].iter().enumerate() {
            segments.extend(adj[u].iter().filter_map(|v| pos_b.get(v)).map(|&pb| (pa, pb)));
        }

        for i in 0..segments.len() {
            for j in (i + 1)..segments.len() {
                let (a1, b1) = segments[i];
                let (a2, b2) = segments[j];
                if (a1 < a2 && b1 > b2) || (a1 > a2 && b1 < b2) {
                    crossings += 1;
                }
            }
        }
    }
    crossings
}

/// Reorder `rows[row]` by the mean position of each node's neighbours in `rows[reference]`.
/// Nodes without neighbours there keep their relative order after the anchored ones.
fn barycenter_sort(rows: &mut [Vec<usize>], row: usize, reference: usize, neighbours: &[Vec<usize>]) {
    let ref_pos: HashMap<usize, usize> = rows[reference].iter().enumerate().map(|(p, &v)| (v, p)).collect();

    let mut keyed: Vec<(usize, usize, f64)> = rows[row]
        .iter()
        .enumerate()
        .map(|(current, &v)| {
            let anchors: Vec<f64> = neighbours[v]
                .iter()
                .filter_map(|u| ref_pos.get(u))
                .map(|&p| p as f64)
                .collect();
            let bary = if anchors.is_empty() {
                f64::MAX
            } else {
                anchors.iter().sum::<f64>() / anchors.len() as f64
            };
            (v, current, bary)
        })
        .collect();

    keyed.sort_by(|a, b| a.2.total_cmp(&b.2).then_with(|| a.1.cmp(&b.1)));
    rows[row] = keyed.into_iter().map(|(v, _, _)| v).collect();
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

fn assign_coordinates(rows: &[Vec<usize>], graph: &LayoutGraph, config: &LayoutConfig) -> (Vec<f64>, Vec<f64>) {
    let n = graph.num_nodes;
    let pitch = config.column_pitch();
    let mut x = vec![0.0f64; n];
    let mut y = vec![0.0f64; n];

    for (r, row) in rows.iter().enumerate() {
        let row_y = r as f64 * config.rank_pitch();
        let start = -((row.len().saturating_sub(1)) as f64 * pitch) / 2.0;
        for (i, &v) in row.iter().enumerate() {
            x[v] = start + i as f64 * pitch;
            y[v] = row_y;
        }
    }

    for _ in 0..config.refinement_passes {
        for row in rows {
            for &v in row {
                let mut near: Vec<f64> = graph.adj[v].iter().chain(&graph.radj[v]).map(|&u| x[u]).collect();
                if near.is_empty() {
                    continue;
                }
                near.sort_by(f64::total_cmp);
                let median = near[near.len() / 2];
                x[v] = (x[v] + median) / 2.0;
            }
        }
        separate_rows(rows, &mut x, pitch);
    }

    (x, y)
}

/// Push nodes apart, left to right in row order, until neighbours are a full pitch apart,
/// then re-center the row around where it was.
fn separate_rows(rows: &[Vec<usize>], x: &mut [f64], pitch: f64) {
    for row in rows {
        if row.len() < 2 {
            continue;
        }
        let before: f64 = row.iter().map(|&v| x[v]).sum::<f64>() / row.len() as f64;
        for pair in row.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if x[curr] - x[prev] < pitch {
                x[curr] = x[prev] + pitch;
            }
        }
        let after: f64 = row.iter().map(|&v| x[v]).sum::<f64>() / row.len() as f64;
        let shift = before - after;
        for &v in row {
            x[v] += shift;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Stage, TreeEdge, TreeNode};

    fn node(id: &str) -> TreeNode {
        TreeNode::new(id, "n", Stage::Sprout, 80)
    }

    fn edge(s: &str, t: &str) -> TreeEdge {
        TreeEdge::new(s, t)
    }

    fn by_id<'a>(nodes: &[TreeNode], positions: &'a [Position], id: &str) -> &'a Position {
        let idx = nodes.iter().position(|n| n.id == id).unwrap();
        &positions[idx]
    }

    #[test]
    fn empty_input_gives_no_positions() {
        assert!(layout(&[], &[], &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn single_node_is_placed() {
        let nodes = vec![node("0")];
        let pos = layout(&nodes, &[], &LayoutConfig::default());
        assert_eq!(pos.len(), 1);
        assert!(pos[0].x.is_finite() && pos[0].y.is_finite());
    }

    #[test]
    fn root_sits_below_children_when_growing_upward() {
        let nodes = vec![node("0"), node("1"), node("2")];
        let edges = vec![edge("0", "1"), edge("1", "2")];
        let cfg = LayoutConfig::default();
        let pos = layout(&nodes, &edges, &cfg);
        assert!(pos[0].y > pos[1].y);
        assert!(pos[1].y > pos[2].y);
        assert!((pos[0].y - pos[1].y) >= cfg.rank_pitch() - 1e-9);
    }

    #[test]
    fn top_to_bottom_puts_root_on_top() {
        let nodes = vec![node("0"), node("1")];
        let edges = vec![edge("0", "1")];
        let cfg = LayoutConfig {
            direction: RankDirection::TopToBottom,
            ..LayoutConfig::default()
        };
        let pos = layout(&nodes, &edges, &cfg);
        assert!(pos[0].y < pos[1].y);
    }

    #[test]
    fn siblings_keep_minimum_spacing() {
        let nodes: Vec<TreeNode> = ["0", "1", "2", "3", "4", "5", "6"].iter().map(|id| node(id)).collect();
        let edges = vec![
            edge("0", "1"),
            edge("0", "2"),
            edge("0", "3"),
            edge("1", "4"),
            edge("3", "5"),
            edge("3", "6"),
        ];
        let cfg = LayoutConfig::default();
        let pos = layout(&nodes, &edges, &cfg);

        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                if (pos[i].y - pos[j].y).abs() < 1e-9 {
                    assert!(
                        (pos[i].x - pos[j].x).abs() >= cfg.column_pitch() - 1e-9,
                        "{} and {} overlap",
                        nodes[i].id,
                        nodes[j].id
                    );
                }
            }
        }
    }

    #[test]
    fn subtrees_do_not_cross() {
        let nodes: Vec<TreeNode> = ["0", "1", "2", "3", "4"].iter().map(|id| node(id)).collect();
        // Children of "2" were created before children of "1".
        let edges = vec![edge("0", "1"), edge("0", "2"), edge("2", "3"), edge("1", "4")];
        let pos = layout(&nodes, &edges, &LayoutConfig::default());
        let left_parent = by_id(&nodes, &pos, "1").x < by_id(&nodes, &pos, "2").x;
        let left_child = by_id(&nodes, &pos, "4").x < by_id(&nodes, &pos, "3").x;
        assert_eq!(left_parent, left_child);
    }

    #[test]
    fn layout_is_deterministic() {
        let nodes: Vec<TreeNode> = ["0", "1", "2", "3"].iter().map(|id| node(id)).collect();
        let edges = vec![edge("0", "1"), edge("0", "2"), edge("2", "3")];
        let cfg = LayoutConfig::default();
        assert_eq!(layout(&nodes, &edges, &cfg), layout(&nodes, &edges, &cfg));
    }

    #[test]
    fn tolerates_dangling_edges_and_cycles() {
        let nodes = vec![node("0"), node("1"), node("2")];
        let edges = vec![edge("0", "9"), edge("1", "2"), edge("2", "1"), edge("0", "0")];
        let pos = layout(&nodes, &edges, &LayoutConfig::default());
        assert_eq!(pos.len(), 3);
        assert!(pos.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn disconnected_nodes_share_the_first_rank() {
        let nodes = vec![node("0"), node("a"), node("b")];
        let cfg = LayoutConfig::default();
        let pos = layout(&nodes, &[], &cfg);
        assert!(pos.iter().all(|p| (p.y - pos[0].y).abs() < 1e-9));
        assert!((pos[1].x - pos[0].x).abs() >= cfg.column_pitch() - 1e-9);
    }
}
