//! Uniform-grid cell list for radius neighbor queries.
//!
//! Cells are laid out row-major in one flat arena: `cell_counts` and
//! `cell_starts` describe each cell's slice of `cell_agent_indices`. All
//! buffers are sized once and reused every tick.

use crate::boundary::Boundary;
use flock_common::{BoundaryPolicy, SimParams, Vec2};
use rayon::prelude::*;

/// One agent found within the query radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    /// Boundary-aware displacement from the queried agent to this neighbor.
    pub delta: Vec2,
    pub distance: f32,
}

/// Grid geometry, copied out so the parallel phase can borrow it alongside the buffers.
#[derive(Debug, Clone, Copy)]
struct GridShape {
    grid_dim_x: u32,
    grid_dim_y: u32,
    inv_cell_width: f32,
    inv_cell_height: f32,
}

impl GridShape {
    #[inline(always)]
    fn cell_coords(&self, pos: Vec2) -> (i32, i32) {
        // Clamp to grid dimensions; a reflective position may sit exactly on the far edge.
        let cx = ((pos.x * self.inv_cell_width).floor() as i32).clamp(0, self.grid_dim_x as i32 - 1);
        let cy = ((pos.y * self.inv_cell_height).floor() as i32).clamp(0, self.grid_dim_y as i32 - 1);
        (cx, cy)
    }

    #[inline(always)]
    fn cell_index(&self, pos: Vec2) -> u32 {
        let (cx, cy) = self.cell_coords(pos);
        cy as u32 * self.grid_dim_x + cx as u32
    }
}

#[derive(Debug, Clone)]
pub struct CellList {
    shape: GridShape,
    wraps: bool,
    // Grid cell index for each agent
    agent_cells: Vec<u32>,
    // Number of agents in each grid cell
    cell_counts: Vec<u32>,
    // Start index in cell_agent_indices for each grid cell (prefix sum)
    cell_starts: Vec<u32>,
    // Scatter cursor per cell, reset on every rebuild
    write_offsets: Vec<u32>,
    // Agent indices sorted by grid cell
    cell_agent_indices: Vec<u32>,
}

impl CellList {
    pub fn new(params: &SimParams) -> Self {
        let num_grid_cells = params.num_grid_cells as usize;
        let num_agents = params.num_agents as usize;
        Self {
            shape: GridShape {
                grid_dim_x: params.grid_dim_x,
                grid_dim_y: params.grid_dim_y,
                inv_cell_width: params.inv_cell_width,
                inv_cell_height: params.inv_cell_height,
            },
            wraps: params.boundary == BoundaryPolicy::Toroidal,
            agent_cells: vec![0; num_agents],
            cell_counts: vec![0; num_grid_cells],
            cell_starts: vec![0; num_grid_cells],
            write_offsets: vec![0; num_grid_cells],
            cell_agent_indices: vec![0; num_agents],
        }
    }

    /// Calculates the 1D grid cell index for a given position.
    #[inline(always)]
    pub fn cell_index(&self, pos: Vec2) -> u32 {
        self.shape.cell_index(pos)
    }

    /// Rebuilds the buckets from the current positions.
    pub fn rebuild(&mut self, positions: &[Vec2]) {
        let num_agents = positions.len();
        if self.agent_cells.len() != num_agents {
            self.agent_cells.resize(num_agents, 0);
            self.cell_agent_indices.resize(num_agents, 0);
        }

        // Phase 1: Assign grid indices to each agent (Parallel).
        let shape = self.shape;
        self.agent_cells
            .par_iter_mut()
            .zip(positions.par_iter())
            .for_each(|(cell_out, &pos)| *cell_out = shape.cell_index(pos));

        // Phase 2: Count agents in each grid cell.
        self.cell_counts.iter_mut().for_each(|c| *c = 0);
        for &cell in &self.agent_cells {
            self.cell_counts[cell as usize] += 1;
        }

        // Phase 3: Prefix sum for cell start indices.
        let mut total = 0;
        for (start, &count) in self.cell_starts.iter_mut().zip(&self.cell_counts) {
            *start = total;
            total += count;
        }

        // Phase 4: Scatter agent indices into their cell's block.
        // Serial, so indices stay ascending inside each cell.
        self.write_offsets.iter_mut().for_each(|o| *o = 0);
        for (agent_idx, &cell) in self.agent_cells.iter().enumerate() {
            let cell = cell as usize;
            let slot = (self.cell_starts[cell] + self.write_offsets[cell]) as usize;
            self.cell_agent_indices[slot] = agent_idx as u32;
            self.write_offsets[cell] += 1;
        }
    }

    /// Agent indices bucketed in one cell.
    pub fn cell_members(&self, cell: u32) -> &[u32] {
        let start = self.cell_starts[cell as usize] as usize;
        let count = self.cell_counts[cell as usize] as usize;
        &self.cell_agent_indices[start..start + count]
    }

    /// Calls `f` for every agent within `radius_sq` of agent `agent_idx`,
    /// scanning only the 3x3 block of cells around it.
    ///
    /// Under a toroidal boundary the block wraps, and each distinct cell is
    /// visited once even when the grid is narrower than three cells.
    /// Under a reflective boundary cells outside the grid are skipped.
    pub fn for_each_neighbor<F>(
        &self,
        agent_idx: usize,
        positions: &[Vec2],
        boundary: &Boundary,
        radius_sq: f32,
        mut f: F,
    ) where
        F: FnMut(Neighbor),
    {
        let pos = positions[agent_idx];
        let (cx, cy) = self.shape.cell_coords(pos);
        let (cols, num_cols) = block_axis(cx, self.shape.grid_dim_x as i32, self.wraps);
        let (rows, num_rows) = block_axis(cy, self.shape.grid_dim_y as i32, self.wraps);

        for &row in &rows[..num_rows] {
            for &col in &cols[..num_cols] {
                let cell = row as u32 * self.shape.grid_dim_x + col as u32;
                for &other in self.cell_members(cell) {
                    let other = other as usize;
                    // Don't compare agent to itself
                    if other == agent_idx {
                        continue;
                    }
                    if let Some(neighbor) = within_radius(pos, other, positions, boundary, radius_sq) {
                        f(neighbor);
                    }
                }
            }
        }
    }
}

/// Distinct cell coordinates along one axis covered by the 3x3 block around `center`.
#[inline(always)]
fn block_axis(center: i32, dim: i32, wraps: bool) -> ([i32; 3], usize) {
    let mut out = [0; 3];
    let mut len = 0;
    for offset in -1..=1 {
        let mut c = center + offset;
        if wraps {
            c = c.rem_euclid(dim);
        } else if c < 0 || c >= dim {
            continue;
        }
        if !out[..len].contains(&c) {
            out[len] = c;
            len += 1;
        }
    }
    (out, len)
}

#[inline(always)]
fn within_radius(
    pos: Vec2,
    other: usize,
    positions: &[Vec2],
    boundary: &Boundary,
    radius_sq: f32,
) -> Option<Neighbor> {
    let delta = boundary.delta(pos, positions[other]);
    let dist_sq = delta.length_squared();
    if dist_sq <= radius_sq {
        Some(Neighbor { index: other, delta, distance: dist_sq.sqrt() })
    } else {
        None
    }
}

/// Exhaustive O(N) scan for one agent; the correctness oracle for [`CellList`].
pub fn for_each_neighbor_brute_force<F>(
    agent_idx: usize,
    positions: &[Vec2],
    boundary: &Boundary,
    radius_sq: f32,
    mut f: F,
) where
    F: FnMut(Neighbor),
{
    let pos = positions[agent_idx];
    for other in 0..positions.len() {
        if other == agent_idx {
            continue;
        }
        if let Some(neighbor) = within_radius(pos, other, positions, boundary, radius_sq) {
            f(neighbor);
        }
    }
}

/// Which neighbor query path the force phase uses.
#[derive(Debug, Clone, Copy)]
pub enum NeighborSearch<'a> {
    Indexed(&'a CellList),
    BruteForce,
}

impl NeighborSearch<'_> {
    #[inline(always)]
    pub fn for_each<F>(&self, agent_idx: usize, positions: &[Vec2], boundary: &Boundary, radius_sq: f32, f: F)
    where
        F: FnMut(Neighbor),
    {
        match self {
            NeighborSearch::Indexed(grid) => grid.for_each_neighbor(agent_idx, positions, boundary, radius_sq, f),
            NeighborSearch::BruteForce => for_each_neighbor_brute_force(agent_idx, positions, boundary, radius_sq, f),
        }
    }

    /// Collects the neighbors of `agent_idx` into `out`, replacing its contents.
    pub fn collect_into(
        &self,
        agent_idx: usize,
        positions: &[Vec2],
        boundary: &Boundary,
        radius_sq: f32,
        out: &mut Vec<Neighbor>,
    ) {
        out.clear();
        self.for_each(agent_idx, positions, boundary, radius_sq, |n| out.push(n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flock_common::FlockConfig;
    use rand::prelude::*;

    fn params_for(width: f32, height: f32, radius: f32, boundary: BoundaryPolicy, n: u32) -> SimParams {
        let mut config = FlockConfig::default();
        config.world.width = width;
        config.world.height = height;
        config.world.boundary = boundary;
        config.forces.neighbor_radius = radius;
        config.population.count = n;
        config.get_sim_params()
    }

    fn sorted_indices(search: NeighborSearch, i: usize, positions: &[Vec2], b: &Boundary, r_sq: f32) -> Vec<usize> {
        let mut found = Vec::new();
        search.for_each(i, positions, b, r_sq, |n| found.push(n.index));
        found.sort_unstable();
        found
    }

    #[test]
    fn buckets_partition_all_agents() {
        let params = params_for(100.0, 60.0, 10.0, BoundaryPolicy::Toroidal, 4);
        let mut grid = CellList::new(&params);
        let positions = vec![
            Vec2::new(5.0, 5.0),
            Vec2::new(6.0, 7.0),
            Vec2::new(55.0, 35.0),
            Vec2::new(99.9, 59.9),
        ];
        grid.rebuild(&positions);

        let first = grid.cell_index(positions[0]);
        assert_eq!(grid.cell_members(first), &[0, 1]);
        let last = grid.cell_index(positions[3]);
        assert_eq!(last, params.num_grid_cells - 1);
        assert_eq!(grid.cell_members(last), &[3]);

        let total: usize = (0..params.num_grid_cells).map(|c| grid.cell_members(c).len()).sum();
        assert_eq!(total, positions.len());
    }

    #[test]
    fn far_edge_position_is_clamped_into_grid() {
        let params = params_for(100.0, 60.0, 10.0, BoundaryPolicy::Reflective, 1);
        let grid = CellList::new(&params);
        assert_eq!(grid.cell_index(Vec2::new(100.0, 60.0)), params.num_grid_cells - 1);
    }

    #[test]
    fn query_respects_radius_inclusively() {
        let params = params_for(100.0, 100.0, 12.0, BoundaryPolicy::Reflective, 3);
        let boundary = Boundary::from_params(&params);
        let mut grid = CellList::new(&params);
        let positions = vec![Vec2::new(50.0, 50.0), Vec2::new(62.0, 50.0), Vec2::new(62.5, 50.0)];
        grid.rebuild(&positions);

        let found = sorted_indices(NeighborSearch::Indexed(&grid), 0, &positions, &boundary, params.neighbor_radius_sq);
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn toroidal_query_finds_neighbors_across_the_seam() {
        let params = params_for(100.0, 100.0, 12.0, BoundaryPolicy::Toroidal, 2);
        let boundary = Boundary::from_params(&params);
        let mut grid = CellList::new(&params);
        let positions = vec![Vec2::new(1.0, 99.0), Vec2::new(97.0, 2.0)];
        grid.rebuild(&positions);

        let mut found = Vec::new();
        NeighborSearch::Indexed(&grid).collect_into(0, &positions, &boundary, params.neighbor_radius_sq, &mut found);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 1);
        assert!((found[0].delta.x - -4.0).abs() < 1e-4);
        assert!((found[0].delta.y - 3.0).abs() < 1e-4);
        assert!((found[0].distance - 5.0).abs() < 1e-4);
    }

    #[test]
    fn reflective_query_does_not_wrap() {
        let params = params_for(100.0, 100.0, 12.0, BoundaryPolicy::Reflective, 2);
        let boundary = Boundary::from_params(&params);
        let mut grid = CellList::new(&params);
        let positions = vec![Vec2::new(1.0, 50.0), Vec2::new(99.0, 50.0)];
        grid.rebuild(&positions);

        let found = sorted_indices(NeighborSearch::Indexed(&grid), 0, &positions, &boundary, params.neighbor_radius_sq);
        assert!(found.is_empty());
    }

    #[test]
    fn pair_at_radius_across_cell_edge_is_found() {
        let params = params_for(17.6725, 17.6725, 3.5345, BoundaryPolicy::Reflective, 2);
        let boundary = Boundary::from_params(&params);
        let mut grid = CellList::new(&params);
        let positions = vec![Vec2::new(3.534_499_4, 5.0), Vec2::new(7.068_999_3, 5.0)];
        grid.rebuild(&positions);

        let brute = sorted_indices(NeighborSearch::BruteForce, 0, &positions, &boundary, params.neighbor_radius_sq);
        assert_eq!(brute, vec![1]);
        let found = sorted_indices(NeighborSearch::Indexed(&grid), 0, &positions, &boundary, params.neighbor_radius_sq);
        assert_eq!(found, brute);
    }

    #[test]
    fn pairs_at_radius_match_brute_force_on_tight_grids() {
        let mut rng = StdRng::seed_from_u64(11);
        for k in 3..60u32 {
            let radius = 1.0 + k as f32 * 0.271;
            let width = radius * k as f32;
            for boundary_policy in [BoundaryPolicy::Toroidal, BoundaryPolicy::Reflective] {
                let params = params_for(width, width, radius, boundary_policy, 2);
                let boundary = Boundary::from_params(&params);
                let mut grid = CellList::new(&params);
                for _ in 0..50 {
                    let a = Vec2::new(rng.random::<f32>() * (width - radius), rng.random::<f32>() * width);
                    let positions = vec![a, Vec2::new(a.x + radius, a.y)];
                    grid.rebuild(&positions);
                    let found =
                        sorted_indices(NeighborSearch::Indexed(&grid), 0, &positions, &boundary, params.neighbor_radius_sq);
                    let brute =
                        sorted_indices(NeighborSearch::BruteForce, 0, &positions, &boundary, params.neighbor_radius_sq);
                    assert_eq!(found, brute, "k = {}, a = {:?}", k, a);
                }
            }
        }
    }

    #[test]
    fn narrow_toroidal_grid_reports_each_neighbor_once() {
        // Two columns: wrapping -1 and +1 lands on the same cell.
        let params = params_for(30.0, 30.0, 12.0, BoundaryPolicy::Toroidal, 3);
        assert_eq!(params.grid_dim_x, 2);
        let boundary = Boundary::from_params(&params);
        let mut grid = CellList::new(&params);
        let positions = vec![Vec2::new(5.0, 5.0), Vec2::new(16.0, 5.0), Vec2::new(8.0, 25.0)];
        grid.rebuild(&positions);

        let found = sorted_indices(NeighborSearch::Indexed(&grid), 0, &positions, &boundary, params.neighbor_radius_sq);
        let brute = sorted_indices(NeighborSearch::BruteForce, 0, &positions, &boundary, params.neighbor_radius_sq);
        assert_eq!(found, brute);
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn indexed_matches_brute_force_on_random_layouts() {
        for (boundary_policy, seed) in [(BoundaryPolicy::Toroidal, 3u64), (BoundaryPolicy::Reflective, 11u64)] {
            let n = 300;
            let params = params_for(157.0, 93.0, 9.5, boundary_policy, n);
            let boundary = Boundary::from_params(&params);
            let mut rng = StdRng::seed_from_u64(seed);
            let positions: Vec<Vec2> = (0..n)
                .map(|_| Vec2::new(rng.random::<f32>() * 157.0, rng.random::<f32>() * 93.0))
                .collect();
            let mut grid = CellList::new(&params);
            grid.rebuild(&positions);

            for i in 0..n as usize {
                let indexed =
                    sorted_indices(NeighborSearch::Indexed(&grid), i, &positions, &boundary, params.neighbor_radius_sq);
                let brute =
                    sorted_indices(NeighborSearch::BruteForce, i, &positions, &boundary, params.neighbor_radius_sq);
                assert_eq!(indexed, brute, "agent {} under {:?}", i, boundary_policy);
            }
        }
    }

    #[test]
    fn block_axis_wraps_and_dedupes() {
        let (cells, len) = block_axis(0, 5, true);
        assert_eq!(&cells[..len], &[4, 0, 1]);
        let (cells, len) = block_axis(0, 1, true);
        assert_eq!(&cells[..len], &[0]);
        let (cells, len) = block_axis(0, 5, false);
        assert_eq!(&cells[..len], &[0, 1]);
        let (cells, len) = block_axis(4, 5, false);
        assert_eq!(&cells[..len], &[3, 4]);
    }
}
