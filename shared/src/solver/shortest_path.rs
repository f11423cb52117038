//! Shortest-path challenge.
//!
//! Each seed generates a walled square grid with random start, end and
//! blockers. The optimal 4-directional path from start to end (A*, ties
//! broken by row then column) is hashed as concatenated decimal
//! `row`,`col` pairs. Instance generation is part of the puzzle, so the
//! order of draws and the resample/skip rules below must not change.

use std::{cmp::Reverse, collections::BinaryHeap};

use crate::{
    chain::{matches_fingerprint, ChainRng, DecimalHasher},
    solver::{Attempt, Search},
    types::{Fingerprint, Nonce},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: u64,
    pub col: u64,
}

impl Cell {
    pub fn new(row: u64, col: u64) -> Self {
        Self { row, col }
    }

    fn manhattan(&self, other: &Cell) -> u64 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

/// Square grid; `true` is passable. The outer ring is always blocked.
#[derive(Debug, Clone)]
pub struct Grid {
    size: u64,
    cells: Vec<bool>,
}

impl Grid {
    pub fn new(size: u64) -> Self {
        let mut grid = Self { size, cells: vec![false; (size * size) as usize] };
        grid.reset();
        grid
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether start and end can ever be two distinct passable cells.
    pub fn is_viable(&self) -> bool {
        self.size >= 4
    }

    pub fn reset(&mut self) {
        let size = self.size;
        for row in 0..size {
            for col in 0..size {
                let border = row == 0 || col == 0 || row == size - 1 || col == size - 1;
                self.cells[(row * size + col) as usize] = !border;
            }
        }
    }

    #[inline]
    fn index(&self, cell: Cell) -> usize {
        (cell.row * self.size + cell.col) as usize
    }

    pub fn is_passable(&self, cell: Cell) -> bool {
        cell.row < self.size && cell.col < self.size && self.cells[self.index(cell)]
    }

    pub fn block(&mut self, cell: Cell) {
        let index = self.index(cell);
        self.cells[index] = false;
    }

    fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        const DELTAS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        DELTAS.into_iter().filter_map(move |(dr, dc)| {
            let row = cell.row.checked_add_signed(dr)?;
            let col = cell.col.checked_add_signed(dc)?;
            let next = Cell::new(row, col);
            self.is_passable(next).then_some(next)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Start to end, both included.
    pub cells: Vec<Cell>,
    /// Steps taken, as recorded for the end cell.
    pub cost: u64,
}

/// Reusable A* bookkeeping, sized to the grid.
pub struct PathFinder {
    cost: Vec<u64>,
    came_from: Vec<Option<Cell>>,
    frontier: BinaryHeap<Reverse<(u64, u64, u64)>>,
}

impl PathFinder {
    pub fn new(size: u64) -> Self {
        let cells = (size * size) as usize;
        Self { cost: vec![u64::MAX; cells], came_from: vec![None; cells], frontier: BinaryHeap::new() }
    }

    /// Optimal path from `start` to `end`, or `None` if `end` is unreachable.
    pub fn find(&mut self, grid: &Grid, start: Cell, end: Cell) -> Option<Path> {
        self.cost.fill(u64::MAX);
        self.came_from.fill(None);
        self.frontier.clear();

        self.cost[grid.index(start)] = 0;
        // ordered by (cost + heuristic, row, col), smallest first
        self.frontier.push(Reverse((0, start.row, start.col)));

        while let Some(Reverse((_, row, col))) = self.frontier.pop() {
            let current = Cell::new(row, col);
            if current == end {
                return Some(self.reconstruct(grid, end));
            }

            let next_cost = self.cost[grid.index(current)] + 1;
            for next in grid.neighbors(current) {
                let index = grid.index(next);
                if next_cost < self.cost[index] {
                    self.cost[index] = next_cost;
                    self.came_from[index] = Some(current);
                    self.frontier.push(Reverse((next_cost + next.manhattan(&end), next.row, next.col)));
                }
            }
        }

        None
    }

    fn reconstruct(&self, grid: &Grid, end: Cell) -> Path {
        let mut cells = vec![end];
        let mut item = end;
        while let Some(previous) = self.came_from[grid.index(item)] {
            cells.push(previous);
            item = previous;
        }
        cells.reverse();
        Path { cells, cost: self.cost[grid.index(end)] }
    }
}

/// One generated puzzle instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Maze {
    pub start: Cell,
    pub end: Cell,
}

pub struct ShortestPathSearch {
    rng: ChainRng,
    fingerprint: Fingerprint,
    nb_blockers: u64,
    grid: Grid,
    finder: PathFinder,
}

impl ShortestPathSearch {
    pub fn new(
        reference: &[u8],
        fingerprint: Fingerprint,
        grid_size: u64,
        nb_blockers: u64,
        initial_nonce: Nonce,
    ) -> Self {
        Self {
            rng: ChainRng::new(reference, initial_nonce),
            fingerprint,
            nb_blockers,
            grid: Grid::new(grid_size),
            finder: PathFinder::new(grid_size),
        }
    }

    pub fn nonce(&self) -> Nonce {
        self.rng.nonce()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    fn random_cell(&mut self) -> Cell {
        let size = self.grid.size();
        let row = self.rng.next_u64() % size;
        let col = self.rng.next_u64() % size;
        Cell::new(row, col)
    }

    /// Lay out a fresh instance from the active seed.
    ///
    /// Start and end are resampled until valid; blockers landing on either
    /// are skipped, not redrawn.
    pub fn generate(&mut self) -> Maze {
        self.grid.reset();

        let mut start = self.random_cell();
        while !self.grid.is_passable(start) {
            start = self.random_cell();
        }

        let mut end = self.random_cell();
        while end == start || !self.grid.is_passable(end) {
            end = self.random_cell();
        }

        for _ in 0..self.nb_blockers {
            let blocker = self.random_cell();
            if blocker == start || blocker == end {
                continue;
            }
            self.grid.block(blocker);
        }

        Maze { start, end }
    }

    /// Generate the instance for the active seed and solve it.
    pub fn solve_current(&mut self) -> (Maze, Option<Path>) {
        let maze = self.generate();
        let path = self.finder.find(&self.grid, maze.start, maze.end);
        (maze, path)
    }
}

pub fn path_digest(path: &Path) -> [u8; 32] {
    let mut hasher = DecimalHasher::new();
    for cell in &path.cells {
        hasher.update(cell.row);
        hasher.update(cell.col);
    }
    hasher.finalize()
}

impl Search for ShortestPathSearch {
    fn attempt(&mut self) -> Attempt {
        if !self.grid.is_viable() {
            return Attempt::Unsolvable;
        }

        let (_, path) = self.solve_current();
        // an unreachable end just means this seed is no good
        if let Some(path) = path {
            if matches_fingerprint(&path_digest(&path), &self.fingerprint) {
                return Attempt::Found(self.rng.nonce());
            }
        }

        self.rng.advance();
        Attempt::Miss
    }
}
