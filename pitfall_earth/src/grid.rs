//! Procedurally generated, endlessly scrolling rock.
//!
//! Cells live in an arena and link to their four neighbors by id. Left and
//! right wrap around the row. A row is generated when the scroll crosses a
//! row boundary, but its frames are only fixed once the row below exists, so
//! every edge mask is computed against final neighbors. After that, masks
//! only change incrementally when a neighboring block is destroyed.

use std::collections::VecDeque;
use std::f64::consts::TAU;

use pitfall_shared::config::{EarthConfig, LevelConfig};
use pitfall_shared::{
    Pickup, RandomSource, EDGE_BOTTOM, EDGE_LEFT, EDGE_RIGHT, EDGE_TOP, FIRST_PICKUP_FRAME,
};

use crate::pool::Pool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(pub usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub top: Option<CellId>,
    pub left: Option<CellId>,
    pub right: Option<CellId>,
    pub bottom: Option<CellId>,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub column: usize,
    /// Generation depth of the row this cell belongs to.
    pub depth: u32,
    /// `None` is an empty gap, `0..=15` a rock edge mask, 16 and above a pickup.
    pub frame: Option<u8>,
    /// Renderable slot, only while the cell is visible as something.
    pub item: Option<usize>,
    /// Background strip shared with the rest of its gap run.
    pub filler: Option<usize>,
    pub neighbors: Neighbors,
    finalized: bool,
    alive: bool,
}

impl Cell {
    fn new(column: usize, depth: u32, frame: Option<u8>) -> Self {
        Self {
            column,
            depth,
            frame,
            item: None,
            filler: None,
            neighbors: Neighbors::default(),
            finalized: false,
            alive: true,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self.frame, Some(f) if f < FIRST_PICKUP_FRAME)
    }

    pub fn pickup(&self) -> Option<Pickup> {
        self.frame.and_then(Pickup::from_frame)
    }

    /// Frames are final once the row below has been generated.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

#[derive(Debug, Clone, Copy)]
struct Item {
    cell: CellId,
}

#[derive(Debug, Clone, Copy)]
struct Filler {
    column: usize,
    depth: u32,
    /// In columns.
    span: usize,
}

#[derive(Debug, Clone, Copy)]
struct Explosion {
    x: f64,
    world_y: f64,
    ticks_left: u32,
}

/// Screen-space view of a block or pickup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub x: f64,
    pub y: f64,
    pub frame: u8,
    pub alive: bool,
}

/// Screen-space view of a background strip behind a gap run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub alive: bool,
}

/// Geometry drawn for one row, before linking.
#[derive(Debug, Clone, PartialEq)]
pub struct RowShape {
    pub depth: u32,
    pub gap_center: f64,
    pub gap_width: f64,
    pub frames: Vec<Option<u8>>,
}

#[derive(Debug, Clone)]
struct GapWalk {
    autocorrelation: f64,
    value: f64,
    periods: [f64; 2],
    phases: [f64; 2],
}

impl GapWalk {
    fn new(level: &LevelConfig) -> Self {
        Self {
            autocorrelation: level.initial_autocorrelation,
            value: 0.5,
            periods: level.lfo_periods,
            phases: [0.0; 2],
        }
    }
}

struct Row {
    depth: u32,
    cells: Vec<CellId>,
}

pub struct Earth {
    config: EarthConfig,
    level: LevelConfig,
    columns: usize,
    n_levels: u32,
    cells: Vec<Cell>,
    free_cells: Vec<CellId>,
    rows: VecDeque<Row>,
    items: Pool<Item>,
    fillers: Pool<Filler>,
    explosions: Pool<Explosion>,
    walk: GapWalk,
    scroll: f64,
    depth: u32,
    rng: Box<dyn RandomSource>,
}

impl Earth {
    pub fn new(config: EarthConfig, level: LevelConfig, rng: Box<dyn RandomSource>) -> Self {
        let columns = config.columns().max(1);
        let n_levels = config.visible_rows();
        let capacity = columns * (n_levels + config.look_ahead_rows) as usize;
        Self {
            columns,
            n_levels,
            cells: Vec::with_capacity(capacity),
            free_cells: Vec::new(),
            rows: VecDeque::new(),
            items: Pool::with_capacity(capacity),
            fillers: Pool::with_capacity(capacity),
            explosions: Pool::with_capacity(config.explosion_pool),
            walk: GapWalk::new(&level),
            scroll: 0.0,
            depth: 0,
            rng,
            config,
            level,
        }
    }

    /// Drop every row, renderable and random-walk state.
    pub fn reset(&mut self) {
        self.cells.clear();
        self.free_cells.clear();
        self.rows.clear();
        self.items.clear();
        self.fillers.clear();
        self.explosions.clear();
        self.walk = GapWalk::new(&self.level);
        self.scroll = 0.0;
        self.depth = 0;
        tracing::debug!("earth reset");
    }

    /// Switch generation parameters. The gap keeps wandering from where it is.
    pub fn set_level(&mut self, level: LevelConfig) {
        self.walk.autocorrelation = level.initial_autocorrelation;
        self.walk.periods = level.lfo_periods;
        self.level = level;
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Total pixels scrolled.
    pub fn scroll(&self) -> f64 {
        self.scroll
    }

    /// Deepest generated row.
    pub fn generated_depth(&self) -> u32 {
        self.depth
    }

    /// Depth at the ship, generation runs `visible_rows` ahead of it.
    pub fn depth(&self) -> u32 {
        self.depth.saturating_sub(self.n_levels)
    }

    /// Scroll the earth up by `step` pixels, generating a row for every row
    /// boundary crossed. Returns the depth at the ship.
    pub fn advance(&mut self, step: f64) -> u32 {
        if step > 0.0 {
            self.scroll += step;
        }
        self.tick_explosions();

        let target = (self.scroll / self.config.level_height.max(1) as f64).floor() as u32 + 1;
        while self.depth < target {
            self.depth += 1;
            self.generate_row(self.depth);
        }
        self.depth()
    }

    /// Draw the geometry of row `depth` and splice it below the current last row.
    pub fn generate_row(&mut self, depth: u32) -> RowShape {
        let shape = self.draw_row(depth);
        self.push_row(depth, &shape.frames);
        shape
    }

    fn draw_row(&mut self, depth: u32) -> RowShape {
        let level = &self.level;
        let walk = &mut self.walk;

        walk.autocorrelation *= level.difficulty_factor;
        let a = walk.autocorrelation;
        walk.value = (1.0 - a) * self.rng.next_f64() + a * walk.value;

        let mut position = walk.value;
        for k in 0..2 {
            walk.phases[k] += 1.0 / walk.periods[k].max(1.0);
            walk.periods[k] *= level.lfo_decay[k];
            position += 0.5 + 0.5 * (TAU * walk.phases[k]).sin();
        }
        position /= 3.0;

        let columns = self.columns as f64;
        let gap_width = (level.gap_width + (2.0 * self.rng.next_f64() - 1.0) * level.gap_jitter).max(1.0);
        let half = gap_width / 2.0;
        // Keep a rock column on either side of the gap.
        let (lo, hi) = (1.0 + half, columns - 2.0 - half);
        let gap_center = if lo <= hi { (position * columns).clamp(lo, hi) } else { columns / 2.0 };

        let odds = level.spawn;
        let special = 1.0 - odds.special;
        let bonus = special - odds.bonus;
        let health = bonus - odds.health;
        let energy = health - odds.energy;

        let mut frames = Vec::with_capacity(self.columns);
        for column in 0..self.columns {
            let x = column as f64;
            if x < gap_center - half || x > gap_center + half {
                frames.push(Some(0));
                continue;
            }
            let r = self.rng.next_f64();
            let pickup = if r > special {
                Some(Pickup::Special)
            } else if r > bonus {
                Some(Pickup::Bonus)
            } else if r > health {
                Some(Pickup::Health)
            } else if r > energy {
                Some(Pickup::Energy)
            } else {
                None
            };
            frames.push(pickup.map(Pickup::frame));
        }

        RowShape { depth, gap_center, gap_width, frames }
    }

    /// Link a row of cells below the current last row, finalize that row and
    /// retire rows that scrolled off the top.
    pub(crate) fn push_row(&mut self, depth: u32, frames: &[Option<u8>]) {
        let ids: Vec<CellId> = frames
            .iter()
            .enumerate()
            .map(|(column, frame)| self.alloc_cell(Cell::new(column, depth, *frame)))
            .collect();
        let n = ids.len();
        let previous: Vec<CellId> = self.rows.back().map(|r| r.cells.clone()).unwrap_or_default();

        for (j, &id) in ids.iter().enumerate() {
            let cell = &mut self.cells[id.0];
            cell.neighbors.left = Some(ids[(j + n - 1) % n]);
            cell.neighbors.right = Some(ids[(j + 1) % n]);
            cell.neighbors.top = previous.get(j).copied();
        }
        for (j, &id) in previous.iter().enumerate() {
            self.cells[id.0].neighbors.bottom = ids.get(j).copied();
        }
        for &id in &previous {
            self.finalize(id);
        }

        self.rows.push_back(Row { depth, cells: ids });
        self.retire_rows();
    }

    fn alloc_cell(&mut self, cell: Cell) -> CellId {
        match self.free_cells.pop() {
            Some(id) => {
                self.cells[id.0] = cell;
                id
            }
            None => {
                self.cells.push(cell);
                CellId(self.cells.len() - 1)
            }
        }
    }

    fn is_block(&self, id: Option<CellId>) -> bool {
        id.and_then(|id| self.cells.get(id.0)).is_some_and(|c| c.alive && c.is_block())
    }

    /// Bit set for every side whose neighbor is not rock.
    fn edge_mask(&self, id: CellId) -> u8 {
        let n = self.cells[id.0].neighbors;
        let mut mask = 0;
        for (neighbor, bit) in [
            (n.left, EDGE_LEFT),
            (n.bottom, EDGE_BOTTOM),
            (n.right, EDGE_RIGHT),
            (n.top, EDGE_TOP),
        ] {
            if !self.is_block(neighbor) {
                mask |= bit;
            }
        }
        mask
    }

    fn finalize(&mut self, id: CellId) {
        let cell = &self.cells[id.0];
        if cell.finalized || !cell.alive {
            return;
        }
        if cell.is_block() {
            let mask = self.edge_mask(id);
            self.cells[id.0].frame = Some(mask);
        }
        self.cells[id.0].finalized = true;

        let cell = &self.cells[id.0];
        if cell.frame.is_some_and(|f| f > 0) {
            self.attach_item(id);
        }
        if !self.cells[id.0].is_block() {
            self.attach_filler(id);
        }
    }

    fn attach_item(&mut self, id: CellId) {
        if self.cells[id.0].item.is_some() {
            return;
        }
        match self.items.acquire(Item { cell: id }) {
            Some(slot) => self.cells[id.0].item = Some(slot),
            None => tracing::warn!(capacity = self.items.capacity(), "out of recyclable earth"),
        }
    }

    /// Join the gap run on the left, else start a new strip.
    ///
    /// Rows finalize left to right, so a run only ever grows rightward.
    fn attach_filler(&mut self, id: CellId) {
        let cell = &self.cells[id.0];
        let (column, depth) = (cell.column, cell.depth);
        // Strips do not wrap around the row.
        let left = if column > 0 { cell.neighbors.left } else { None };
        let left = left.and_then(|n| self.cells[n.0].filler);

        if let Some(slot) = left {
            if let Some(f) = self.fillers.get_mut(slot) {
                f.span += 1;
                self.cells[id.0].filler = Some(slot);
                return;
            }
        }
        match self.fillers.acquire(Filler { column, depth, span: 1 }) {
            Some(slot) => self.cells[id.0].filler = Some(slot),
            None => tracing::warn!(capacity = self.fillers.capacity(), "out of background strips"),
        }
    }

    /// OR an edge bit into a finalized block, materializing it if it was interior.
    fn expose(&mut self, id: CellId, bit: u8) {
        let cell = &mut self.cells[id.0];
        if !cell.alive || !cell.finalized || !cell.is_block() {
            return;
        }
        let Some(frame) = cell.frame else { return };
        cell.frame = Some(frame | bit);
        if frame == 0 {
            self.attach_item(id);
        }
    }

    /// Destroy a cell's contents. A destroyed block leaves a gap and, with
    /// `propagate`, exposes the facing edge of each neighboring block.
    pub fn kill(&mut self, id: CellId, propagate: bool) -> bool {
        let Some(cell) = self.cells.get_mut(id.0) else { return false };
        if !cell.alive || cell.frame.is_none() {
            return false;
        }
        let was_block = cell.is_block();
        let neighbors = cell.neighbors;
        cell.frame = None;
        if let Some(slot) = cell.item.take() {
            self.items.release(slot);
        }

        if was_block && propagate {
            self.expose_around(neighbors);
        }
        true
    }

    fn expose_around(&mut self, n: Neighbors) {
        if let Some(top) = n.top {
            self.expose(top, EDGE_BOTTOM);
        }
        if let Some(left) = n.left {
            self.expose(left, EDGE_RIGHT);
        }
        if let Some(right) = n.right {
            self.expose(right, EDGE_LEFT);
        }
        if let Some(bottom) = n.bottom {
            self.expose(bottom, EDGE_TOP);
        }
    }

    fn screen_y(&self, depth: u32) -> f64 {
        self.config.height as f64 + depth as f64 * self.config.level_height as f64 - self.scroll
    }

    /// Recycle rows that scrolled fully above the top of the screen.
    fn retire_rows(&mut self) {
        let lh = self.config.level_height as f64;
        while let Some(front) = self.rows.front() {
            if self.screen_y(front.depth) + lh > 0.0 {
                break;
            }
            let Some(row) = self.rows.pop_front() else { break };

            for &id in &row.cells {
                let cell = &mut self.cells[id.0];
                let was_block = cell.is_block();
                let below = cell.neighbors.bottom;
                if let Some(slot) = cell.item.take() {
                    self.items.release(slot);
                }
                if let Some(slot) = cell.filler.take() {
                    self.fillers.release(slot);
                }
                cell.alive = false;
                cell.frame = None;
                if let Some(below) = below {
                    self.cells[below.0].neighbors.top = None;
                    if was_block {
                        self.expose(below, EDGE_TOP);
                    }
                }
            }
            self.free_cells.extend(row.cells);
        }
    }

    /// Spawn an explosion over a cell. Dropped with a warning when the pool is empty.
    pub fn explode(&mut self, id: CellId) -> bool {
        let Some(cell) = self.cells.get(id.0).filter(|c| c.alive) else { return false };
        let bw = self.config.block_width as f64;
        let lh = self.config.level_height as f64;
        let explosion = Explosion {
            x: cell.column as f64 * bw + bw / 2.0,
            world_y: self.config.height as f64 + cell.depth as f64 * lh + lh / 2.0,
            ticks_left: self.config.explosion_ticks,
        };
        match self.explosions.acquire(explosion) {
            Some(_) => true,
            None => {
                tracing::warn!(capacity = self.explosions.capacity(), "out of explosions");
                false
            }
        }
    }

    fn tick_explosions(&mut self) {
        let expired: Vec<usize> = self
            .explosions
            .iter()
            .filter(|(_, e)| e.ticks_left <= 1)
            .map(|(i, _)| i)
            .collect();
        for i in expired {
            self.explosions.release(i);
        }
        for i in 0..self.explosions.capacity() {
            if let Some(e) = self.explosions.get_mut(i) {
                e.ticks_left -= 1;
            }
        }
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0).filter(|c| c.alive)
    }

    /// Cell under a screen position, if its row is live.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<CellId> {
        let bw = self.config.block_width as f64;
        let lh = self.config.level_height as f64;
        let row = self.rows.iter().find(|r| {
            let top = self.screen_y(r.depth);
            y >= top && y < top + lh
        })?;
        let column = (x / bw).floor().rem_euclid(self.columns as f64) as usize;
        row.cells.get(column).copied()
    }

    /// Cells of the live row at generation depth `depth`, left to right.
    pub fn row(&self, depth: u32) -> Option<&[CellId]> {
        self.rows.iter().find(|r| r.depth == depth).map(|r| r.cells.as_slice())
    }

    pub fn live_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn items(&self) -> impl Iterator<Item = (CellId, Sprite)> + '_ {
        let bw = self.config.block_width as f64;
        self.items.iter().filter_map(move |(_, item)| {
            let cell = self.cells.get(item.cell.0)?;
            let sprite = Sprite {
                x: cell.column as f64 * bw,
                y: self.screen_y(cell.depth),
                frame: cell.frame?,
                alive: cell.alive,
            };
            Some((item.cell, sprite))
        })
    }

    pub fn fillers(&self) -> impl Iterator<Item = Strip> + '_ {
        let bw = self.config.block_width as f64;
        self.fillers.iter().map(move |(_, f)| Strip {
            x: f.column as f64 * bw,
            y: self.screen_y(f.depth),
            width: f.span as f64 * bw,
            alive: true,
        })
    }

    /// Explosion centres; `frame` counts animation ticks elapsed.
    pub fn explosions(&self) -> impl Iterator<Item = Sprite> + '_ {
        let total = self.config.explosion_ticks;
        self.explosions.iter().map(move |(_, e)| Sprite {
            x: e.x,
            y: e.world_y - self.scroll,
            frame: total.saturating_sub(e.ticks_left).min(u8::MAX as u32) as u8,
            alive: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitfall_shared::{GameConfig, ScriptedRandom, FRAME_SPECIAL};
    use pretty_assertions::assert_eq;

    fn earth(values: &[f64]) -> Earth {
        let config = GameConfig::default();
        Earth::new(
            config.earth.clone(),
            config.levels[&1].clone(),
            Box::new(ScriptedRandom::new(values)),
        )
    }

    const B: Option<u8> = Some(0);
    const G: Option<u8> = None;

    fn row_of(fill: Option<u8>, overrides: &[(usize, Option<u8>)]) -> Vec<Option<u8>> {
        let mut row = vec![fill; 16];
        for &(col, f) in overrides {
            row[col] = f;
        }
        row
    }

    fn cell_at(e: &Earth, depth: u32, column: usize) -> CellId {
        e.row(depth).unwrap()[column]
    }

    #[test]
    fn isolated_block_shows_every_edge() {
        let mut e = earth(&[0.5]);
        e.push_row(1, &row_of(G, &[]));
        e.push_row(2, &row_of(G, &[(3, B)]));
        e.push_row(3, &row_of(G, &[]));
        let id = cell_at(&e, 2, 3);
        assert_eq!(e.cell(id).unwrap().frame, Some(15));
        assert!(e.cell(id).unwrap().item.is_some());
    }

    #[test]
    fn buried_block_is_interior_until_exposed() {
        let mut e = earth(&[0.5]);
        e.push_row(1, &row_of(B, &[]));
        e.push_row(2, &row_of(B, &[]));
        e.push_row(3, &row_of(B, &[]));
        let id = cell_at(&e, 2, 5);
        assert_eq!(e.cell(id).unwrap().frame, Some(0));
        assert_eq!(e.cell(id).unwrap().item, None);

        let above = cell_at(&e, 1, 5);
        assert!(e.kill(above, true));
        assert_eq!(e.cell(id).unwrap().frame, Some(EDGE_TOP));
        assert!(e.cell(id).unwrap().item.is_some(), "exposed block gets a renderable");
        // side neighbors of the killed block gain their facing edge only
        assert_eq!(e.cell(cell_at(&e, 1, 4)).unwrap().frame, Some(EDGE_TOP | EDGE_RIGHT));
        assert_eq!(e.cell(above).unwrap().frame, None);
    }

    #[test]
    fn killing_without_propagation_leaves_neighbors_alone() {
        let mut e = earth(&[0.5]);
        e.push_row(1, &row_of(B, &[]));
        e.push_row(2, &row_of(B, &[]));
        e.push_row(3, &row_of(B, &[]));
        e.kill(cell_at(&e, 1, 5), false);
        assert_eq!(e.cell(cell_at(&e, 2, 5)).unwrap().frame, Some(0));
    }

    #[test]
    fn rows_wrap_left_and_right() {
        let mut e = earth(&[0.5]);
        e.push_row(1, &row_of(G, &[]));
        e.push_row(2, &row_of(G, &[(0, B), (15, B)]));
        e.push_row(3, &row_of(G, &[]));
        // each end block sees the other across the seam
        assert_eq!(e.cell(cell_at(&e, 2, 0)).unwrap().frame, Some(15 & !EDGE_LEFT));
        assert_eq!(e.cell(cell_at(&e, 2, 15)).unwrap().frame, Some(15 & !EDGE_RIGHT));
    }

    #[test]
    fn gap_runs_share_one_strip() {
        let mut e = earth(&[0.5]);
        e.push_row(1, &row_of(B, &[(4, G), (5, G), (6, Some(FRAME_SPECIAL)), (7, G), (10, G)]));
        e.push_row(2, &row_of(B, &[]));
        let strips: Vec<Strip> = e.fillers().collect();
        assert_eq!(strips.len(), 2);
        assert_eq!(strips[0].x, 200.0);
        assert_eq!(strips[0].width, 200.0);
        assert_eq!(strips[1].width, 50.0);
        let pickup = e.cell(cell_at(&e, 1, 6)).unwrap();
        assert_eq!(pickup.pickup(), Some(Pickup::Special));
        assert!(!pickup.is_block());
    }

    #[test]
    fn rows_finalize_one_behind_the_newest() {
        let mut e = earth(&[0.5]);
        e.push_row(1, &row_of(B, &[(5, G)]));
        assert!(!e.cell(cell_at(&e, 1, 0)).unwrap().is_finalized());
        assert_eq!(e.fillers().count(), 0, "gaps wait for their row to finalize");

        e.push_row(2, &row_of(B, &[(8, G)]));
        let finalized = |depth| {
            e.row(depth)
                .unwrap()
                .iter()
                .filter(|&&c| e.cell(c).unwrap().is_finalized())
                .count()
        };
        assert_eq!(finalized(1), 16);
        assert_eq!(finalized(2), 0);
        let strips: Vec<Strip> = e.fillers().collect();
        assert_eq!(strips.len(), 1);
        assert_eq!(strips[0].x, 250.0);
    }

    #[test]
    fn identical_random_sequences_give_identical_rows() {
        let script = [0.37, 0.81, 0.02, 0.999, 0.5, 0.64, 0.995, 0.1];
        let mut a = earth(&script);
        let mut b = earth(&script);
        for depth in 1..=20 {
            assert_eq!(a.generate_row(depth), b.generate_row(depth));
        }
    }

    #[test]
    fn generated_rows_have_a_gap_inside_the_walls() {
        let mut e = earth(&[0.0, 1.0, 0.5, 0.25]);
        for depth in 1..=50 {
            let shape = e.generate_row(depth);
            assert!(shape.frames[0] == B && shape.frames[15] == B, "walls at {depth}");
            assert!(shape.frames.iter().any(|f| !matches!(f, Some(0))), "gap at {depth}");
        }
    }

    #[test]
    fn advance_generates_one_row_per_boundary_and_recycles() {
        let mut e = earth(&[0.3, 0.6, 0.9]);
        for _ in 0..2000 {
            e.advance(4.0);
        }
        // 8000 px / 50 px rows
        assert_eq!(e.generated_depth(), 161);
        assert_eq!(e.depth(), 161 - 12);
        assert!(e.live_rows() <= 12 + 4);
        let top = e.items().map(|(_, s)| s.y).fold(f64::INFINITY, f64::min);
        assert!(top > -50.0, "retired rows leave no items behind");
    }

    #[test]
    fn explosions_expire_and_respect_the_pool() {
        let mut e = earth(&[0.5]);
        e.push_row(1, &row_of(B, &[]));
        let id = cell_at(&e, 1, 0);
        for _ in 0..30 {
            assert!(e.explode(id));
        }
        assert!(!e.explode(id));
        for _ in 0..16 {
            e.tick_explosions();
        }
        assert_eq!(e.explosions().count(), 0);
        assert!(e.explode(id));
    }

    #[test]
    fn reset_clears_everything() {
        let mut e = earth(&[0.4]);
        for _ in 0..100 {
            e.advance(4.0);
        }
        e.reset();
        assert_eq!(e.live_rows(), 0);
        assert_eq!(e.items().count(), 0);
        assert_eq!(e.scroll(), 0.0);
    }
}
