//! Mamdani fuzzy controller decoded from a genome.
//!
//! Two independent banks: (speed, front) -> acceleration and
//! (left, right) -> rotation. Each bank is the full 5x5 cross product of the
//! antecedent terms. Firing strength is `min`, aggregation is `max`, and the
//! crisp output is the centroid over the discrete output universe.

use crate::constants::{
    ACCELERATION_LEVELS, COARSE_ACCELERATION_LEVELS, COARSE_ROTATION_LEVELS,
    DEFAULT_ACCELERATION_GENES, DEFAULT_ROTATION_GENES, FRONT_DOMAIN, FRONT_GRID_STEP,
    FULL_GENOME_LEN, GENES_PER_TERM, GENES_PER_VARIABLE, INPUT_GENOME_LEN, ROTATION_LEVELS,
    SIDE_DOMAIN, SIDE_GRID_STEP, SPEED_DOMAIN, SPEED_GRID_STEP, TERMS_PER_VARIABLE,
    TRIMMED_GENOME_LEN,
};
use crate::error::GenomeError;
use crate::vehicle::{Controller, Sensors};

/// Commanded change of speed and heading for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Action {
    pub acceleration: f64,
    /// Degrees; positive turns left (counter-clockwise).
    pub rotation: f64,
}

impl Action {
    pub const fn new(acceleration: f64, rotation: f64) -> Self {
        Self {
            acceleration,
            rotation,
        }
    }
}

/// Linguistic terms, ordered from most negative to most positive. For
/// distances they read "very near" .. "very far", for rotation
/// "strong right" .. "strong left".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Term {
    VeryNegative,
    Negative,
    Zero,
    Positive,
    VeryPositive,
}

impl Term {
    pub const fn index(self) -> usize {
        self as usize
    }
}

use Term::{Negative as NS, Positive as PS, VeryNegative as NB, VeryPositive as PB, Zero as Z};

/// Rows: speed term, columns: front distance term.
const ACCELERATION_RULES: [[Term; 5]; 5] = [
    [NB, PS, PB, PB, PB],
    [NB, Z, PS, PB, PB],
    [NB, Z, Z, PS, PB],
    [NB, Z, Z, PS, PB],
    [NB, NS, Z, Z, PB],
];

/// Rows: left distance term, columns: right distance term.
const ROTATION_RULES: [[Term; 5]; 5] = [
    [Z, NS, NB, NB, NB],
    [PS, Z, NS, NB, NB],
    [PB, PS, Z, NS, NB],
    [PB, PB, PS, Z, NS],
    [PB, PB, PB, PS, Z],
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Triangle {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Degree of membership; 1 at the peak, linear on both flanks. Shoulders
    /// (`a == b` or `b == c`) are flat at the peak.
    pub fn membership(&self, x: f64) -> f64 {
        if x == self.b {
            1.0
        } else if x > self.a && x < self.b {
            (x - self.a) / (self.b - self.a)
        } else if x > self.b && x < self.c {
            (self.c - x) / (self.c - self.b)
        } else {
            0.0
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct InputVariable {
    domain: (f64, f64),
    terms: [Triangle; TERMS_PER_VARIABLE],
}

impl InputVariable {
    fn fuzzify(&self, value: f64) -> [f64; TERMS_PER_VARIABLE] {
        let value = value.clamp(self.domain.0, self.domain.1);
        self.terms.map(|term| term.membership(value))
    }
}

#[derive(Clone, Debug, PartialEq)]
struct OutputVariable {
    universe: [f64; TERMS_PER_VARIABLE],
    terms: [Triangle; TERMS_PER_VARIABLE],
}

impl OutputVariable {
    fn infer(
        &self,
        rules: &[[Term; 5]; 5],
        rows: [f64; TERMS_PER_VARIABLE],
        cols: [f64; TERMS_PER_VARIABLE],
    ) -> Option<f64> {
        let mut clipped = [0.0_f64; TERMS_PER_VARIABLE];
        for (row, row_strength) in rows.iter().enumerate() {
            for (col, col_strength) in cols.iter().enumerate() {
                let firing = row_strength.min(*col_strength);
                let slot = &mut clipped[rules[row][col].index()];
                *slot = slot.max(firing);
            }
        }

        let mut weighted = 0.0;
        let mut total = 0.0;
        for x in self.universe {
            let degree = self
                .terms
                .iter()
                .zip(clipped)
                .map(|(term, cap)| term.membership(x).min(cap))
                .fold(0.0, f64::max);
            weighted += x * degree;
            total += degree;
        }

        if total > 0.0 && total.is_finite() {
            Some(weighted / total)
        } else {
            None
        }
    }
}

/// Discrete action sets the continuous outputs snap to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActionLevels {
    pub acceleration: &'static [f64],
    pub rotation: &'static [f64],
}

impl ActionLevels {
    pub const fn standard() -> Self {
        Self {
            acceleration: &ACCELERATION_LEVELS,
            rotation: &ROTATION_LEVELS,
        }
    }

    pub const fn coarse() -> Self {
        Self {
            acceleration: &COARSE_ACCELERATION_LEVELS,
            rotation: &COARSE_ROTATION_LEVELS,
        }
    }
}

impl Default for ActionLevels {
    fn default() -> Self {
        Self::standard()
    }
}

/// Nearest level to `value`; the first listed level wins a tie.
pub fn snap(value: f64, levels: &[f64]) -> f64 {
    let mut best = match levels.first() {
        Some(first) => *first,
        None => return value,
    };
    let mut best_gap = (value - best).abs();
    for level in &levels[1..] {
        let gap = (value - level).abs();
        if gap < best_gap {
            best = *level;
            best_gap = gap;
        }
    }
    best
}

/// Uniform sample points over one input domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridAxis {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl GridAxis {
    pub fn new(domain: (f64, f64), step: f64) -> Self {
        Self {
            min: domain.0,
            max: domain.1,
            step,
        }
    }

    /// Sample count; a step that is not a positive number yields the single
    /// sample at `min`.
    pub fn count(&self) -> usize {
        if !(self.step > 0.0 && self.step.is_finite()) || self.max <= self.min {
            return 1;
        }
        ((self.max - self.min) / self.step).round() as usize + 1
    }

    pub fn value(&self, index: usize) -> f64 {
        (self.min + index as f64 * self.step).min(self.max)
    }

    /// Nearest sample index, clamped to the axis. NaN maps to 0.
    pub fn index(&self, value: f64) -> usize {
        if value.is_nan() || self.count() == 1 {
            return 0;
        }
        let last = (self.count() - 1) as f64;
        ((value - self.min) / self.step).round().clamp(0.0, last) as usize
    }
}

/// Sample spacing for the precomputed decision tables.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookupGrid {
    pub speed_step: f64,
    pub front_step: f64,
    pub side_step: f64,
}

impl Default for LookupGrid {
    fn default() -> Self {
        Self {
            speed_step: SPEED_GRID_STEP,
            front_step: FRONT_GRID_STEP,
            side_step: SIDE_GRID_STEP,
        }
    }
}

impl LookupGrid {
    pub fn speed_axis(&self) -> GridAxis {
        GridAxis::new(SPEED_DOMAIN, self.speed_step)
    }

    pub fn front_axis(&self) -> GridAxis {
        GridAxis::new(FRONT_DOMAIN, self.front_step)
    }

    pub fn side_axis(&self) -> GridAxis {
        GridAxis::new(SIDE_DOMAIN, self.side_step)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct DecisionTables {
    grid: LookupGrid,
    speed: GridAxis,
    front: GridAxis,
    side: GridAxis,
    acceleration: Vec<f64>,
    rotation: Vec<f64>,
}

impl DecisionTables {
    fn acceleration(&self, speed: f64, front: f64) -> f64 {
        self.acceleration[self.speed.index(speed) * self.front.count() + self.front.index(front)]
    }

    fn rotation(&self, left: f64, right: f64) -> f64 {
        self.rotation[self.side.index(left) * self.side.count() + self.side.index(right)]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyController {
    speed: InputVariable,
    front: InputVariable,
    left: InputVariable,
    right: InputVariable,
    acceleration: OutputVariable,
    rotation: OutputVariable,
    levels: ActionLevels,
    tables: Option<DecisionTables>,
}

impl FuzzyController {
    /// Decode a 45, 60 or 90 gene genome. Encodings without output shapes use
    /// the default acceleration and rotation triangles.
    pub fn from_genome(genes: &[f64]) -> Result<Self, GenomeError> {
        validate_genome(genes)?;

        let block = |index: usize| decode_block(&genes[index * GENES_PER_VARIABLE..]);
        let (left, right) = match genes.len() {
            TRIMMED_GENOME_LEN => (block(2), block(2)),
            _ => (block(2), block(3)),
        };
        let (acceleration, rotation) = if genes.len() == FULL_GENOME_LEN {
            (block(4), block(5))
        } else {
            (
                decode_block(&DEFAULT_ACCELERATION_GENES),
                decode_block(&DEFAULT_ROTATION_GENES),
            )
        };

        Ok(Self {
            speed: InputVariable {
                domain: SPEED_DOMAIN,
                terms: block(0),
            },
            front: InputVariable {
                domain: FRONT_DOMAIN,
                terms: block(1),
            },
            left: InputVariable {
                domain: SIDE_DOMAIN,
                terms: left,
            },
            right: InputVariable {
                domain: SIDE_DOMAIN,
                terms: right,
            },
            acceleration: OutputVariable {
                universe: ACCELERATION_LEVELS,
                terms: acceleration,
            },
            rotation: OutputVariable {
                universe: ROTATION_LEVELS,
                terms: rotation,
            },
            levels: ActionLevels::standard(),
            tables: None,
        })
    }

    /// Switch the snap levels; an existing decision table is rebuilt.
    pub fn with_levels(mut self, levels: ActionLevels) -> Self {
        self.levels = levels;
        match self.tables.take() {
            Some(tables) => self.with_lookup(tables.grid),
            None => self,
        }
    }

    /// Precompute snapped decisions on `grid` so `predict` becomes a table
    /// lookup.
    pub fn with_lookup(mut self, grid: LookupGrid) -> Self {
        let speed = grid.speed_axis();
        let front = grid.front_axis();
        let side = grid.side_axis();

        let mut acceleration = Vec::with_capacity(speed.count() * front.count());
        for i in 0..speed.count() {
            for j in 0..front.count() {
                acceleration.push(self.snapped_acceleration(speed.value(i), front.value(j)));
            }
        }
        let mut rotation = Vec::with_capacity(side.count() * side.count());
        for i in 0..side.count() {
            for j in 0..side.count() {
                rotation.push(self.snapped_rotation(side.value(i), side.value(j)));
            }
        }

        self.tables = Some(DecisionTables {
            grid,
            speed,
            front,
            side,
            acceleration,
            rotation,
        });
        self
    }

    pub fn has_lookup(&self) -> bool {
        self.tables.is_some()
    }

    /// Continuous acceleration, or `None` when no rule fires.
    pub fn infer_acceleration(&self, speed: f64, front: f64) -> Option<f64> {
        self.acceleration.infer(
            &ACCELERATION_RULES,
            self.speed.fuzzify(speed),
            self.front.fuzzify(front),
        )
    }

    /// Continuous rotation in degrees, or `None` when no rule fires.
    pub fn infer_rotation(&self, left: f64, right: f64) -> Option<f64> {
        self.rotation.infer(
            &ROTATION_RULES,
            self.left.fuzzify(left),
            self.right.fuzzify(right),
        )
    }

    fn snapped_acceleration(&self, speed: f64, front: f64) -> f64 {
        self.infer_acceleration(speed, front)
            .map_or(0.0, |value| snap(value, self.levels.acceleration))
    }

    fn snapped_rotation(&self, left: f64, right: f64) -> f64 {
        self.infer_rotation(left, right)
            .map_or(0.0, |value| snap(value, self.levels.rotation))
    }

    /// Full inference, ignoring any precomputed table.
    pub fn decide_direct(&self, speed: f64, front: f64, left: f64, right: f64) -> Action {
        Action::new(
            self.snapped_acceleration(speed, front),
            self.snapped_rotation(left, right),
        )
    }

    pub fn predict(&self, speed: f64, front: f64, left: f64, right: f64) -> Action {
        match &self.tables {
            Some(tables) => Action::new(
                tables.acceleration(speed, front),
                tables.rotation(left, right),
            ),
            None => self.decide_direct(speed, front, left, right),
        }
    }
}

impl Controller for FuzzyController {
    fn decide(&self, speed: f64, sensors: &Sensors) -> Action {
        self.predict(speed, sensors.front, sensors.left, sensors.right)
    }
}

pub fn validate_genome(genes: &[f64]) -> Result<(), GenomeError> {
    if !matches!(
        genes.len(),
        TRIMMED_GENOME_LEN | INPUT_GENOME_LEN | FULL_GENOME_LEN
    ) {
        return Err(GenomeError::Length {
            actual: genes.len(),
        });
    }
    if let Some(index) = genes.iter().position(|gene| !gene.is_finite()) {
        return Err(GenomeError::NonFinite { index });
    }
    for (term, triple) in genes.chunks_exact(GENES_PER_TERM).enumerate() {
        let (a, b, c) = (triple[0], triple[1], triple[2]);
        if a > b || b > c {
            return Err(GenomeError::InvertedTriangle {
                index: term * GENES_PER_TERM,
                a,
                b,
                c,
            });
        }
    }
    Ok(())
}

fn decode_block(genes: &[f64]) -> [Triangle; TERMS_PER_VARIABLE] {
    std::array::from_fn(|term| {
        let base = term * GENES_PER_TERM;
        Triangle::new(genes[base], genes[base + 1], genes[base + 2])
    })
}
