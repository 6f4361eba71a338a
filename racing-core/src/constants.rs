//! Simulation constants shared by the controller, vehicle and GA.
//!
//! Screen-space convention: x grows right, y grows down, headings are in
//! degrees and increase counter-clockwise, so forward is `(cos, -sin)`.

// Input variable domains
pub const SPEED_DOMAIN: (f64, f64) = (0.0, 2.0);
pub const FRONT_DOMAIN: (f64, f64) = (0.0, 500.0);
pub const SIDE_DOMAIN: (f64, f64) = (0.0, 300.0);

// Output universes; also the standard snap levels
pub const ACCELERATION_LEVELS: [f64; 5] = [-2.0, -1.0, 0.0, 0.1, 0.2];
pub const ROTATION_LEVELS: [f64; 5] = [-4.0, -2.0, 0.0, 2.0, 4.0];

// Simplified variant snap levels
pub const COARSE_ACCELERATION_LEVELS: [f64; 2] = [-0.2, 0.2];
pub const COARSE_ROTATION_LEVELS: [f64; 3] = [-2.0, 0.0, 2.0];

pub const TERMS_PER_VARIABLE: usize = 5;
pub const GENES_PER_TERM: usize = 3;
pub const GENES_PER_VARIABLE: usize = TERMS_PER_VARIABLE * GENES_PER_TERM;

/// Gene counts accepted by the controller: speed/front/side, speed/front/left/right,
/// and the full encoding with both output variables.
pub const TRIMMED_GENOME_LEN: usize = 3 * GENES_PER_VARIABLE;
pub const INPUT_GENOME_LEN: usize = 4 * GENES_PER_VARIABLE;
pub const FULL_GENOME_LEN: usize = 6 * GENES_PER_VARIABLE;

pub const DEFAULT_ACCELERATION_GENES: [f64; GENES_PER_VARIABLE] = [
    -2.0, -2.0, -1.5, // DB
    -1.7, -1.0, -0.2, // DS
    -0.4, 0.0, 0.1, // Z
    0.05, 0.1, 0.15, // AS
    0.12, 0.2, 0.2, // AB
];

pub const DEFAULT_ROTATION_GENES: [f64; GENES_PER_VARIABLE] = [
    -4.0, -4.0, -2.0, // RB
    -4.0, -2.0, 0.0, // RS
    -2.0, 0.0, 2.0, // Z
    0.0, 2.0, 4.0, // LS
    2.0, 4.0, 4.0, // LB
];

/// Hand-tuned speed/front/side membership shapes.
pub const REFERENCE_GENOME: [f64; TRIMMED_GENOME_LEN] = [
    0.0, 0.0, 0.1, 0.05, 0.3, 0.5, 0.4, 0.6, 0.9, 0.8, 1.2, 1.5, 1.4, 2.0, 2.0, // speed
    0.0, 0.0, 3.0, 2.0, 8.0, 12.0, 10.0, 50.0, 90.0, 80.0, 120.0, 250.0, 200.0, 500.0,
    500.0, // front
    0.0, 0.0, 3.0, 2.0, 8.0, 12.0, 10.0, 20.0, 30.0, 25.0, 120.0, 200.0, 180.0, 300.0,
    300.0, // side
];

/// Genes pinned to the domain edges in the 45-gene layout.
pub const TRIMMED_FIXED_INDICES: [usize; 12] = [0, 1, 13, 14, 15, 16, 28, 29, 30, 31, 43, 44];

// Decision table grid
pub const SPEED_GRID_STEP: f64 = 0.2;
pub const FRONT_GRID_STEP: f64 = 20.0;
pub const SIDE_GRID_STEP: f64 = 20.0;

// Vehicle
pub const DEFAULT_MAX_SPEED: f64 = 2.0;
pub const SENSOR_RANGE: f64 = 1000.0;
pub const SENSOR_OFFSETS_DEG: [f64; 3] = [0.0, 90.0, -90.0]; // front, left, right
pub const BODY_RADIUS: f64 = 10.0;
pub const BODY_WING_RAD: f64 = 2.5;

// Player input
pub const PLAYER_ROTATION_STEP_DEG: f64 = 4.0;
pub const PLAYER_ACCELERATION_STEP: f64 = 0.2;

// GA defaults
pub const DEFAULT_MUTATION_RATE: f64 = 0.1;
pub const DEFAULT_MUTATION_SCALE: f64 = 0.1;
