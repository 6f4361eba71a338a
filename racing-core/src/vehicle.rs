use crate::constants::{
    BODY_RADIUS, BODY_WING_RAD, DEFAULT_MAX_SPEED, PLAYER_ACCELERATION_STEP,
    PLAYER_ROTATION_STEP_DEG, SENSOR_RANGE,
};
use crate::fuzzy::Action;
use crate::geometry::Point;
use crate::track::Track;

/// Decision source for an autonomous vehicle. Implementations must be pure
/// functions of their inputs so vehicles can be ticked in parallel.
pub trait Controller: Send + Sync {
    fn decide(&self, speed: f64, sensors: &Sensors) -> Action;
}

/// Wall distances along the front, left and right sensor rays.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sensors {
    pub front: f64,
    pub left: f64,
    pub right: f64,
}

/// Keyboard snapshot for player-driven vehicles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    pub accelerate: bool,
    pub left: bool,
    pub right: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeathCause {
    /// The last movement crossed a wall.
    Boundary,
    /// The vehicle sits outside the corridor between the polygons.
    OffTrack,
    /// Stationary with no command to move.
    Stalled,
}

impl DeathCause {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boundary => "boundary",
            Self::OffTrack => "off_track",
            Self::Stalled => "stalled",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleState {
    Alive,
    Dead(DeathCause),
}

/// Triangle drawn for a vehicle: nose, then the two rear corners.
pub type VehicleBody = [Point; 3];

enum Pilot {
    Autonomous(Box<dyn Controller>),
    Player,
}

pub struct Vehicle {
    pilot: Pilot,
    position: Point,
    last_position: Point,
    heading_deg: f64,
    speed: f64,
    max_speed: f64,
    sensor_range: f64,
    sensors: Sensors,
    fitness: u32,
    next_checkpoint: usize,
    state: VehicleState,
}

impl Vehicle {
    fn with_pilot(pilot: Pilot, position: Point, heading_deg: f64) -> Self {
        Self {
            pilot,
            position,
            last_position: position,
            heading_deg,
            speed: 0.0,
            max_speed: DEFAULT_MAX_SPEED,
            sensor_range: SENSOR_RANGE,
            sensors: Sensors::default(),
            fitness: 0,
            next_checkpoint: 0,
            state: VehicleState::Alive,
        }
    }

    pub fn autonomous(controller: Box<dyn Controller>, position: Point, heading_deg: f64) -> Self {
        Self::with_pilot(Pilot::Autonomous(controller), position, heading_deg)
    }

    pub fn player(position: Point, heading_deg: f64) -> Self {
        Self::with_pilot(Pilot::Player, position, heading_deg)
    }

    /// Negative or NaN limits are ignored.
    pub fn with_max_speed(mut self, max_speed: f64) -> Self {
        if max_speed >= 0.0 {
            self.max_speed = max_speed;
        }
        self
    }

    pub fn with_sensor_range(mut self, sensor_range: f64) -> Self {
        self.sensor_range = sensor_range;
        self
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn sensors(&self) -> Sensors {
        self.sensors
    }

    pub fn fitness(&self) -> u32 {
        self.fitness
    }

    pub fn next_checkpoint(&self) -> usize {
        self.next_checkpoint
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == VehicleState::Alive
    }

    pub fn death_cause(&self) -> Option<DeathCause> {
        match self.state {
            VehicleState::Alive => None,
            VehicleState::Dead(cause) => Some(cause),
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.pilot, Pilot::Player)
    }

    /// Advance one tick. Returns the body triangle, or `None` once dead.
    ///
    /// Player vehicles ticked through here behave as if no key is held.
    pub fn update(&mut self, track: &Track) -> Option<VehicleBody> {
        self.step(track, KeyState::default())
    }

    /// Advance one tick using `keys` for player vehicles. Autonomous vehicles
    /// ignore the keys.
    pub fn update_with_keys(&mut self, track: &Track, keys: KeyState) -> Option<VehicleBody> {
        self.step(track, keys)
    }

    fn step(&mut self, track: &Track, keys: KeyState) -> Option<VehicleBody> {
        if !self.is_alive() {
            return None;
        }

        self.sensors = track.sense(self.position, self.heading_deg, self.sensor_range);
        self.score_checkpoint(track);

        if track.crossed_boundary(self.last_position, self.position) {
            self.state = VehicleState::Dead(DeathCause::Boundary);
            return None;
        }
        if !track.is_on_track(self.position) {
            self.state = VehicleState::Dead(DeathCause::OffTrack);
            return None;
        }

        self.last_position = self.position;

        match &self.pilot {
            Pilot::Autonomous(controller) => {
                let action = controller.decide(self.speed, &self.sensors);
                if self.speed == 0.0 && action.acceleration <= 0.0 && action.rotation == 0.0 {
                    self.state = VehicleState::Dead(DeathCause::Stalled);
                    return None;
                }
                self.speed = (self.speed + action.acceleration).clamp(0.0, self.max_speed);
                self.heading_deg += action.rotation;
            }
            Pilot::Player => {
                if keys.left {
                    self.heading_deg += PLAYER_ROTATION_STEP_DEG;
                }
                if keys.right {
                    self.heading_deg -= PLAYER_ROTATION_STEP_DEG;
                }
                let delta = if keys.accelerate {
                    PLAYER_ACCELERATION_STEP
                } else {
                    -PLAYER_ACCELERATION_STEP
                };
                self.speed = (self.speed + delta).clamp(0.0, self.max_speed);
            }
        }

        self.position = self.position.project(self.heading_deg, self.speed);
        Some(self.body())
    }

    fn score_checkpoint(&mut self, track: &Track) {
        let Some(checkpoint) = track.checkpoint(self.next_checkpoint) else {
            return;
        };
        if checkpoint.is_crossed_by(self.last_position, self.position) {
            self.next_checkpoint = (self.next_checkpoint + 1) % track.checkpoints.len();
            self.fitness += 1;
        }
    }

    pub fn body(&self) -> VehicleBody {
        let rad = self.heading_deg.to_radians();
        [0.0, BODY_WING_RAD, -BODY_WING_RAD].map(|wing| {
            let angle = rad + wing;
            Point::new(
                self.position.x + angle.cos() * BODY_RADIUS,
                self.position.y - angle.sin() * BODY_RADIUS,
            )
        })
    }
}

impl std::fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vehicle")
            .field("player", &self.is_player())
            .field("position", &self.position)
            .field("heading_deg", &self.heading_deg)
            .field("speed", &self.speed)
            .field("fitness", &self.fitness)
            .field("next_checkpoint", &self.next_checkpoint)
            .field("state", &self.state)
            .finish()
    }
}
