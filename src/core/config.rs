use crate::math::{to_radians, Vector2};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Maximum number of vertices on a convex polygon
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Maximum number of contact points in a single manifold
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of manifolds a single contact may carry
pub const MAX_MANIFOLDS: usize = 2;

/// Iteration cap for the GJK distance routine
pub const MAX_GJK_ITERATIONS: usize = 20;

/// Iteration cap for conservative advancement
pub const MAX_TOI_ITERATIONS: usize = 20;

/// Collision and constraint tolerance in meters
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular tolerance in radians
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Shapes are shrunk by this much for continuous collision
pub const TOI_SLOP: f32 = 8.0 * LINEAR_SLOP;

/// Minimum rope length on either side of a pulley
pub const MIN_PULLEY_LENGTH: f32 = 2.0;

/// Default proxy pool size of the broad phase
pub const DEFAULT_MAX_PROXIES: usize = 512;

/// Largest proxy pool addressable by 16-bit proxy ids
pub const MAX_PROXY_LIMIT: usize = u16::MAX as usize - 1;

/// Configuration parameters for the physics simulation
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Gravity acceleration applied to every dynamic body
    pub gravity: Vector2,

    /// Whether to allow sleeping bodies
    pub allow_sleep: bool,

    /// Whether accumulated impulses from the previous step seed the solver
    pub warm_starting: bool,

    /// Whether the position-correction pass runs after integration
    pub position_correction: bool,

    /// Whether time-of-impact sub-stepping runs after the discrete step
    pub continuous_physics: bool,

    /// Relative approach speed above which restitution is applied
    pub velocity_threshold: f32,

    /// Allowed penetration before position correction kicks in
    pub linear_slop: f32,

    /// Allowed angular error before position correction kicks in
    pub angular_slop: f32,

    /// Amount by which shapes are shrunk for time-of-impact queries
    pub toi_slop: f32,

    /// Maximum linear position correction per iteration
    pub max_linear_correction: f32,

    /// Maximum angular position correction per iteration
    pub max_angular_correction: f32,

    /// Baumgarte factor for contact position correction
    pub contact_baumgarte: f32,

    /// Baumgarte factor used by time-of-impact islands
    pub toi_baumgarte: f32,

    /// Linear speed cap
    pub max_linear_velocity: f32,

    /// Angular speed cap
    pub max_angular_velocity: f32,

    /// The time a body must be inactive before sleeping
    pub time_to_sleep: f32,

    /// The linear velocity threshold below which bodies can sleep
    pub linear_sleep_tolerance: f32,

    /// The angular velocity threshold below which bodies can sleep
    pub angular_sleep_tolerance: f32,

    /// Hard cap on contacts gathered into one time-of-impact island
    pub max_toi_contacts_per_island: usize,

    /// Safety cap on time-of-impact events resolved in a single step
    pub max_toi_iterations_per_step: usize,

    /// Capacity of the broad-phase proxy pool
    pub max_proxies: usize,

    /// Capacity of the broad-phase pair table
    pub max_pairs: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vector2::new(0.0, -10.0),
            allow_sleep: true,
            warm_starting: true,
            position_correction: true,
            continuous_physics: true,
            velocity_threshold: 1.0,
            linear_slop: LINEAR_SLOP,
            angular_slop: ANGULAR_SLOP,
            toi_slop: TOI_SLOP,
            max_linear_correction: 0.2,
            max_angular_correction: to_radians(8.0),
            contact_baumgarte: 0.2,
            toi_baumgarte: 0.75,
            max_linear_velocity: 200.0,
            max_angular_velocity: 250.0,
            time_to_sleep: 0.5,
            linear_sleep_tolerance: 0.01,
            angular_sleep_tolerance: to_radians(2.0),
            max_toi_contacts_per_island: 32,
            max_toi_iterations_per_step: 64,
            max_proxies: DEFAULT_MAX_PROXIES,
            max_pairs: 8 * DEFAULT_MAX_PROXIES,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration with the given gravity and sleep policy
    pub fn new(gravity: Vector2, allow_sleep: bool) -> Self {
        Self {
            gravity,
            allow_sleep,
            ..Self::default()
        }
    }
}

/// Per-step solver parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    /// Time step in seconds
    pub dt: f32,
    /// Inverse time step, zero when `dt` is zero
    pub inv_dt: f32,
    /// `dt` times the inverse of the previous step, used to rescale warm-start impulses
    pub dt_ratio: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

impl TimeStep {
    /// Creates a step description
    pub fn new(dt: f32, velocity_iterations: u32, position_iterations: u32) -> Self {
        Self {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: 1.0,
            velocity_iterations,
            position_iterations,
            warm_starting: true,
        }
    }
}
