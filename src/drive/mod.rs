// Drive mapping for the differential-drive RC car
//
// Provides:
// - Two-axis differential mixer (forward + turn -> left/right)
// - Eight-way single stick mapping
// - Velocity ramp toward the motor targets

pub mod joystick;
pub mod kinematics;
mod ramp;

pub use joystick::{eight_way, StickVector};
pub use kinematics::{mix, Axis, AxisSample, AxisState, MotorTarget};
pub use ramp::{MotorActual, Ramp};
