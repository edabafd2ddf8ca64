//! Discrete controllers.  Both are pure with respect to hardware: they
//! take readings in and hand commands back for the FSM to publish.

pub mod cooldown;
pub mod hysteresis;
