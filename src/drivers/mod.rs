//! Output drivers, the pattern table, and worker helpers.

pub mod buzzer;
pub mod patterns;
pub mod pwm;
pub mod rgb;
pub mod task;
