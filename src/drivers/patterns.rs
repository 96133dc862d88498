//! Alert pattern table.
//!
//! Each severity maps to a fixed [`PatternSpec`]: a duration, a waveform
//! giving the RGB intensity at elapsed time `t`, and a buzzer sequence
//! triggered once at `t = 0`.  Specs are pure data; evaluating one never
//! mutates it, so a single table is shared read-only by every execution.
//!
//! ## Signatures
//!
//! | Severity | Duration | Colour                              | Buzzer              |
//! |----------|----------|-------------------------------------|---------------------|
//! | Critical | 10 s     | red pulse, 5 Hz, full depth         | continuous          |
//! | High     | 5 s      | orange breathing, 1 Hz, 0.2–1.0     | 3 × 0.15 s / 0.15 s |
//! | Medium   | 5 s      | blue fade, 0.5 Hz, 0.1–0.8          | silent              |
//! | Low      | 2 s      | steady green at 0.6                 | silent              |

use core::f64::consts::PI;
use std::time::Duration;

use crate::app::commands::Severity;
use crate::drivers::buzzer::BuzzerSequence;
use crate::drivers::pwm::clamp01;
use crate::drivers::rgb::Rgb;

/// Colour as a function of elapsed seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// `level = floor + span · (0.5 + 0.5 · sin(2π · hz · t))`, and each
    /// component is `mix × level`.
    Sine {
        hz: f64,
        floor: f64,
        span: f64,
        mix: Rgb,
    },
    /// Constant colour.
    Steady(Rgb),
}

impl Waveform {
    /// Evaluate at `t` seconds.  Components are clamped to `[0, 1]`.
    pub fn eval(&self, t: f64) -> Rgb {
        match *self {
            Self::Sine { hz, floor, span, mix } => {
                let level = floor + span * (0.5 + 0.5 * (2.0 * PI * hz * t).sin());
                let level = level as f32;
                (
                    clamp01(mix.0 * level),
                    clamp01(mix.1 * level),
                    clamp01(mix.2 * level),
                )
            }
            Self::Steady((r, g, b)) => (clamp01(r), clamp01(g), clamp01(b)),
        }
    }
}

/// Everything needed to render one severity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternSpec {
    pub duration: Duration,
    pub waveform: Waveform,
    pub buzzer: BuzzerSequence,
    /// Real seconds per pattern second (1.0 for the standard table).
    pub time_scale: f64,
}

impl PatternSpec {
    /// Colour at elapsed real time `t`.
    pub fn color_at(&self, t: Duration) -> Rgb {
        self.waveform.eval(t.as_secs_f64() / self.time_scale)
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            duration: self.duration.mul_f64(factor),
            waveform: self.waveform,
            buzzer: self.buzzer.scaled(factor),
            time_scale: self.time_scale * factor,
        }
    }
}

/// The severity → pattern mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTable {
    critical: PatternSpec,
    high: PatternSpec,
    medium: PatternSpec,
    low: PatternSpec,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl PatternTable {
    pub fn standard() -> Self {
        Self {
            critical: PatternSpec {
                duration: Duration::from_secs(10),
                waveform: Waveform::Sine {
                    hz: 5.0,
                    floor: 0.0,
                    span: 1.0,
                    mix: (1.0, 0.0, 0.0),
                },
                buzzer: BuzzerSequence::continuous(Duration::from_secs(10)),
                time_scale: 1.0,
            },
            high: PatternSpec {
                duration: Duration::from_secs(5),
                waveform: Waveform::Sine {
                    hz: 1.0,
                    floor: 0.2,
                    span: 0.8,
                    mix: (1.0, 0.5, 0.0),
                },
                buzzer: BuzzerSequence::new(
                    Duration::from_millis(150),
                    Duration::from_millis(150),
                    3,
                ),
                time_scale: 1.0,
            },
            medium: PatternSpec {
                duration: Duration::from_secs(5),
                waveform: Waveform::Sine {
                    hz: 0.5,
                    floor: 0.1,
                    span: 0.7,
                    mix: (0.0, 0.0, 1.0),
                },
                buzzer: BuzzerSequence::SILENT,
                time_scale: 1.0,
            },
            low: PatternSpec {
                duration: Duration::from_secs(2),
                waveform: Waveform::Steady((0.0, 0.6, 0.0)),
                buzzer: BuzzerSequence::SILENT,
                time_scale: 1.0,
            },
        }
    }

    /// Standard table compressed (`factor < 1`) or stretched in time.
    ///
    /// Non-positive or non-finite factors yield the standard table.
    pub fn with_time_scale(factor: f64) -> Self {
        let table = Self::standard();
        if !(factor.is_finite() && factor > 0.0) {
            return table;
        }
        Self {
            critical: table.critical.scaled(factor),
            high: table.high.scaled(factor),
            medium: table.medium.scaled(factor),
            low: table.low.scaled(factor),
        }
    }

    pub fn get(&self, severity: Severity) -> &PatternSpec {
        match severity {
            Severity::Critical => &self.critical,
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
        }
    }
}
