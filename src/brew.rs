//! Caller-side helpers computed from the latest reading: distance to the
//! target weight, brew ratio, and the single-button timer cycle.

use crate::commands::Command;
use crate::types::Reading;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BrewTarget {
    /// Dry coffee dose in grams.
    pub dose_g: Option<f32>,
    /// Beverage weight to stop at.
    pub target_g: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BrewProgress {
    pub remaining_g: Option<f32>,
    pub ratio: Option<f32>,
}

impl BrewTarget {
    pub fn progress(&self, reading: &Reading) -> BrewProgress {
        BrewProgress {
            remaining_g: self.target_g.map(|target| remaining_g(target, reading)),
            ratio: self.dose_g.and_then(|dose| brew_ratio(dose, reading)),
        }
    }

    pub fn reached(&self, reading: &Reading) -> bool {
        matches!(self.target_g, Some(target) if reading.weight_g >= target)
    }
}

/// Grams still to go; negative once the target is passed.
pub fn remaining_g(target_g: f32, reading: &Reading) -> f32 {
    target_g - reading.weight_g
}

/// Beverage-to-dose ratio, `None` without a usable dose or positive weight.
pub fn brew_ratio(dose_g: f32, reading: &Reading) -> Option<f32> {
    if dose_g <= 0.0 {
        return None;
    }
    let ratio = reading.weight_g / dose_g;
    (ratio.is_finite() && ratio > 0.0).then_some(ratio)
}

/// Renders a ratio the way brewers write it, e.g. `1:2.0`.
pub fn format_ratio(ratio: f32) -> String {
    format!("1:{:.1}", ratio)
}

/// Start, stop, then reset: the timer button's three positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerCycle {
    #[default]
    Stopped,
    Running,
    ResetRequired,
}

impl TimerCycle {
    /// Command for the next press and the position it leads to.
    pub fn press(self) -> (Command, TimerCycle) {
        match self {
            TimerCycle::Stopped => (Command::StartTimer, TimerCycle::Running),
            TimerCycle::Running => (Command::StopTimer, TimerCycle::ResetRequired),
            TimerCycle::ResetRequired => (Command::ResetTimer, TimerCycle::Stopped),
        }
    }

    /// Position after a command sent outside the button (tare+start etc).
    pub fn after(self, command: Command) -> TimerCycle {
        match command {
            Command::TareAndStart | Command::StartTimer => TimerCycle::Running,
            Command::StopTimer => TimerCycle::ResetRequired,
            Command::ResetTimer => TimerCycle::Stopped,
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(weight_g: f32) -> Reading {
        Reading {
            elapsed_ms: 0,
            weight_g,
            flow_rate_g_per_s: 0.0,
            battery_percent: 100,
            standby_minutes: 0,
            buzzer_level: 0,
            flow_smoothing: false,
            weight_unit: 0,
            weight_sign: 0,
            flow_sign: 0,
        }
    }

    #[test]
    fn test_remaining() {
        assert_eq!(remaining_g(36.0, &at(30.0)), 6.0);
        assert_eq!(remaining_g(36.0, &at(38.0)), -2.0);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(brew_ratio(18.0, &at(36.0)), Some(2.0));
        assert_eq!(brew_ratio(0.0, &at(36.0)), None);
        assert_eq!(brew_ratio(18.0, &at(0.0)), None);
        assert_eq!(brew_ratio(18.0, &at(-1.0)), None);
        assert_eq!(format_ratio(2.0), "1:2.0");
        assert_eq!(format_ratio(15.96), "1:16.0");
    }

    #[test]
    fn test_progress() {
        let target = BrewTarget {
            dose_g: Some(18.0),
            target_g: Some(36.0),
        };
        assert_eq!(
            target.progress(&at(27.0)),
            BrewProgress {
                remaining_g: Some(9.0),
                ratio: Some(1.5)
            }
        );
        assert!(!target.reached(&at(35.9)));
        assert!(target.reached(&at(36.0)));
        assert!(!BrewTarget::default().reached(&at(100.0)));
    }

    #[test]
    fn test_timer_cycle() {
        let (command, next) = TimerCycle::default().press();
        assert_eq!((command, next), (Command::StartTimer, TimerCycle::Running));
        let (command, next) = next.press();
        assert_eq!((command, next), (Command::StopTimer, TimerCycle::ResetRequired));
        let (command, next) = next.press();
        assert_eq!((command, next), (Command::ResetTimer, TimerCycle::Stopped));

        assert_eq!(TimerCycle::Stopped.after(Command::TareAndStart), TimerCycle::Running);
        assert_eq!(TimerCycle::Running.after(Command::Tare), TimerCycle::Running);
    }
}
