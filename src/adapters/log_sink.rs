//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing engine events to the ESP-IDF
//! logger (UART / USB-CDC in production).  A display or network status
//! adapter implements the same trait.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

fn opt(v: Option<f32>) -> String {
    v.map_or_else(|| "--".to_string(), |v| format!("{:.1}", v))
}

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Status(s) => {
                info!(
                    "STATUS | {} | mode={} target={} | chamber={} intake={} \
                     ambient={}\u{00b0}C/{}% | vent={} | fan={}% rpm={} | fault={}",
                    s.engine_state,
                    s.mode,
                    opt(s.active_target_c),
                    opt(s.chamber_c),
                    opt(s.intake_c),
                    opt(s.ambient_c),
                    opt(s.humidity_pct),
                    s.vent_state,
                    s.fan_duty_percent,
                    s.fan_rpm.map_or_else(|| "--".to_string(), |r| r.to_string()),
                    s.fault_active,
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            AppEvent::ModeChanged { mode, target_c } => {
                info!(
                    "MODE | {} target={}",
                    mode.unwrap_or("Idle"),
                    opt(*target_c)
                );
            }
            AppEvent::VentChanged(state) => {
                info!("VENT | {}", state.label());
            }
            AppEvent::CalibrationComplete => {
                info!("VENT | calibration complete");
            }
            AppEvent::FaultAsserted { differential_c } => {
                error!("FAULT | intake hotter than chamber by {:.1}\u{00b0}C", differential_c);
            }
            AppEvent::FaultCleared { differential_c } => {
                info!("FAULT | cleared, differential {:.1}\u{00b0}C", differential_c);
            }
            AppEvent::CooldownProgress {
                duty,
                rate_c_per_min,
                progress,
                remaining_secs,
            } => {
                info!(
                    "COOLDOWN | duty={} rate={:.2}\u{00b0}C/min progress={:.0}% eta={}",
                    duty,
                    rate_c_per_min,
                    progress * 100.0,
                    if *remaining_secs < 0 {
                        "--".to_string()
                    } else {
                        format!("{}s", remaining_secs)
                    }
                );
            }
            AppEvent::CooldownFinished => {
                info!("COOLDOWN | target reached");
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state.name());
            }
            AppEvent::CommandRejected(e) => {
                warn!("COMMAND | rejected: {}", e);
            }
        }
    }
}
