//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements    | Connects to                         |
//! |------------|---------------|-------------------------------------|
//! | `hardware` | SensorPort    | 1-Wire probes, DHT22, fan tach      |
//! |            | ActuatorPort  | vent servo PWM, fan PWM + power pin |
//! | `log_sink` | EventSink     | Serial log output                   |
//! | `nvs`      | ModeStorePort | NVS / in-memory store               |
//! |            | ConfigPort    |                                     |
//! | `time`     | -             | ESP32 system timer                  |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
