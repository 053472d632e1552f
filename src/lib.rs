pub mod campaign;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod mission;
pub mod persistence;
pub mod rng;
pub mod runtime;
pub mod selection;
pub mod tiles;
pub mod web;

pub use campaign::{Autopilot, Campaign};
pub use catalog::Catalog;
pub use config::AppConfig;
pub use engine::{Command, Engine, Transition};
pub use runtime::{Phase, RuntimeSnapshot, SimulationView, Status};
