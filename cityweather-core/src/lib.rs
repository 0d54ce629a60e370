//! Core library for the `cityweather` client.
//!
//! This crate defines:
//! - The city query state machine (`controller`) and its view-model
//! - Weather code classification into display categories
//! - Abstraction over remote lookup providers
//! - Configuration handling and shared domain models
//!
//! It is used by `cityweather-cli`, but any other front end can drive a
//! [`CityQueryController`] the same way.

pub mod classify;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod provider;

pub use classify::{Category, classify};
pub use config::{Config, ProviderConfig};
pub use controller::{CityQueryController, Phase, QueryState, RequestHandle, Settled, ViewModel};
pub use error::LookupError;
pub use model::{CityInfo, CurrentWeather, WeatherReport};
pub use provider::{ProviderId, WeatherProvider};
