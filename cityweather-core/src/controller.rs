//! City query state machine.
//!
//! A [`CityQueryController`] owns the [`QueryState`] for one search box.
//! Lookups run on spawned tasks and report back over a channel; the owner of
//! the controller applies them with [`CityQueryController::next_settled`], so
//! state only ever changes on the owner's task. Every `submit` mints a new
//! [`RequestHandle`] and only the completion carrying the latest handle may
//! touch state.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    classify::{Category, classify},
    config::DEFAULT_TIMEOUT_SECS,
    error::LookupError,
    model::{CityInfo, CurrentWeather, WeatherReport},
    provider::WeatherProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Identifies one issued lookup. Handles increase monotonically per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestHandle(u64);

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success(Box<WeatherReport>),
    Error(String),
}

/// Everything the controller knows about the current query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryState {
    city_name: String,
    status: QueryStatus,
}

impl QueryState {
    pub fn city_name(&self) -> &str {
        &self.city_name
    }

    pub fn phase(&self) -> Phase {
        match self.status {
            QueryStatus::Idle => Phase::Idle,
            QueryStatus::Loading => Phase::Loading,
            QueryStatus::Success(_) => Phase::Success,
            QueryStatus::Error(_) => Phase::Error,
        }
    }

    pub fn weather(&self) -> Option<&CurrentWeather> {
        self.report().map(|r| &r.weather)
    }

    pub fn city_info(&self) -> Option<&CityInfo> {
        self.report().map(|r| &r.city)
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            QueryStatus::Error(message) => Some(message),
            _ => None,
        }
    }

    fn report(&self) -> Option<&WeatherReport> {
        match &self.status {
            QueryStatus::Success(report) => Some(report),
            _ => None,
        }
    }
}

/// Read-only snapshot handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub phase: Phase,
    pub city_name: String,
    pub error_message: Option<String>,
    pub weather: Option<CurrentWeather>,
    pub city_info: Option<CityInfo>,
    pub category: Option<Category>,
}

/// Result of applying one completed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// The completion was current and moved the state to this phase.
    Applied(Phase),
    /// The completion belonged to a superseded request and was dropped.
    Stale(RequestHandle),
}

#[derive(Debug)]
struct Completion {
    handle: RequestHandle,
    result: Result<WeatherReport, LookupError>,
}

#[derive(Debug)]
pub struct CityQueryController {
    provider: Arc<dyn WeatherProvider>,
    timeout: Duration,
    state: QueryState,
    pending: Option<RequestHandle>,
    next_id: u64,
    in_flight: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl CityQueryController {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            state: QueryState::default(),
            pending: None,
            next_id: 0,
            in_flight: 0,
            completions_tx,
            completions_rx,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Handle of the lookup whose result is still wanted, if any.
    pub fn pending(&self) -> Option<RequestHandle> {
        self.pending
    }

    /// Number of spawned lookups not yet applied or discarded, stale ones included.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Update the input. Clearing it resets the view to Idle and abandons any
    /// pending lookup.
    pub fn set_city_name(&mut self, name: impl Into<String>) {
        self.state.city_name = name.into();

        if self.state.city_name.is_empty() {
            self.state.status = QueryStatus::Idle;
            if let Some(handle) = self.pending.take() {
                tracing::debug!(request = handle.id(), "input cleared, pending lookup abandoned");
            }
        }
    }

    /// Start a lookup for the current city name. Must be called from within a
    /// tokio runtime. Returns `None` without doing anything when the name is
    /// empty.
    pub fn submit(&mut self) -> Option<RequestHandle> {
        if self.state.city_name.is_empty() {
            return None;
        }

        self.next_id += 1;
        let handle = RequestHandle(self.next_id);
        if let Some(previous) = self.pending.replace(handle) {
            tracing::debug!(
                superseded = previous.id(),
                request = handle.id(),
                "lookup superseded"
            );
        }
        self.state.status = QueryStatus::Loading;
        self.in_flight += 1;

        let provider = Arc::clone(&self.provider);
        let tx = self.completions_tx.clone();
        let city = self.state.city_name.clone();
        let timeout = self.timeout;

        tracing::debug!(request = handle.id(), %city, "lookup started");
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, provider.lookup(&city)).await {
                Ok(result) => result,
                Err(_) => Err(LookupError::TimedOut(timeout)),
            };
            let _ = tx.send(Completion { handle, result });
        });

        Some(handle)
    }

    /// Wait for the next lookup to finish and apply it. Returns `None` right
    /// away when nothing is in flight. Cancel-safe.
    pub async fn next_settled(&mut self) -> Option<Settled> {
        if self.in_flight == 0 {
            return None;
        }

        let completion = self.completions_rx.recv().await?;
        self.in_flight -= 1;
        Some(self.apply(completion))
    }

    /// Drain every in-flight lookup and return the resulting view.
    pub async fn settle_all(&mut self) -> ViewModel {
        while self.next_settled().await.is_some() {}
        self.view_model()
    }

    pub fn view_model(&self) -> ViewModel {
        let weather = self.state.weather().cloned();
        ViewModel {
            phase: self.state.phase(),
            city_name: self.state.city_name.clone(),
            error_message: self.state.error_message().map(str::to_owned),
            category: weather.as_ref().map(|w| classify(w.weather_code)),
            weather,
            city_info: self.state.city_info().cloned(),
        }
    }

    fn apply(&mut self, completion: Completion) -> Settled {
        let Completion { handle, result } = completion;

        if self.pending != Some(handle) {
            tracing::debug!(request = handle.id(), "discarding stale lookup result");
            return Settled::Stale(handle);
        }
        self.pending = None;

        self.state.status = match result {
            Ok(report) => {
                tracing::info!(
                    request = handle.id(),
                    city = %report.city.name,
                    code = report.weather.weather_code,
                    "lookup succeeded"
                );
                QueryStatus::Success(Box::new(report))
            }
            Err(err) => {
                tracing::debug!(request = handle.id(), error = %err, "lookup failed");
                QueryStatus::Error(err.user_message().to_string())
            }
        };

        Settled::Applied(self.state.phase())
    }
}
