//! Automatic growth: a tick timer that regenerates resources and performs a weighted
//! random action, and a slower timer that changes the weather.
//!
//! Timers are logical. Whoever owns the event loop calls [`GrowthScheduler::poll`] with
//! the current instant; due callbacks run to completion there, one after another.

use crate::events::{EventBus, GrowthEvent, GrowthEventKind, Listener, SubscriptionId};
use crate::tree::{Stage, TreeOps};
use rand::prelude::*;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_WEATHER_PERIOD: Duration = Duration::from_secs(15);

const BASE_SUN_GAIN: f64 = 5.0;
const BASE_WATER_GAIN: f64 = 3.0;
const BOOST_TARGETS: usize = 3;

/// Most timer firings replayed by a single poll; beyond that the timers skip ahead.
const MAX_CATCH_UP: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Sunny,
    Rainy,
    Cloudy,
    Stormy,
}

impl Weather {
    pub const ALL: [Weather; 4] = [Weather::Sunny, Weather::Rainy, Weather::Cloudy, Weather::Stormy];

    pub fn sun_multiplier(self) -> f64 {
        match self {
            Weather::Sunny => 1.5,
            Weather::Rainy => 0.7,
            Weather::Cloudy => 1.0,
            Weather::Stormy => 0.5,
        }
    }

    pub fn water_multiplier(self) -> f64 {
        match self {
            Weather::Sunny => 0.8,
            Weather::Rainy => 1.5,
            Weather::Cloudy => 1.0,
            Weather::Stormy => 2.0,
        }
    }

    /// Passive (sunlight, water) gained per tick under this weather.
    pub fn regeneration(self) -> (u32, u32) {
        (
            (BASE_SUN_GAIN * self.sun_multiplier()).floor() as u32,
            (BASE_WATER_GAIN * self.water_multiplier()).floor() as u32,
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Weather::Sunny => "sunny",
            Weather::Rainy => "rainy",
            Weather::Cloudy => "cloudy",
            Weather::Stormy => "stormy",
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrowthAction {
    Grow,
    Evolve,
    Gather,
    Boost,
}

impl GrowthAction {
    pub const ALL: [GrowthAction; 4] = [GrowthAction::Grow, GrowthAction::Evolve, GrowthAction::Gather, GrowthAction::Boost];

    pub fn weight(self) -> f64 {
        match self {
            GrowthAction::Grow => 0.35,
            GrowthAction::Evolve => 0.30,
            GrowthAction::Gather => 0.20,
            GrowthAction::Boost => 0.15,
        }
    }

    fn message(self) -> &'static str {
        match self {
            GrowthAction::Grow => "New branch sprouting...",
            GrowthAction::Evolve => "Branch maturing...",
            GrowthAction::Gather => "Gathering nutrients...",
            GrowthAction::Boost => "Growth surge!",
        }
    }
}

/// First action whose cumulative weight reaches `draw` (a uniform sample in [0, 1)).
pub fn pick_weighted_action(draw: f64) -> GrowthAction {
    let mut cumulative = 0.0;
    for action in GrowthAction::ALL {
        cumulative += action.weight();
        if draw <= cumulative {
            return action;
        }
    }
    GrowthAction::ALL[0]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    period: Duration,
    next_due: Instant,
}

impl Interval {
    fn starting_at(now: Instant, period: Duration) -> Self {
        Self { period, next_due: now + period }
    }
}

/// Controls a front end needs from an automatic grower.
pub trait GrowthControl {
    fn start(&mut self, store: &mut dyn TreeOps, interval: Duration, now: Instant);
    fn stop(&mut self, store: &mut dyn TreeOps);
    fn toggle_pause(&mut self, store: &mut dyn TreeOps) -> bool;
    fn set_speed(&mut self, store: &mut dyn TreeOps, interval: Duration, now: Instant);
    /// Run everything due at `now`; returns the next deadline, if any timer is armed.
    fn poll(&mut self, store: &mut dyn TreeOps, now: Instant) -> Option<Instant>;
    fn weather(&self) -> Weather;
    fn is_running(&self) -> bool;
    fn subscribe(&mut self, listener: Listener) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}

/// Holds timers, weather and listeners. All tree data stays in the store it is handed.
pub struct GrowthScheduler {
    tick_timer: Option<Interval>,
    weather_timer: Option<Interval>,
    weather_period: Duration,
    weather: Weather,
    events: EventBus,
    rng: StdRng,
}

impl GrowthScheduler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            tick_timer: None,
            weather_timer: None,
            weather_period: DEFAULT_WEATHER_PERIOD,
            weather: Weather::Sunny,
            events: EventBus::new(),
            rng,
        }
    }

    pub fn with_weather_period(mut self, period: Duration) -> Self {
        self.weather_period = period;
        self
    }

    pub fn state(&self, store: &dyn TreeOps) -> SchedulerState {
        match (self.is_running(), store.is_paused()) {
            (false, _) => SchedulerState::Stopped,
            (true, false) => SchedulerState::Running,
            (true, true) => SchedulerState::Paused,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.tick_timer, self.weather_timer]
            .iter()
            .flatten()
            .map(|t| t.next_due)
            .min()
    }

    fn emit(&mut self, event: GrowthEvent) {
        self.events.emit(&event);
    }

    fn random_target(&mut self, ids: &[String]) -> String {
        ids[self.rng.gen_range(0..ids.len())].clone()
    }

    fn tick(&mut self, store: &mut dyn TreeOps) {
        if store.is_paused() {
            return;
        }

        let (sun, water) = self.weather.regeneration();
        store.regenerate(sun, water);

        let action = pick_weighted_action(self.rng.gen::<f64>());
        let ids: Vec<String> = store.nodes().iter().map(|n| n.id.clone()).collect();
        if ids.is_empty() {
            return;
        }
        tracing::trace!(?action, weather = %self.weather, nodes = ids.len(), "growth tick");

        match action {
            GrowthAction::Grow => {
                let target = self.random_target(&ids);
                if store.grow_branch(&target, true) {
                    self.emit(GrowthEvent::new(GrowthEventKind::Sprout, action.message()).on_node(target));
                }
            }
            GrowthAction::Evolve => {
                let target = self.random_target(&ids);
                if store.evolve_node(&target) {
                    let kind = match store.node(&target).map(|n| n.stage) {
                        Some(Stage::Flower) => GrowthEventKind::Bloom,
                        Some(Stage::Fruit) => GrowthEventKind::Fruit,
                        _ => GrowthEventKind::Evolve,
                    };
                    self.emit(GrowthEvent::new(kind, action.message()).on_node(target));
                }
            }
            GrowthAction::Gather => {
                store.add_resources();
                self.emit(GrowthEvent::new(GrowthEventKind::Boost, action.message()));
            }
            GrowthAction::Boost => {
                for _ in 0..BOOST_TARGETS.min(ids.len()) {
                    let target = self.random_target(&ids);
                    store.evolve_node(&target);
                }
                self.emit(GrowthEvent::new(GrowthEventKind::Boost, action.message()));
            }
        }
    }

    fn change_weather(&mut self) {
        let next = Weather::ALL[self.rng.gen_range(0..Weather::ALL.len())];
        if next == self.weather {
            return;
        }
        self.weather = next;
        tracing::info!(weather = %next, "weather changed");
        self.emit(GrowthEvent::new(GrowthEventKind::Boost, format!("Weather changed to {}!", next)));
    }

    /// Fire one due timer, tick first on equal deadlines. Returns false when nothing is due.
    fn fire_next(&mut self, store: &mut dyn TreeOps, now: Instant) -> bool {
        let tick_due = self.tick_timer.filter(|t| t.next_due <= now).map(|t| t.next_due);
        let weather_due = self.weather_timer.filter(|t| t.next_due <= now).map(|t| t.next_due);

        match (tick_due, weather_due) {
            (Some(t), w) if w.map_or(true, |w| t <= w) => {
                if let Some(timer) = self.tick_timer.as_mut() {
                    timer.next_due += timer.period;
                }
                self.tick(store);
                true
            }
            (_, Some(_)) => {
                if let Some(timer) = self.weather_timer.as_mut() {
                    timer.next_due += timer.period;
                }
                self.change_weather();
                true
            }
            _ => false,
        }
    }
}

impl GrowthControl for GrowthScheduler {
    fn start(&mut self, store: &mut dyn TreeOps, interval: Duration, now: Instant) {
        if self.is_running() {
            self.stop(store);
        }

        store.start_auto_growth();
        store.set_growth_speed(interval.as_millis() as u64);
        self.tick_timer = Some(Interval::starting_at(now, interval));
        self.weather_timer = Some(Interval::starting_at(now, self.weather_period));

        tracing::info!(interval_ms = interval.as_millis() as u64, "growth simulation started");
        self.emit(GrowthEvent::new(GrowthEventKind::Sprout, "Growth simulation started!"));
    }

    fn stop(&mut self, store: &mut dyn TreeOps) {
        if !self.is_running() {
            return;
        }
        self.tick_timer = None;
        self.weather_timer = None;
        store.stop_auto_growth();

        tracing::info!("growth simulation stopped");
        self.emit(GrowthEvent::new(GrowthEventKind::Wither, "Growth simulation paused"));
    }

    fn toggle_pause(&mut self, store: &mut dyn TreeOps) -> bool {
        if self.is_running() {
            store.toggle_pause();
            tracing::info!(paused = store.is_paused(), "growth pause toggled");
        }
        store.is_paused()
    }

    fn set_speed(&mut self, store: &mut dyn TreeOps, interval: Duration, now: Instant) {
        store.set_growth_speed(interval.as_millis() as u64);
        if let Some(tick) = self.tick_timer.as_mut() {
            *tick = Interval::starting_at(now, interval);
            tracing::info!(interval_ms = interval.as_millis() as u64, "growth speed changed");
        }
    }

    fn poll(&mut self, store: &mut dyn TreeOps, now: Instant) -> Option<Instant> {
        let mut fired = 0;
        while fired < MAX_CATCH_UP && self.fire_next(store, now) {
            fired += 1;
        }

        for timer in [self.tick_timer.as_mut(), self.weather_timer.as_mut()].into_iter().flatten() {
            if timer.next_due <= now {
                timer.next_due = now + timer.period;
            }
        }
        self.next_deadline()
    }

    fn weather(&self) -> Weather {
        self.weather
    }

    fn is_running(&self) -> bool {
        self.tick_timer.is_some()
    }

    fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}
