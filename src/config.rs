use crate::growth::DEFAULT_WEATHER_PERIOD;
use crate::layout::LayoutConfig;
use crate::settings::Settings;
use crate::themes::theme_index;
use crate::tree::DEFAULT_GROWTH_SPEED_MS;
use std::time::Duration;

pub const MIN_SPEED_MS: u64 = 100;
pub const MAX_SPEED_MS: u64 = 10_000;
/// Step used by the +/- keys.
pub const SPEED_STEP_MS: u64 = 250;

pub fn clamp_speed(ms: u64) -> u64 {
    ms.clamp(MIN_SPEED_MS, MAX_SPEED_MS)
}

/// Everything needed to set up a store, a scheduler and a front end.
#[derive(Clone, Debug)]
pub struct GroveConfig {
    pub growth_speed_ms: u64,
    pub weather_period: Duration,
    pub seed: Option<u64>,
    pub layout: LayoutConfig,
    pub theme: usize,
    /// Start the automatic grower right away.
    pub auto_start: bool,
}

impl GroveConfig {
    /// Defaults overlaid with the settings file. CLI flags are applied on top by the caller.
    pub fn from_settings(settings: &Settings) -> Self {
        let sim = &settings.simulation;
        Self {
            growth_speed_ms: clamp_speed(sim.growth_speed_ms.unwrap_or(DEFAULT_GROWTH_SPEED_MS)),
            weather_period: sim
                .weather_period_ms
                .map_or(DEFAULT_WEATHER_PERIOD, |ms| Duration::from_millis(ms.max(MIN_SPEED_MS))),
            seed: sim.seed,
            layout: settings.layout_config(),
            theme: settings.theme.name.as_deref().and_then(theme_index).unwrap_or(0),
            auto_start: false,
        }
    }

    pub fn growth_interval(&self) -> Duration {
        Duration::from_millis(self.growth_speed_ms)
    }
}

/// Headless run: grow for a number of ticks, then print the result.
#[derive(Clone, Debug)]
pub struct SimulateConfig {
    pub grove: GroveConfig,
    pub ticks: u32,
    pub json: bool,
    pub width: u16,
    pub height: u16,
}
