//! Terminal front end: draws the tree and routes key presses to the store and the
//! automatic grower. Also hosts the headless `simulate` mode.

use crate::config::{clamp_speed, GroveConfig, SimulateConfig, SPEED_STEP_MS};
use crate::events::GrowthEvent;
use crate::growth::{GrowthControl, GrowthScheduler, SchedulerState, Weather};
use crate::help::show_help_modal;
use crate::layout::Position;
use crate::terminal::Terminal;
use crate::themes::{Theme, ThemeState};
use crate::tree::{TreeOps, TreeSnapshot, TreeStore, ROOT_ID};
use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::style::Color;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

const HELP: &str = "\
TERMGROVE
─────────────────────────
Tab/Arrows    Select node
Shift+Arrows  Nudge node
g             Grow branches
e             Evolve node
p             Prune subtree
r             Gather resources
a             Auto-growth on/off
Space         Pause auto-growth
+/-           Faster/slower
t             Next theme
R             Reset tree
q/Esc         Quit
?             Close help";

const EVENT_ROWS: usize = 5;
const NOTICE_TTL: Duration = Duration::from_secs(3);
const NEW_HIGHLIGHT: Duration = Duration::from_millis(1200);
const MAX_IDLE: Duration = Duration::from_millis(250);
/// Layout units moved per Shift+arrow.
const NUDGE: f64 = 20.0;
const LABEL_WIDTH: usize = 10;
const COLS_PER_PITCH: f64 = 12.0;
const ROWS_PER_RANK: f64 = 3.0;

#[derive(Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Help,
    Quit,
}

/// What `simulate --json` prints.
#[derive(Serialize)]
struct SimulationReport<'a> {
    weather: Weather,
    tree: TreeSnapshot,
    events: Vec<&'a GrowthEvent>,
}

pub struct Grove {
    store: TreeStore,
    scheduler: GrowthScheduler,
    theme: ThemeState,
    selected: String,
    events: Rc<RefCell<VecDeque<GrowthEvent>>>,
    notice: Option<(String, Instant)>,
    new_since: Option<Instant>,
}

impl Grove {
    /// `log_limit` bounds how many recent growth events are kept for display.
    pub fn new(config: &GroveConfig, log_limit: usize) -> Self {
        let store = TreeStore::new(config.layout.clone(), config.seed);
        let mut scheduler =
            GrowthScheduler::new(config.seed.map(|s| s ^ 0x5eed)).with_weather_period(config.weather_period);

        let events = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&events);
        scheduler.subscribe(Box::new(move |event: &GrowthEvent| {
            let mut log = sink.borrow_mut();
            if log.len() >= log_limit {
                log.pop_front();
            }
            log.push_back(event.clone());
        }));

        let mut grove = Self {
            store,
            scheduler,
            theme: ThemeState::new(config.theme),
            selected: ROOT_ID.to_string(),
            events,
            notice: None,
            new_since: None,
        };
        grove.store.set_growth_speed(config.growth_speed_ms);
        grove
    }

    fn notify(&mut self, message: impl Into<String>, now: Instant) {
        self.notice = Some((message.into(), now));
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.store.growth_speed_ms())
    }

    fn toggle_auto(&mut self, now: Instant) {
        if self.scheduler.is_running() {
            self.scheduler.stop(&mut self.store);
        } else {
            let interval = self.interval();
            self.scheduler.start(&mut self.store, interval, now);
        }
    }

    fn change_speed(&mut self, faster: bool, now: Instant) {
        let current = self.store.growth_speed_ms();
        let next = if faster {
            clamp_speed(current.saturating_sub(SPEED_STEP_MS))
        } else {
            clamp_speed(current + SPEED_STEP_MS)
        };
        self.scheduler.set_speed(&mut self.store, Duration::from_millis(next), now);
        self.notify(format!("Tick every {} ms", next), now);
    }

    fn select_step(&mut self, forward: bool) {
        let nodes = self.store.nodes();
        let idx = nodes.iter().position(|n| n.id == self.selected).unwrap_or(0);
        let next = if forward {
            (idx + 1) % nodes.len()
        } else {
            (idx + nodes.len() - 1) % nodes.len()
        };
        self.selected = nodes[next].id.clone();
    }

    fn nudge(&mut self, dx: f64, dy: f64) {
        if let Some(pos) = self.store.node(&self.selected).map(|n| n.position) {
            self.store.set_position(&self.selected, Position::new(pos.x + dx, pos.y + dy));
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, now: Instant) -> KeyOutcome {
        let shift = modifiers.contains(KeyModifiers::SHIFT);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyOutcome::Quit,
            KeyCode::Char('?') => return KeyOutcome::Help,

            KeyCode::Char('g') => match self.store.try_grow_branch(&self.selected, true) {
                Ok(ids) => self.notify(format!("{} new branch(es)", ids.len()), now),
                Err(err) => self.notify(err.to_string(), now),
            },
            KeyCode::Char('e') => match self.store.try_evolve_node(&self.selected) {
                Ok(stage) => self.notify(format!("Node {} is now a {}", self.selected, stage), now),
                Err(err) => self.notify(err.to_string(), now),
            },
            KeyCode::Char('p') => match self.store.try_prune_node(&self.selected) {
                Ok(removed) => {
                    self.notify(format!("Pruned {} node(s)", removed), now);
                    self.selected = ROOT_ID.to_string();
                }
                Err(err) => self.notify(err.to_string(), now),
            },
            KeyCode::Char('r') => {
                self.store.add_resources();
                self.notify("Gathered sunlight and water", now);
            }

            KeyCode::Char('a') => self.toggle_auto(now),
            KeyCode::Char(' ') => {
                self.scheduler.toggle_pause(&mut self.store);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.change_speed(true, now),
            KeyCode::Char('-') | KeyCode::Char('_') => self.change_speed(false, now),

            KeyCode::Char('t') => {
                self.theme.cycle();
                self.notify(format!("Theme: {}", self.theme.current().name), now);
            }
            KeyCode::Char('R') => {
                self.scheduler.stop(&mut self.store);
                self.store.reset();
                self.selected = ROOT_ID.to_string();
                self.notify("Back to a single seed", now);
            }

            KeyCode::Left if shift => self.nudge(-NUDGE, 0.0),
            KeyCode::Right if shift => self.nudge(NUDGE, 0.0),
            KeyCode::Up if shift => self.nudge(0.0, -NUDGE),
            KeyCode::Down if shift => self.nudge(0.0, NUDGE),
            KeyCode::Tab | KeyCode::Right | KeyCode::Down => self.select_step(true),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Up => self.select_step(false),
            _ => {}
        }
        KeyOutcome::Continue
    }

    /// Run due timers and expire transient UI state. Returns how long the caller may idle.
    pub fn update(&mut self, now: Instant) -> Duration {
        let deadline = self.scheduler.poll(&mut self.store, now);

        if self.store.node(&self.selected).is_none() {
            self.selected = ROOT_ID.to_string();
        }
        if self.notice.as_ref().map_or(false, |(_, at)| now.duration_since(*at) > NOTICE_TTL) {
            self.notice = None;
        }

        let has_new = self.store.nodes().iter().any(|n| n.is_new);
        match self.new_since {
            None if has_new => self.new_since = Some(now),
            Some(since) if now.duration_since(since) > NEW_HIGHLIGHT => {
                self.store.acknowledge_new();
                self.new_since = None;
            }
            _ => {}
        }

        deadline
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or(MAX_IDLE)
            .min(MAX_IDLE)
    }

    pub fn draw(&self, term: &mut Terminal) {
        term.clear();
        let (width, height) = term.size();
        let theme = self.theme.current();

        self.draw_status(term, theme);

        let tree_top = 2;
        let tree_bottom = (height as i32 - EVENT_ROWS as i32 - 1).max(tree_top + 1);
        let area = Area {
            x: 1,
            y: tree_top,
            width: (width as i32 - 2).max(1),
            height: tree_bottom - tree_top,
        };
        self.draw_tree(term, theme, &area);

        let log = self.events.borrow();
        let shown = log.len().min(EVENT_ROWS);
        for (row, event) in log.iter().skip(log.len() - shown).enumerate() {
            term.set_str(1, tree_bottom + 1 + row as i32, &event.to_string(), Some(Color::DarkGrey), false);
        }
    }

    fn draw_status(&self, term: &mut Terminal, theme: &Theme) {
        let sim = match self.scheduler.state(&self.store) {
            SchedulerState::Stopped => "auto off".to_string(),
            SchedulerState::Running => format!("auto {}ms", self.store.growth_speed_ms()),
            SchedulerState::Paused => "paused".to_string(),
        };
        let status = format!(
            "Sun [{}] {:>3}  Water [{}] {:>3}  Score {}  Weather {}  {}  {}",
            gauge(self.store.sunlight(), 10),
            self.store.sunlight(),
            gauge(self.store.water(), 10),
            self.store.water(),
            self.store.score(),
            self.scheduler.weather(),
            sim,
            theme.name,
        );
        term.set_str(1, 0, &status, Some(theme.accent), true);

        let line = match &self.notice {
            Some((message, _)) => message.clone(),
            None => match self.store.node(&self.selected) {
                Some(n) => format!("Selected {} \"{}\" ({}, energy {})  ? for help", n.id, n.label, n.stage, n.energy),
                None => String::new(),
            },
        };
        term.set_str(1, 1, &line, Some(Color::Grey), false);
    }

    fn draw_tree(&self, term: &mut Terminal, theme: &Theme, area: &Area) {
        let layout = self.store.layout_config();
        let centers: Vec<(f64, f64)> = self
            .store
            .nodes()
            .iter()
            .map(|n| (n.position.x + layout.node_width / 2.0, n.position.y + layout.node_height / 2.0))
            .collect();
        let mapper = CellMapper::fit(&centers, area, layout.column_pitch(), layout.rank_pitch());
        let cell_of = |id: &str| {
            self.store
                .nodes()
                .iter()
                .position(|n| n.id == id)
                .map(|i| mapper.cell(centers[i]))
        };

        for edge in self.store.edges() {
            if let (Some(from), Some(to)) = (cell_of(&edge.source), cell_of(&edge.target)) {
                let color = if edge.is_new { theme.accent } else { theme.branch };
                term.draw_line(from, to, Some(color));
            }
        }

        for (node, &center) in self.store.nodes().iter().zip(&centers) {
            let (x, y) = mapper.cell(center);
            let label: String = node.label.chars().take(LABEL_WIDTH - 2).collect();
            term.set_str(x + 2, y, &label, Some(Color::DarkGrey), false);
        }

        for (node, &center) in self.store.nodes().iter().zip(&centers) {
            let (x, y) = mapper.cell(center);
            let color = if node.is_new { theme.accent } else { theme.color(node.stage) };
            term.set(x, y, theme.glyph(node.stage), Some(color), node.is_new);
            if node.id == self.selected {
                term.set(x - 1, y, '[', Some(Color::White), true);
                term.set(x + 1, y, ']', Some(Color::White), true);
            }
        }
    }
}

/// Terminal region the tree is drawn into.
struct Area {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

/// Scales layout coordinates into an `Area`, capped so ranks and columns never
/// spread wider than a comfortable number of cells.
struct CellMapper {
    min_x: f64,
    min_y: f64,
    scale_x: f64,
    scale_y: f64,
    origin_x: f64,
    origin_y: f64,
}

impl CellMapper {
    fn fit(centers: &[(f64, f64)], area: &Area, column_pitch: f64, rank_pitch: f64) -> Self {
        let min_x = centers.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let max_x = centers.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let min_y = centers.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let max_y = centers.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
        if !min_x.is_finite() {
            return Self { min_x: 0.0, min_y: 0.0, scale_x: 0.0, scale_y: 0.0, origin_x: area.x as f64, origin_y: area.y as f64 };
        }

        let usable_w = (area.width - LABEL_WIDTH as i32 - 1).max(0) as f64;
        let usable_h = (area.height - 1).max(0) as f64;
        let span_x = max_x - min_x;
        let span_y = max_y - min_y;

        let scale_x = if span_x > 0.0 { (COLS_PER_PITCH / column_pitch).min(usable_w / span_x) } else { 0.0 };
        let scale_y = if span_y > 0.0 { (ROWS_PER_RANK / rank_pitch).min(usable_h / span_y) } else { 0.0 };

        Self {
            min_x,
            min_y,
            scale_x,
            scale_y,
            origin_x: area.x as f64 + 1.0 + (usable_w - span_x * scale_x) / 2.0,
            origin_y: area.y as f64 + (usable_h - span_y * scale_y) / 2.0,
        }
    }

    fn cell(&self, (x, y): (f64, f64)) -> (i32, i32) {
        (
            (self.origin_x + (x - self.min_x) * self.scale_x).round() as i32,
            (self.origin_y + (y - self.min_y) * self.scale_y).round() as i32,
        )
    }
}

fn gauge(value: u32, width: usize) -> String {
    let filled = (value as usize * width / 100).min(width);
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}

/// Interactive session on the alternate screen.
pub fn run(config: GroveConfig) -> io::Result<()> {
    let mut grove = Grove::new(&config, EVENT_ROWS);
    let mut term = Terminal::new()?;

    if config.auto_start {
        grove.toggle_auto(Instant::now());
    }

    loop {
        let idle = grove.update(Instant::now());
        term.refresh_size()?;
        grove.draw(&mut term);
        term.render()?;

        if let Some((code, modifiers)) = term.wait_key(idle)? {
            match grove.handle_key(code, modifiers, Instant::now()) {
                KeyOutcome::Quit => break,
                KeyOutcome::Help => {
                    if show_help_modal(&mut term, HELP, grove.theme.current().accent)? {
                        break;
                    }
                }
                KeyOutcome::Continue => {}
            }
        }
    }

    grove.scheduler.stop(&mut grove.store);
    Ok(())
}

/// Headless run on a synthetic clock: one poll per tick interval.
pub fn simulate<W: Write>(config: &SimulateConfig, out: &mut W) -> io::Result<()> {
    let mut grove = Grove::new(&config.grove, usize::MAX);
    let interval = config.grove.growth_interval();
    let start = Instant::now();

    grove.toggle_auto(start);
    for i in 1..=config.ticks {
        grove.scheduler.poll(&mut grove.store, start + interval * i);
    }
    tracing::info!(
        ticks = config.ticks,
        nodes = grove.store.nodes().len(),
        score = grove.store.score(),
        "simulation finished"
    );

    if config.json {
        let log = grove.events.borrow();
        let report = SimulationReport {
            weather: grove.scheduler.weather(),
            tree: grove.store.snapshot(),
            events: log.iter().collect(),
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    let mut term = Terminal::headless(config.width, config.height);
    grove.draw(&mut term);
    term.write_ansi(out)?;
    for event in grove.events.borrow().iter() {
        writeln!(out, "{}", event)?;
    }
    Ok(())
}
