use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{prelude::Backend, Terminal};

use sweep_bot::app::App;
use sweep_bot::logging;
use sweep_bot::robot::config::{self, RunConfig, ServiceConfig};
use sweep_bot::robot::TaskState;
use sweep_bot::station::CleaningService;
use sweep_bot::terminal::TerminalSession;
use sweep_bot::ui::map_renderer::render_app;
use sweep_bot::world::{ObstacleLayout, Position};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutKind {
    Empty,
    Demo,
    Random,
    Perlin,
}

/// Simulated cleaning robot on a partially observed grid
#[derive(Parser, Debug)]
#[command(name = "sweep-bot")]
struct Args {
    /// Side length of the square grid
    #[arg(long, default_value_t = config::DEFAULT_GRID_SIZE)]
    size: usize,

    /// Battery capacity in steps
    #[arg(long, default_value_t = config::DEFAULT_BATTERY_CAPACITY)]
    capacity: u32,

    /// Charge at or below which the robot heads home
    #[arg(long, default_value_t = config::DEFAULT_LOW_BATTERY_THRESHOLD)]
    low_battery: u32,

    /// Start column
    #[arg(long, default_value_t = 0)]
    start_x: i32,

    /// Start row
    #[arg(long, default_value_t = 0)]
    start_y: i32,

    /// How obstacles are placed
    #[arg(long, value_enum, default_value_t = LayoutKind::Random)]
    layout: LayoutKind,

    /// Obstacle count for the random layout
    #[arg(long, default_value_t = config::DEFAULT_RANDOM_OBSTACLES)]
    obstacles: usize,

    /// Seed for random and perlin layouts
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation speed multiplier; 0 removes all delays
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Stop after one run instead of starting a new one
    #[arg(long)]
    once: bool,

    /// Print status snapshots as JSON lines instead of drawing the UI
    #[arg(long)]
    headless: bool,

    /// Include planner debug output in the log pane
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        let obstacles = match self.layout {
            LayoutKind::Empty => ObstacleLayout::Empty,
            LayoutKind::Demo => config::demo_layout(),
            LayoutKind::Random => ObstacleLayout::Random {
                count: self.obstacles,
                seed: self.seed,
            },
            LayoutKind::Perlin => ObstacleLayout::Perlin {
                seed: self.seed.unwrap_or_else(rand::random) as u32,
                threshold: 0.35,
            },
        };
        let run = RunConfig {
            grid_size: self.size,
            start: Position::new(self.start_x, self.start_y),
            battery_capacity: self.capacity,
            low_battery_threshold: self.low_battery,
            obstacles,
            ..RunConfig::default()
        }
        .with_speed(self.speed);

        ServiceConfig {
            run,
            continuous: !(self.once || self.headless),
            ..ServiceConfig::default()
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    logging::setup_logging(args.verbose)?;
    log::info!("Application starting...");

    let config = args.service_config();
    if args.headless {
        return run_headless(config);
    }

    let mut app = App::new(config)?;
    let mut session = TerminalSession::enter()?;
    let result = run_app(&mut app, session.terminal());
    app.shutdown()?;
    result
}

fn run_app<B: Backend>(app: &mut App, terminal: &mut Terminal<B>) -> Result<()> {
    let tick_rate = Duration::from_millis(100);

    while !app.should_quit() {
        app.update()?;
        terminal.draw(|frame| {
            let area = frame.area();
            render_app(frame, area, app);
        })?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.request_quit(),
                    KeyCode::Char('s') => app.toggle()?,
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// One run, one JSON snapshot per line on stdout.
fn run_headless(config: ServiceConfig) -> Result<()> {
    let service = CleaningService::new(config);
    let stream = service.status_stream();
    service.start()?;

    for snapshot in stream {
        println!("{}", serde_json::to_string(&snapshot)?);
        if matches!(snapshot.task, TaskState::Idle | TaskState::Stopped) {
            break;
        }
    }
    service.stop()?;
    Ok(())
}
