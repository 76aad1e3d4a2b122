mod fixture;
mod renderer;

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use fixture::Fixture;
use ratatui::DefaultTerminal;
use relay_interface::RawChunk;
use transcript::{EngineConfig, TranscriptEngine};

#[derive(clap::Parser)]
#[command(name = "replay", about = "Replay a relay chunk fixture in the terminal")]
struct Args {
    #[arg(short, long, default_value_t = Fixture::AgentWords)]
    fixture: Fixture,

    #[arg(short, long, default_value_t = 400)]
    speed: u64,
}

struct App {
    chunks: Vec<RawChunk>,
    position: usize,
    paused: bool,
    speed_ms: u64,
    engine: TranscriptEngine,
    fixture_name: String,
}

impl App {
    fn new(chunks: Vec<RawChunk>, speed_ms: u64, fixture_name: String) -> Self {
        Self {
            chunks,
            position: 0,
            paused: false,
            speed_ms,
            engine: TranscriptEngine::new(EngineConfig::default()),
            fixture_name,
        }
    }

    fn total(&self) -> usize {
        self.chunks.len()
    }

    fn seek_to(&mut self, target: usize) {
        let target = target.min(self.total());
        self.engine = TranscriptEngine::new(EngineConfig::default());
        self.position = 0;
        let now = Instant::now();
        for i in 0..target {
            self.engine.apply_chunk(&self.chunks[i], now);
        }
        self.position = target;
    }

    fn advance(&mut self) -> bool {
        if self.position >= self.total() {
            return false;
        }
        self.engine
            .apply_chunk(&self.chunks[self.position], Instant::now());
        self.position += 1;
        true
    }

    fn is_done(&self) -> bool {
        self.position >= self.total()
    }
}

fn main() {
    use clap::Parser;
    let args = Args::parse();
    let fixture = args.fixture;
    let speed_ms = args.speed;
    let fixture_name = fixture.to_string();

    let chunks = fixture.chunks();

    let mut terminal = ratatui::init();
    let result = run(&mut terminal, chunks, speed_ms, fixture_name.clone());
    ratatui::restore();

    match result {
        Ok(app) => {
            let snapshot = app.engine.snapshot();
            println!(
                "Done. {} settled turns from {} chunks ({} fixture).",
                snapshot.finalized.len(),
                app.total(),
                fixture_name,
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(
    terminal: &mut DefaultTerminal,
    chunks: Vec<RawChunk>,
    speed_ms: u64,
    fixture_name: String,
) -> std::io::Result<App> {
    let mut app = App::new(chunks, speed_ms, fixture_name);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| renderer::render(frame, &app))?;

        let tick_duration = Duration::from_millis(app.speed_ms);
        let elapsed = last_tick.elapsed();
        let timeout = tick_duration.saturating_sub(elapsed);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char(' ') => {
                        app.paused = !app.paused;
                        last_tick = Instant::now();
                    }
                    KeyCode::Right => {
                        app.seek_to(app.position + 1);
                    }
                    KeyCode::Left => {
                        app.seek_to(app.position.saturating_sub(1));
                    }
                    KeyCode::Up => {
                        app.speed_ms = app.speed_ms.saturating_sub(50).max(50);
                    }
                    KeyCode::Down => {
                        app.speed_ms += 50;
                    }
                    KeyCode::Home => {
                        app.seek_to(0);
                    }
                    KeyCode::End => {
                        let total = app.total();
                        app.seek_to(total);
                    }
                    _ => {}
                }
            }
        } else if !app.paused {
            if last_tick.elapsed() >= tick_duration {
                app.advance();
                last_tick = Instant::now();

                if app.is_done() {
                    terminal.draw(|frame| renderer::render(frame, &app))?;
                    app.paused = true;
                }
            }
        }
    }

    Ok(app)
}
