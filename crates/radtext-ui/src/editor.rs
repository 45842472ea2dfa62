use crate::app::EditorApp;
use crate::render::draw;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use radtext_core::{EditorSession, KeyValueStore, Result, TextGenerator};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Open the report editor on `session`, optionally backed by `file`
pub fn run_editor<S: KeyValueStore>(
    session: &mut EditorSession<S>,
    generator: &dyn TextGenerator,
    file: Option<PathBuf>,
) -> Result<()> {
    let mut app = EditorApp::new(session, generator, file);
    app.open()?;

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app);

    // Clean up terminal
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop<S: KeyValueStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut EditorApp<S>,
) -> Result<()> {
    // Frame limiter to reduce flickering and CPU usage
    const RENDER_INTERVAL: Duration = Duration::from_millis(33);
    let mut last_render = Instant::now();
    let mut force_render = true;

    while !app.exiting {
        let now = Instant::now();
        if force_render || now.duration_since(last_render) >= RENDER_INTERVAL {
            terminal.draw(|f| draw(f, app))?;
            last_render = now;
            force_render = false;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    app.handle_key_event(key);
                    force_render = true;
                }
                Event::Resize(_, _) => force_render = true,
                _ => {}
            }
        }
    }

    if app.dirty {
        tracing::info!("Editor closed with unsaved changes");
    }
    Ok(())
}
