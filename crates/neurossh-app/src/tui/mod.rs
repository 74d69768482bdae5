//! Terminal UI: setup/teardown and the display loop.
//!
//! Key presses are read on a dedicated thread and handed over an mpsc
//! channel. The loop wakes at least once per poll interval to pick up bridge
//! output, and never waits on the network itself.

pub mod keymap;
pub mod render;
pub mod state;

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

pub use state::{App, Focus, SidebarEntry};

enum UiEvent {
    Key(event::KeyEvent),
    Resize,
}

/// Take over the terminal and run until the user quits
pub fn run(app: App, poll_interval: Duration) -> Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    // Lets Ctrl+H arrive as a chord instead of Backspace where supported
    let enhanced = stdout
        .execute(PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES))
        .is_ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app, poll_interval);

    disable_raw_mode()?;
    if enhanced {
        terminal.backend_mut().execute(PopKeyboardEnhancementFlags)?;
    }
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    poll_interval: Duration,
) -> Result<()> {
    let (event_tx, event_rx) = mpsc::channel::<UiEvent>();
    spawn_input_thread(event_tx);

    terminal.clear()?;
    app.tick();
    terminal.draw(|frame| render::render(&app, frame))?;

    while !app.should_quit() {
        let mut redraw = false;
        match event_rx.recv_timeout(poll_interval) {
            Ok(event) => {
                handle_event(&mut app, event);
                redraw = true;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        // Drain any pending events before redraw
        while let Ok(event) = event_rx.try_recv() {
            handle_event(&mut app, event);
        }

        redraw |= app.tick();
        if redraw {
            terminal.draw(|frame| render::render(&app, frame))?;
        }
    }
    Ok(())
}

fn handle_event(app: &mut App, event: UiEvent) {
    match event {
        UiEvent::Key(key) => {
            if let Some(key) = keymap::from_crossterm(key) {
                app.handle_key(key);
            }
        }
        // The remote size stays fixed; the view just re-lays out
        UiEvent::Resize => {}
    }
}

/// Spawn a thread to read terminal input events.
fn spawn_input_thread(sender: Sender<UiEvent>) {
    std::thread::spawn(move || loop {
        let forwarded = match event::read() {
            Ok(Event::Key(key)) => sender.send(UiEvent::Key(key)),
            Ok(Event::Resize(_, _)) => sender.send(UiEvent::Resize),
            Ok(_) => Ok(()),
            Err(_) => break,
        };
        if forwarded.is_err() {
            break;
        }
    });
}
