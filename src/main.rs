//! Button Simulator - keyboard-driven button input for embedded firmware

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode as CtKeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::Block,
    Frame, Terminal,
};
use std::fs::{self, OpenOptions};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use button_sim::{
    bindings::BindingStore,
    config::{Config, RunMode},
    dispatch::Dispatcher,
    keyboard,
    lifecycle::Lifecycle,
    native::{ButtonBackend, NativeLibrary},
    pipeline::OwnerInbox,
    ui::{
        App, AppState, AppView, BindingList, ButtonPanel, HelpPanel, LogPanel, ModeIndicator,
        StatusBar, ThemeColors,
    },
};

#[derive(Parser)]
#[command(name = "button-sim", version, about = "Simulate firmware buttons from the keyboard")]
struct Cli {
    /// Run mode, overriding the config file
    #[arg(long, value_enum, global = true)]
    mode: Option<RunMode>,

    /// Config file instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Binding table file, overriding the config file
    #[arg(long, global = true)]
    bindings: Option<PathBuf>,

    /// Log file used while the terminal UI is active
    #[arg(long, global = true, default_value = "output/key_events.log")]
    log_file: PathBuf,

    /// Run without the terminal UI, printing audit lines until Ctrl-C
    #[arg(long, global = true)]
    headless: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the simulator (default)
    Run,
    /// Print the binding table
    List,
    /// Bind a button to a new key and save the table
    Rebind {
        /// Button id, e.g. btn1
        id: String,
        /// Single letter
        key: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);
    let tui = matches!(command, Command::Run) && !cli.headless;

    init_logging(tui.then_some(cli.log_file.as_path()))?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            log::warn!("Using default config: {}", e);
            Config::default()
        }),
    };
    if let Some(mode) = cli.mode {
        config.simulator.mode = mode;
    }
    if let Some(bindings) = cli.bindings {
        config.bindings_file = bindings;
    }
    let store = BindingStore::new(config.bindings_file.clone());

    match command {
        Command::List => list(&store),
        Command::Rebind { id, key } => rebind(&store, &id, &key),
        Command::Run => run(config, store, tui),
    }
}

/// stderr by default; `file` keeps log output off the terminal UI
fn init_logging(file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn list(store: &BindingStore) -> Result<()> {
    let table = store.load_or_default();
    println!("{:<10} {:<4} {:<8} channel", "button", "key", "color");
    for binding in table.iter() {
        println!(
            "{:<10} {:<4} {:<8} {}",
            binding.id,
            binding.key,
            binding.color.as_str(),
            binding.channel
        );
    }
    Ok(())
}

fn rebind(store: &BindingStore, id: &str, key: &str) -> Result<()> {
    let mut table = store.load_or_default();
    let key = table.rebind(id, key)?;
    store
        .save(&table)
        .with_context(|| format!("Failed to save bindings to {}", store.path().display()))?;
    log::info!("Bound {} to {}", id, key);
    println!("{} bound to {}", id, key);
    Ok(())
}

fn run(config: Config, store: BindingStore, tui: bool) -> Result<()> {
    let table = store.load_or_default();
    let native = config.native.clone();
    let refresh = config.refresh_interval();

    let mut lifecycle = Lifecycle::new(config.simulator.clone());
    let started = lifecycle.start(
        || {
            let library = NativeLibrary::load(&native.search_paths())?;
            Ok(Arc::new(library) as Arc<dyn ButtonBackend>)
        },
        keyboard::default_source,
    )?;

    let dispatcher = match started.driver.clone() {
        Some(driver) => Dispatcher::with_driver(table, driver),
        None => Dispatcher::new(table),
    };
    let mut app = App::new(dispatcher, &config.ui, started.mode).with_store(store);
    if let Some(reason) = &started.fallback {
        app.mark_degraded(&reason.to_string());
    }

    let result = if tui {
        run_tui(&mut app, &started.inbox, refresh)
    } else {
        run_headless(&mut app, &started.inbox, refresh)
    };

    if let Err(e) = app.save_bindings() {
        log::error!("Failed to save bindings: {}", e);
    }
    if let Err(e) = lifecycle.shutdown() {
        eprintln!("Shutdown incomplete: {}", e);
    }

    if tui {
        println!("\nButton simulator session complete.");
        println!("Mode: {}", app.mode_label());
        println!("Events processed: {}", app.total_events);
        println!("Session duration: {}", app.elapsed_formatted());
    }
    result
}

fn run_headless(app: &mut App, inbox: &OwnerInbox, refresh: Duration) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    println!("Button simulator running in {} mode, Ctrl-C to stop", app.mode_label());
    let mut printed = 0;
    while running.load(Ordering::SeqCst) {
        if let Some(event) = inbox.recv_timeout(refresh) {
            app.process_event(&event);
            app.drain(inbox);
        }
        for entry in app.board.since(printed) {
            println!("{} {}", entry.timestamp(), entry.message);
        }
        printed = app.board.logged();
    }
    Ok(())
}

/// Restores the terminal however the UI loop ends
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), LeaveAlternateScreen);
    }
}

fn run_tui(app: &mut App, inbox: &OwnerInbox, refresh: Duration) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    loop {
        // Everything marshaled so far is dispatched before the frame is drawn.
        app.drain(inbox);
        terminal.draw(|frame| draw(frame, app))?;

        if event::poll(refresh)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, key.modifiers);
                }
            }
        }

        if app.state == AppState::Quitting {
            break;
        }
    }

    terminal.show_cursor()?;
    Ok(())
}

fn handle_key(app: &mut App, code: CtKeyCode, modifiers: KeyModifiers) {
    if code == CtKeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    if app.is_rebinding() {
        match code {
            CtKeyCode::Esc => app.cancel_rebind(),
            CtKeyCode::Tab | CtKeyCode::Down => app.next_rebind_target(),
            // Rejections are already shown as a notice and keep the prompt open.
            CtKeyCode::Char(c) => {
                let _ = app.finish_rebind(c);
            }
            _ => {}
        }
        return;
    }

    match code {
        CtKeyCode::Esc => app.quit(),
        CtKeyCode::F(1) => app.toggle_help(),
        CtKeyCode::F(2) => app.toggle_theme(),
        CtKeyCode::F(3) => app.begin_rebind(),
        _ => {}
    }
}

fn draw(frame: &mut Frame, app: &App) {
    let colors = ThemeColors::from_theme(app.theme);
    let size = frame.area();
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg).fg(colors.fg)),
        size,
    );

    let binding_rows = app.bindings().len() as u16 + 3;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // Mode indicator
            Constraint::Length(3),            // Button states
            Constraint::Length(binding_rows), // Binding list
            Constraint::Min(5),               // Log / help
            Constraint::Length(1),            // Status bar
        ])
        .split(size);

    frame.render_widget(
        ModeIndicator::new(app.mode_label(), app.mode == RunMode::Hardware, colors),
        chunks[0],
    );
    frame.render_widget(ButtonPanel::new(app.bindings(), &app.board, colors), chunks[1]);
    frame.render_widget(BindingList::new(app.bindings(), colors), chunks[2]);

    match app.view {
        AppView::Help => frame.render_widget(HelpPanel::new(colors), chunks[3]),
        AppView::Buttons => frame.render_widget(LogPanel::new(app.board.log(), colors), chunks[3]),
    }

    let elapsed = app.elapsed_formatted();
    let prompt = app.prompt();
    let status = StatusBar::new(app.view.name(), &elapsed, app.total_events, colors)
        .ticks(app.ticks())
        .message(prompt.as_deref().or(app.get_status()));
    frame.render_widget(status, chunks[4]);
}
