//! TUI frontend: terminal lifecycle, key handling, rendering.

mod help;
mod state;

use crate::api::SnapshotRepository;
use crate::cli::Cli;
use crate::console::{run_console, ConsoleState, UiCommand};
use crate::model::RunOutcome;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Terminal;
use state::UiState;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the console task.
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let (state_tx, state_rx) = mpsc::unbounded_channel::<ConsoleState>();

    let repo = Arc::new(SnapshotRepository::new(&args.base_url)?);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, state_rx, cmd_tx));

    run_console(
        repo,
        args.limit,
        args.admin_key.clone(),
        args.refresh_on_launch,
        cmd_rx,
        state_tx,
    )
    .await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    Ok(())
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    mut state_rx: UnboundedReceiver<ConsoleState>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        base_url: args.base_url.clone(),
        limit: args.limit,
        key_input: args.admin_key.clone().unwrap_or_default(),
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain console snapshots without blocking to keep the UI responsive.
        while let Ok(console) = state_rx.try_recv() {
            apply_console(&mut state, console);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if state.key_editing {
                    handle_key_entry(&mut state, &cmd_tx, k.code);
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('r')) => {
                        state.info = "Refreshing…".into();
                        let _ = cmd_tx.send(UiCommand::Refresh);
                    }
                    (_, KeyCode::Char('s')) => {
                        state.info = "Run requested…".into();
                        let _ = cmd_tx.send(UiCommand::TriggerRun);
                    }
                    (_, KeyCode::Char('a')) => {
                        state.key_editing = true;
                        state.key_input = state.console.admin_key.clone();
                    }
                    (_, KeyCode::Char('y')) => {
                        copy_selected_checksum(&mut state);
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 1;
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 2;
                    }
                    (_, KeyCode::Esc) => {
                        state.tab = 0;
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => {
                        if state.selected > 0 {
                            state.selected -= 1;
                        }
                    }
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => {
                        if state.selected + 1 < state.console.items.len() {
                            state.selected += 1;
                        }
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Key handling while the admin key field has focus.
fn handle_key_entry(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, code: KeyCode) {
    match code {
        KeyCode::Enter => {
            state.key_editing = false;
            let _ = cmd_tx.send(UiCommand::SetAdminKey(state.key_input.clone()));
            state.info = if state.key_input.trim().is_empty() {
                "Admin key cleared".into()
            } else {
                "Admin key set".into()
            };
        }
        KeyCode::Esc => {
            state.key_editing = false;
            state.key_input = state.console.admin_key.clone();
        }
        KeyCode::Backspace => {
            state.key_input.pop();
        }
        KeyCode::Char(c) => state.key_input.push(c),
        _ => {}
    }
}

/// Fold a controller snapshot into the view, stamping the completion time
/// when a fetch finishes cleanly.
fn apply_console(state: &mut UiState, console: ConsoleState) {
    let fetch_finished = state.console.loading && !console.loading && console.error.is_none();
    if fetch_finished {
        state.fetched_at = Some(now_stamp());
        state.info.clear();
    }
    state.console = console;
    if !state.key_editing {
        state.key_input = state.console.admin_key.clone();
    }
    state.clamp_selection();
}

fn now_stamp() -> String {
    let fmt = time::macros::format_description!("[hour]:[minute]:[second]");
    time::OffsetDateTime::now_utc()
        .format(&fmt)
        .map(|t| format!("{t}Z"))
        .unwrap_or_else(|_| "now".into())
}

/// Copy the full checksum of the selected row (the table only shows a prefix).
fn copy_selected_checksum(state: &mut UiState) {
    let Some(s) = state.console.items.get(state.selected) else {
        state.info = "No snapshot selected.".into();
        return;
    };
    let id = s.snapshot_id;
    let checksum = s.checksum.clone();
    match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(checksum)) {
        Ok(()) => state.info = format!("Copied checksum for #{id}"),
        Err(e) => state.info = format!("Clipboard copy failed: {e}"),
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    if state.tab == 1 {
        help::draw_help(area, f);
        return;
    }
    draw_dashboard(area, f, state);
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let run_height = state
        .console
        .last_run
        .as_ref()
        .map(run_panel_height)
        .unwrap_or(0);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(run_height),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    draw_status(chunks[0], f, state);
    if let Some(run) = state.console.last_run.as_ref() {
        draw_run_outcome(chunks[1], f, run);
    }
    draw_table(chunks[2], f, state);
    draw_footer(chunks[3], f);
}

fn run_panel_height(run: &RunOutcome) -> u16 {
    let body: u16 = if run.skipped {
        2
    } else {
        2 + run.inserted.len().min(4) as u16
    };
    body + 2
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let label = Style::default().fg(Color::Gray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Backend: ", label),
            Span::raw(state.base_url.clone()),
        ]),
        Line::from(vec![
            Span::styled("Rows: ", label),
            Span::raw(format!(
                "{} (limit {})",
                state.console.items.len(),
                state.limit
            )),
            Span::styled("   Fetched: ", label),
            Span::raw(state.fetched_at.clone().unwrap_or_else(|| "never".into())),
            if state.console.loading {
                Span::styled("   Loading…", Style::default().fg(Color::Yellow))
            } else {
                Span::raw("")
            },
        ]),
        admin_key_line(state),
    ];

    if let Some(err) = state.console.error.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("Error: ", Style::default().fg(Color::Red)),
            Span::styled(err.to_string(), Style::default().fg(Color::Red)),
        ]));
    } else if !state.info.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Info: ", label),
            Span::raw(state.info.clone()),
        ]));
    }

    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("chain-snapshot-cli"),
    );
    f.render_widget(p, area);
}

fn admin_key_line(state: &UiState) -> Line<'static> {
    let label = Style::default().fg(Color::Gray);
    if state.key_editing {
        return Line::from(vec![
            Span::styled("Admin key: ", label),
            Span::raw(state.key_input.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
            Span::styled("  (Enter commits, Esc cancels)", label),
        ]);
    }
    let shown = if state.console.admin_key.trim().is_empty() {
        Span::styled("(none)", label)
    } else {
        Span::raw("•".repeat(state.console.admin_key.trim().len().min(24)))
    };
    Line::from(vec![Span::styled("Admin key: ", label), shown])
}

fn draw_run_outcome(area: Rect, f: &mut ratatui::Frame, run: &RunOutcome) {
    let mut lines = Vec::new();
    if run.skipped {
        lines.push(Line::from(vec![
            Span::styled("Skipped", Style::default().fg(Color::Yellow)),
            Span::raw(format!(
                ": {}",
                run.reason.as_deref().unwrap_or("no reason given")
            )),
        ]));
    } else {
        lines.push(Line::from(Span::styled(
            format!("Inserted {} capture(s)", run.inserted.len()),
            Style::default().fg(Color::Green),
        )));
        for cap in &run.inserted {
            lines.push(Line::from(format!(
                "  dte {} -> {} (actual {}d)  {}",
                cap.target_dte,
                cap.expiration,
                cap.actual_dte_days,
                cap.checksum_prefix()
            )));
        }
    }
    lines.push(Line::from(Span::styled(
        format!("Server time: {}", run.now_et),
        Style::default().fg(Color::Gray),
    )));

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Last run"));
    f.render_widget(p, area);
}

fn draw_table(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let items = &state.console.items;
    // Borders plus the header row.
    let max_rows = (area.height as usize).saturating_sub(3).max(1);

    // Keep the selected row visible.
    let offset = if state.selected >= max_rows {
        state.selected + 1 - max_rows
    } else {
        0
    };

    let header = Row::new(["ID", "Time (UTC)", "Underlying", "DTE", "Expiration", "Checksum"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = items.iter().enumerate().skip(offset).take(max_rows).map(|(i, s)| {
        let style = if i == state.selected {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(s.snapshot_id.to_string()),
            Cell::from(s.ts.clone()),
            Cell::from(s.underlying.clone()),
            Cell::from(s.target_dte.to_string()),
            Cell::from(s.expiration.clone()),
            Cell::from(s.checksum_prefix().to_string()),
        ])
        .style(style)
    });

    let title = if items.is_empty() && !state.console.loading {
        "Snapshots (none yet: press 's' to run one)".to_string()
    } else {
        format!("Snapshots ({})", items.len())
    };

    let widths = [
        Constraint::Length(8),
        Constraint::Length(24),
        Constraint::Length(10),
        Constraint::Length(5),
        Constraint::Length(12),
        Constraint::Min(12),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, area);
}

fn draw_footer(area: Rect, f: &mut ratatui::Frame) {
    let key = Style::default().fg(Color::Magenta);
    let line = Line::from(vec![
        Span::raw(" "),
        Span::styled("q", key),
        Span::raw(" quit  "),
        Span::styled("r", key),
        Span::raw(" refresh  "),
        Span::styled("s", key),
        Span::raw(" run now  "),
        Span::styled("a", key),
        Span::raw(" admin key  "),
        Span::styled("j/k", key),
        Span::raw(" select  "),
        Span::styled("y", key),
        Span::raw(" copy checksum  "),
        Span::styled("?", key),
        Span::raw(" help"),
    ]);
    f.render_widget(Paragraph::new(line), area);
}
