use std::io;
use std::sync::{Mutex, mpsc};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use hoops_oracle::config::OracleConfig;
use hoops_oracle::provider;
use hoops_oracle::state::{
    AnalysisPanel, AppState, Delta, Game, GameStatus, Language, ProviderCommand, Screen,
    apply_delta,
};

const PROB_BAR_WIDTH: usize = 20;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
    refresh_interval: Duration,
    last_refresh_request: Instant,
}

impl App {
    fn new(cfg: &OracleConfig, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state: AppState::new(cfg.start_date, cfg.language),
            should_quit: false,
            cmd_tx,
            refresh_interval: cfg.refresh_interval,
            last_refresh_request: Instant::now(),
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => {
                if self.state.help_overlay {
                    self.state.help_overlay = false;
                } else {
                    self.state.analysis = None;
                }
            }
            KeyCode::Char('h') | KeyCode::Left => {
                self.state.shift_date(-1);
                self.request_refresh();
            }
            KeyCode::Char('l') | KeyCode::Right => {
                self.state.shift_date(1);
                self.request_refresh();
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('r') => self.request_refresh(),
            KeyCode::Char('a') | KeyCode::Enter => self.request_analysis(),
            KeyCode::Char('t') => self.state.language = self.state.language.toggled(),
            KeyCode::Char('m') => {
                self.state.toggle_screen();
                if self.state.screen == Screen::MarketTable {
                    self.send(ProviderCommand::LoadMarketTable);
                }
            }
            _ => {}
        }
    }

    fn send(&mut self, cmd: ProviderCommand) {
        let Some(tx) = self.cmd_tx.as_ref() else {
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Provider stopped");
            self.cmd_tx = None;
        }
    }

    fn request_refresh(&mut self) {
        let generation = self.state.begin_refresh();
        let date = self.state.date;
        self.send(ProviderCommand::Refresh { date, generation });
        self.last_refresh_request = Instant::now();
    }

    fn request_analysis(&mut self) {
        let Some(game) = self.state.selected_game().cloned() else {
            return;
        };
        self.state.analysis = Some(AnalysisPanel {
            game_id: game.id.clone(),
            loading: true,
            prediction: None,
        });
        let language = self.state.language;
        self.send(ProviderCommand::Analyze {
            game: Box::new(game),
            language,
        });
    }

    fn maybe_refresh(&mut self) {
        if self.last_refresh_request.elapsed() >= self.refresh_interval {
            self.request_refresh();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing()?;

    let cfg = OracleConfig::from_env();
    tracing::info!(date = %cfg.start_date, lang = cfg.language.code(), "starting dashboard");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(cfg.clone(), tx, cmd_rx);

    let mut app = App::new(&cfg, Some(cmd_tx));
    app.request_refresh();
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::File::create(log_dir.join("hoops_oracle.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hoops_oracle=info,warn")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        app.maybe_refresh();

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Games => render_games(frame, chunks[1], &app.state),
        Screen::MarketTable => render_market_table(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let acc = state.accuracy();
    let accuracy = if acc.total == 0 {
        "Accuracy --".to_string()
    } else {
        format!("Accuracy {}% ({}W/{}L)", acc.percent(), acc.correct, acc.wrong())
    };
    let refresh = if state.loading {
        "refreshing...".to_string()
    } else {
        match state.last_refresh.and_then(|t| t.elapsed().ok()) {
            Some(age) => format!("updated {}s ago", age.as_secs()),
            None => "not loaded".to_string(),
        }
    };
    let screen = match state.screen {
        Screen::Games => "GAMES",
        Screen::MarketTable => "MARKET ODDS",
    };
    format!(
        "  HOOPS ORACLE | {screen} | {} | {accuracy}\n  Lang: {} | {refresh}",
        state.date.format("%a %Y-%m-%d"),
        state.language.code(),
    )
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Games => {
            "h/l Date | j/k Move | a Analyze | r Refresh | m Odds table | t Lang | ? Help | q Quit"
                .to_string()
        }
        Screen::MarketTable => "m Games | r Refresh | ? Help | q Quit".to_string(),
    }
}

fn render_games(frame: &mut Frame, area: Rect, state: &AppState) {
    let analysis_height = if state.analysis.is_some() { 9 } else { 0 };
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(analysis_height)])
        .split(area);

    let block = Block::default().title("Games").borders(Borders::ALL);
    if state.games.is_empty() {
        let msg = match (&state.fetch_error, state.loading) {
            (Some(err), _) => format!("{err}\nPress r to retry."),
            (None, true) => "Loading games...".to_string(),
            (None, false) => "No games scheduled for this date.".to_string(),
        };
        frame.render_widget(Paragraph::new(msg).block(block), sections[0]);
    } else {
        let visible = sections[0].height.saturating_sub(2) as usize / 2;
        let (start, end) = visible_range(state.selected, state.games.len(), visible.max(1));
        let mut lines = Vec::new();
        for (idx, game) in state.games.iter().enumerate().take(end).skip(start) {
            let selected = idx == state.selected;
            let base = if selected {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            lines.push(Line::styled(game_headline(game, state.language), base.add_modifier(Modifier::BOLD)));
            lines.push(game_odds_line(game, base));
        }
        frame.render_widget(Paragraph::new(lines).block(block), sections[0]);
    }

    if let Some(panel) = state.analysis.as_ref() {
        let text = analysis_text(state, panel);
        let widget = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(Block::default().title("AI Analysis (Esc to close)").borders(Borders::ALL));
        frame.render_widget(widget, sections[1]);
    }
}

fn game_headline(game: &Game, lang: Language) -> String {
    let status = match game.status {
        GameStatus::Scheduled => format_tipoff(&game.start_time),
        GameStatus::Live => {
            let period = game.period.map(|p| format!("Q{p}")).unwrap_or_default();
            let clock = game.clock.clone().unwrap_or_default();
            format!("LIVE {period} {clock}").trim().to_string()
        }
        GameStatus::Finished => "FINAL".to_string(),
    };
    let score = game
        .score
        .map(|s| format!("{:>3} - {:<3}", s.home, s.away))
        .unwrap_or_else(|| "  vs   ".to_string());
    format!(
        " {status:<14} {} {} ({}) {score} {} {} ({})",
        game.home.id,
        game.home.display_name(lang),
        game.home.record(),
        game.away.id,
        game.away.display_name(lang),
        game.away.record(),
    )
}

fn game_odds_line(game: &Game, base: Style) -> Line<'static> {
    let home_pct = game.market.home_win_prob * 100.0;
    let filled = ((game.market.home_win_prob * PROB_BAR_WIDTH as f64).round() as usize)
        .min(PROB_BAR_WIDTH);
    let lock = if !game.is_locked {
        "OPEN".to_string()
    } else if game.is_closing_odds {
        "LOCKED closing".to_string()
    } else {
        "LOCKED fallback".to_string()
    };

    let mut spans = vec![
        Span::styled(format!("   {home_pct:>5.1}% "), base),
        Span::styled("█".repeat(filled), base.fg(Color::Green)),
        Span::styled("█".repeat(PROB_BAR_WIDTH - filled), base.fg(Color::Red)),
        Span::styled(format!(" {:>5.1}%", 100.0 - home_pct), base),
        Span::styled(
            format!("  {} {}  {lock}", game.odds_source.as_str(), format_volume(game.market.volume)),
            base.fg(Color::Gray),
        ),
    ];
    if let Some(pick) = game.predicted_winner_id.as_deref() {
        spans.push(Span::styled(format!("  pick {pick}"), base.fg(Color::Cyan)));
    }
    match game.prediction_correct {
        Some(true) => spans.push(Span::styled(" HIT", base.fg(Color::Green))),
        Some(false) => spans.push(Span::styled(" MISS", base.fg(Color::Red))),
        None => {}
    }
    Line::from(spans)
}

fn analysis_text(state: &AppState, panel: &AnalysisPanel) -> String {
    if panel.loading {
        return "Analyzing matchup...".to_string();
    }
    let Some(pred) = panel.prediction.as_ref() else {
        return "No analysis available".to_string();
    };
    let winner = state
        .games
        .iter()
        .find(|g| g.id == panel.game_id)
        .and_then(|g| {
            [&g.home, &g.away]
                .into_iter()
                .find(|t| t.id == pred.winner_id)
                .map(|t| t.display_name(state.language).to_string())
        })
        .unwrap_or_else(|| pred.winner_id.clone());
    format!(
        "Winner: {winner}  Confidence: {:.0}%\nKey factor: {}\n\n{}",
        pred.confidence, pred.key_matchup_factor, pred.reasoning
    )
}

fn render_market_table(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .title("Bookmaker Odds & Implied Win %")
        .borders(Borders::ALL);
    if state.market_table.is_empty() {
        frame.render_widget(Paragraph::new("No odds snapshot loaded").block(block), area);
        return;
    }
    let mut lines = vec![Line::styled(
        format!(
            " {:<12} {:<48} {:<22} {}",
            "TIP-OFF", "MATCHUP", "DECIMAL", "IMPLIED"
        ),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    for row in &state.market_table {
        let decimal = match (row.home_decimal, row.away_decimal) {
            (Some(h), Some(a)) => format!("{h:.2} vs {a:.2} {}", row.bookmaker),
            _ => "-".to_string(),
        };
        let implied = match (row.home_implied(), row.away_implied()) {
            (Some(h), Some(a)) => format!("{:.1}% / {:.1}%", h * 100.0, a * 100.0),
            _ => "-".to_string(),
        };
        let style = match row.favourite_is_home() {
            Some(true) => Style::default().fg(Color::Green),
            _ => Style::default(),
        };
        lines.push(Line::styled(
            format!(
                " {:<12} {:<48} {:<22} {implied}",
                format_tipoff(&row.commence_time),
                format!("{} vs {}", row.home_team, row.away_team),
                decimal,
            ),
            style,
        ));
    }
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_volume(volume: f64) -> String {
    if volume >= 1_000_000.0 {
        format!("vol {:.1}M", volume / 1_000_000.0)
    } else if volume >= 1_000.0 {
        format!("vol {:.0}K", volume / 1_000.0)
    } else if volume > 0.0 {
        format!("vol {volume:.0}")
    } else {
        String::new()
    }
}

fn format_tipoff(raw: &str) -> String {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return "TBD".to_string();
    }
    match parse_tipoff(cleaned) {
        Some(dt) => dt.with_timezone(&Local).format("%m/%d %H:%M").to_string(),
        None => cleaned.chars().take(16).collect::<String>().replace('T', " "),
    }
}

fn parse_tipoff(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Hoops Oracle - Help",
        "",
        "  h / ←        Previous day",
        "  l / →        Next day",
        "  j/k or ↑/↓   Move selection",
        "  a / Enter    AI analysis for selected game",
        "  Esc          Close panel",
        "  r            Refresh now",
        "  m            Toggle bookmaker odds table",
        "  t            Toggle language (en/zh)",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Odds lock when a game tips off; the pick shown",
        "after tip-off never changes.",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
