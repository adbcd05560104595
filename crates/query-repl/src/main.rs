//! Query REPL - Interactive queries over an in-memory item store

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use datalog_builtins::{
    Builtins, decode, encode, evaluate_query, extract_bindings, query_variables, simplify,
};
use datalog_core::Substitution;
use datalog_parser::{ParseError, SrcId, parse_query, parse_term};
use kv_storage::{MemoryStore, StoreConfig};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Interactive queries over an in-memory item store
#[derive(Parser, Debug)]
#[command(name = "query-repl", version, about)]
struct Args {
    /// Store configuration (tables and seed items)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log file; filter with RUST_LOG
    #[arg(long, value_name = "FILE", default_value = "query-repl.log")]
    log_file: PathBuf,

    /// Maximum number of solutions shown per query
    #[arg(
        short = 'n',
        long,
        default_value_t = 20,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    max_solutions: usize,

    /// Run one query, print its solutions and exit
    #[arg(short = 'e', long, value_name = "QUERY")]
    eval: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Query,
    Value,
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Mode::Query => "Query",
            Mode::Value => "Value",
        }
    }

    fn toggle(&self) -> Self {
        match self {
            Mode::Query => Mode::Value,
            Mode::Value => Mode::Query,
        }
    }

    fn color(&self) -> Color {
        match self {
            Mode::Query => Color::Magenta,
            Mode::Value => Color::Cyan,
        }
    }
}

struct App {
    builtins: Builtins,
    max_solutions: usize,
    mode: Mode,
    input: String,
    cursor_pos: usize,
    history: Vec<HistoryEntry>,
    scroll_offset: usize,
    show_help: bool,
}

struct HistoryEntry {
    mode: Mode,
    query: String,
    result: String,
    is_error: bool,
}

impl App {
    fn new(builtins: Builtins, max_solutions: usize) -> Self {
        Self {
            builtins,
            max_solutions,
            mode: Mode::Query,
            input: String::new(),
            cursor_pos: 0,
            history: Vec::new(),
            scroll_offset: 0,
            show_help: false,
        }
    }

    fn execute_query(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }

        let query = self.input.clone();
        let (result, is_error) = match self.mode {
            Mode::Query => run_query(&self.builtins, &query, self.max_solutions),
            Mode::Value => show_value(&query),
        };

        self.history.push(HistoryEntry {
            mode: self.mode,
            query,
            result,
            is_error,
        });

        self.input.clear();
        self.cursor_pos = 0;
        self.scroll_offset = 0;
    }

    fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    fn delete_char(&mut self) {
        if let Some(c) = self.input[..self.cursor_pos].chars().next_back() {
            self.cursor_pos -= c.len_utf8();
            self.input.remove(self.cursor_pos);
        }
    }

    fn delete_char_forward(&mut self) {
        if self.cursor_pos < self.input.len() {
            self.input.remove(self.cursor_pos);
        }
    }

    fn move_cursor_left(&mut self) {
        if let Some(c) = self.input[..self.cursor_pos].chars().next_back() {
            self.cursor_pos -= c.len_utf8();
        }
    }

    fn move_cursor_right(&mut self) {
        if let Some(c) = self.input[self.cursor_pos..].chars().next() {
            self.cursor_pos += c.len_utf8();
        }
    }

    fn move_cursor_start(&mut self) {
        self.cursor_pos = 0;
    }

    fn move_cursor_end(&mut self) {
        self.cursor_pos = self.input.len();
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| format!("Error: {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run a query and render up to `limit` solutions
fn run_query(builtins: &Builtins, text: &str, limit: usize) -> (String, bool) {
    let query = match parse_query(text, SrcId::repl()) {
        Ok(query) => query,
        Err(errors) => return (format_parse_errors(&errors), true),
    };
    let variables = query_variables(&query);

    let mut lines = Vec::new();
    let mut solutions = evaluate_query(builtins, &query);
    for solution in solutions.by_ref().take(limit) {
        match solution {
            Ok(subst) => {
                let bindings = extract_bindings(&subst, &variables);
                if bindings.is_empty() {
                    lines.push("true.".to_string());
                } else {
                    let rendered: Vec<String> = bindings
                        .iter()
                        .map(|(var, value)| format!("{} = {}", var, value))
                        .collect();
                    lines.push(format!("{}.", rendered.join(", ")));
                }
            }
            Err(e) => {
                lines.push(format!("Error: {}", e));
                return (lines.join("\n"), true);
            }
        }
    }

    if lines.is_empty() {
        return ("false.".to_string(), false);
    }
    if solutions.next().is_some() {
        lines.push(format!("(showing the first {} solutions)", limit));
    }
    (lines.join("\n"), false)
}

/// Encode a term as a value and show its tagged and plain forms
fn show_value(text: &str) -> (String, bool) {
    let term = match parse_term(text, SrcId::repl()) {
        Ok(term) => term,
        Err(errors) => return (format_parse_errors(&errors), true),
    };
    let subst = Substitution::new();
    let value = match encode(&term, &subst) {
        Ok(value) => value,
        Err(e) => return (format!("Error: {}", e), true),
    };
    let tagged = decode(&value);
    match simplify(&tagged, &subst) {
        Ok(plain) => (
            format!(
                "type:   {}\ntagged: {}\nplain:  {}",
                value.type_name(),
                tagged,
                plain
            ),
            false,
        ),
        Err(e) => (format!("Error: {}", e), true),
    }
}

fn init_logging(path: &PathBuf) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(())
}

fn load_store(args: &Args) -> Result<MemoryStore> {
    match &args.config {
        Some(path) => {
            let config = StoreConfig::from_file(path)?;
            let store = MemoryStore::from_config(&config)?;
            info!(config = %path.display(), tables = config.tables.len(), "store loaded");
            for table in &config.tables {
                info!(table = %table.name, items = store.len(&table.name)?, "seeded table");
            }
            Ok(store)
        }
        None => Ok(MemoryStore::new()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let builtins = Builtins::with_store(load_store(&args)?);

    if let Some(query) = &args.eval {
        let (output, is_error) = run_query(&builtins, query, args.max_solutions);
        println!("{}", output);
        if is_error {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(builtins, args.max_solutions);
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if app.show_help {
                app.show_help = false;
                continue;
            }

            match (key.code, key.modifiers) {
                // Exit
                (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Ok(()),
                (KeyCode::Char('d'), KeyModifiers::CONTROL) if app.input.is_empty() => {
                    return Ok(());
                }

                // Toggle mode
                (KeyCode::Tab, _) => app.mode = app.mode.toggle(),

                // Execute query
                (KeyCode::Enter, _) => app.execute_query(),

                // Help
                (KeyCode::F(1), _) => app.show_help = true,

                // Cursor movement
                (KeyCode::Left, _) => app.move_cursor_left(),
                (KeyCode::Right, _) => app.move_cursor_right(),
                (KeyCode::Home, _) | (KeyCode::Char('a'), KeyModifiers::CONTROL) => {
                    app.move_cursor_start()
                }
                (KeyCode::End, _) | (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
                    app.move_cursor_end()
                }

                // Editing
                (KeyCode::Backspace, _) => app.delete_char(),
                (KeyCode::Delete, _) => app.delete_char_forward(),
                (KeyCode::Char('u'), KeyModifiers::CONTROL) => app.clear_input(),

                // Scrolling history
                (KeyCode::Up, _) | (KeyCode::PageUp, _) => {
                    if app.scroll_offset < app.history.len().saturating_sub(1) {
                        app.scroll_offset += 1;
                    }
                }
                (KeyCode::Down, _) | (KeyCode::PageDown, _) => {
                    app.scroll_offset = app.scroll_offset.saturating_sub(1);
                }

                // Character input
                (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                    app.insert_char(c);
                }

                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(5),    // History/results
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    let title = Line::from(vec![
        Span::raw(" Query REPL "),
        Span::styled(
            format!("[{}]", app.mode.name()),
            Style::default()
                .fg(app.mode.color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" - Press Tab to switch modes, F1 for help"),
    ]);
    let title_bar =
        Paragraph::new(title).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(title_bar, chunks[0]);

    render_history(f, app, chunks[1]);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.mode.color()))
        .title(format!(" {} ", app.mode.name()));

    let input_area = input_block.inner(chunks[2]);
    f.render_widget(input_block, chunks[2]);

    let input_text = Paragraph::new(app.input.as_str());
    f.render_widget(input_text, input_area);

    let cursor_column = app.input[..app.cursor_pos].chars().count() as u16;
    f.set_cursor_position((input_area.x + cursor_column, input_area.y));

    let status = Line::from(vec![
        Span::styled(" Ctrl+C ", Style::default().bg(Color::DarkGray)),
        Span::raw(" Exit "),
        Span::styled(" Tab ", Style::default().bg(Color::DarkGray)),
        Span::raw(" Switch mode "),
        Span::styled(" Enter ", Style::default().bg(Color::DarkGray)),
        Span::raw(" Execute "),
        Span::styled(" ↑/↓ ", Style::default().bg(Color::DarkGray)),
        Span::raw(" Scroll "),
    ]);
    f.render_widget(Paragraph::new(status), chunks[3]);

    if app.show_help {
        render_help_popup(f);
    }
}

fn render_history(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" History ");

    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.history.is_empty() {
        let query_style = Style::default().fg(Mode::Query.color());
        let value_style = Style::default().fg(Mode::Value.color());
        let welcome = Text::from(vec![
            Line::from(""),
            Line::from("  Welcome to Query REPL!"),
            Line::from(""),
            Line::from("  Query mode runs goals against the store;"),
            Line::from("  Value mode shows how a term is stored."),
            Line::from("  Press Tab to switch between modes."),
            Line::from(""),
            Line::from("  Example queries:"),
            Line::styled("    list_tables(T).", query_style),
            Line::styled("    scan(users, Item).", query_style),
            Line::styled("    get_item(users, id-5, Item).", query_style),
            Line::styled("    put_item(users, [id-7, name-dee]).", query_style),
            Line::styled("    between(1, inf, X).", query_style),
            Line::from(""),
            Line::from("  Example values:"),
            Line::styled("    [name-alice, tags-ss([a, b])]", value_style),
            Line::styled("    n('42.50')", value_style),
        ]);
        f.render_widget(Paragraph::new(welcome), inner);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();

    for entry in app.history.iter().rev().skip(app.scroll_offset) {
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", entry.mode.name()),
                Style::default()
                    .fg(entry.mode.color())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(&entry.query, Style::default().fg(Color::Yellow)),
        ]));

        let result_style = if entry.is_error {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };

        for line in entry.result.lines() {
            lines.push(Line::styled(format!("  {}", line), result_style));
        }

        lines.push(Line::from(""));
    }

    let para = Paragraph::new(lines).wrap(Wrap { trim: false });
    f.render_widget(para, inner);
}

fn render_help_popup(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());

    f.render_widget(Clear, area);

    let help_text = vec![
        Line::from("").centered(),
        Line::styled(
            "Query REPL Help",
            Style::default().add_modifier(Modifier::BOLD),
        )
        .centered(),
        Line::from(""),
        Line::from("  Keybindings:"),
        Line::from(""),
        Line::from("    Tab          Switch between Query and Value"),
        Line::from("    Enter        Execute"),
        Line::from("    Ctrl+C       Exit"),
        Line::from("    Ctrl+D       Exit (when input is empty)"),
        Line::from("    ↑/↓          Scroll through history"),
        Line::from("    Ctrl+A/Home  Move cursor to start"),
        Line::from("    Ctrl+E/End   Move cursor to end"),
        Line::from("    Ctrl+U       Clear input"),
        Line::from("    F1           Show this help"),
        Line::from(""),
        Line::from("  Store predicates:"),
        Line::from("    list_tables(?Name)   scan(+Table, ?Item)"),
        Line::from("    get_item(+Table, +Key, ?Item)"),
        Line::from("    put_item(+Table, +Item)   delete_item(+Table, +Key)"),
        Line::from("    attribute_value(?Attr, ?Value)"),
        Line::from("  Keys: id-5 or 'UserID'-1 -&- 'Timestamp'-2"),
        Line::from(""),
        Line::from("  Other: between/3, is_list/1, json_prolog/2, json_atom/2, =, \\="),
        Line::from(""),
        Line::styled(
            "  Press any key to close",
            Style::default().fg(Color::DarkGray),
        )
        .centered(),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help "),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_storage::KeySchema;

    fn builtins() -> Builtins {
        let store = MemoryStore::new();
        store.create_table("users", KeySchema::hash("id")).unwrap();
        Builtins::with_store(store)
    }

    #[test]
    fn test_max_solutions_must_be_positive() {
        let args = Args::try_parse_from(["query-repl"]).unwrap();
        assert_eq!(args.max_solutions, 20);
        let args = Args::try_parse_from(["query-repl", "-n", "1"]).unwrap();
        assert_eq!(args.max_solutions, 1);
        assert!(Args::try_parse_from(["query-repl", "-n", "0"]).is_err());
    }

    #[test]
    fn test_run_query_bindings() {
        let (output, is_error) = run_query(&builtins(), "between(1, 2, X).", 10);
        assert!(!is_error);
        assert_eq!(output, "X = 1.\nX = 2.");
    }

    #[test]
    fn test_run_query_true_false() {
        assert_eq!(run_query(&builtins(), "true.", 10), ("true.".to_string(), false));
        assert_eq!(run_query(&builtins(), "fail.", 10), ("false.".to_string(), false));
    }

    #[test]
    fn test_run_query_limit() {
        let (output, _) = run_query(&builtins(), "between(1, inf, X).", 2);
        assert_eq!(output, "X = 1.\nX = 2.\n(showing the first 2 solutions)");
    }

    #[test]
    fn test_run_query_error() {
        let (output, is_error) = run_query(&builtins(), "scan(missing, X).", 10);
        assert!(is_error);
        assert!(output.starts_with("Error: store_error"));

        let (_, parse_failed) = run_query(&builtins(), "scan(", 10);
        assert!(parse_failed);
    }

    #[test]
    fn test_run_query_store_round_trip() {
        let builtins = builtins();
        run_query(&builtins, "put_item(users, [id-1, name-ann]).", 10);
        let (output, _) = run_query(&builtins, "scan(users, I).", 10);
        assert_eq!(output, "I = [id-n('1'),name-s(ann)].");
    }

    #[test]
    fn test_show_value() {
        let (output, is_error) = show_value("[name-alice]");
        assert!(!is_error);
        assert_eq!(
            output,
            "type:   M\ntagged: m([name-s(alice)])\nplain:  [name-alice]"
        );

        let (_, failed) = show_value("X");
        assert!(failed);
    }
}
