// TUI module - Interactive failure dashboard in the terminal
use crate::cli_output::truncate;
use crate::config::Config;
use crate::export;
use crate::filter::{ClickDimension, Dropdown, ALL_VALUES};
use crate::loader;
use crate::session::{Action, Dashboard, DashboardView};
use crate::view::{percent, ChartEvent, Series};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Row, Table, Tabs},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const TAB_TITLES: [&str; 6] = [
    "[1] Trend",
    "[2] Test Items",
    "[3] Top Errors",
    "[4] Error Share",
    "[5] Results",
    "[6] Hierarchy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Trend,
    TestItems,
    TopErrors,
    ErrorShare,
    Results,
    Hierarchy,
}

impl Tab {
    const ALL: [Tab; 6] = [
        Tab::Trend,
        Tab::TestItems,
        Tab::TopErrors,
        Tab::ErrorShare,
        Tab::Results,
        Tab::Hierarchy,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    /// Click filters this view sets, and therefore clears
    fn dimensions(self) -> &'static [ClickDimension] {
        match self {
            Tab::Trend => &[ClickDimension::Date],
            Tab::TestItems => &[ClickDimension::CategorySecondary],
            Tab::TopErrors | Tab::ErrorShare => &[ClickDimension::CategoryError],
            Tab::Results => &[ClickDimension::Result],
            Tab::Hierarchy => &[
                ClickDimension::CategoryPrimary,
                ClickDimension::CategorySecondary,
                ClickDimension::CategoryError,
            ],
        }
    }
}

/// App state for the TUI
pub struct App {
    pub dashboard: Dashboard,
    pub view: DashboardView,
    pub tab: Tab,
    pub selected_row: usize,
    pub status_message: String,
    export_path: PathBuf,
    export_delimiter: u8,
}

impl App {
    pub fn new(dashboard: Dashboard, config: &Config) -> Self {
        let view = dashboard.refresh();
        let status_message = format!(
            "Loaded {} records. Enter: filter on row, c: clear view filter, R: reset, q: quit",
            view.total_records
        );
        Self {
            dashboard,
            view,
            tab: Tab::Trend,
            selected_row: 0,
            status_message,
            export_path: PathBuf::from(&config.export_file_name),
            export_delimiter: config.delimiter_byte(),
        }
    }

    fn dispatch(&mut self, action: Action) {
        self.dashboard.dispatch(action);
        self.refresh();
    }

    fn refresh(&mut self) {
        self.view = self.dashboard.refresh();
        let rows = self.row_count();
        if rows == 0 {
            self.selected_row = 0;
        } else if self.selected_row >= rows {
            self.selected_row = rows - 1;
        }
    }

    /// Series listed on the current tab; the hierarchy tab uses the tree series
    fn series(&self) -> Option<&Series> {
        let charts = &self.view.charts;
        match self.tab {
            Tab::Trend => Some(&charts.timeline),
            Tab::TestItems => Some(&charts.test_items),
            Tab::TopErrors => Some(&charts.top_errors),
            Tab::ErrorShare => Some(&charts.error_pie),
            Tab::Results => Some(&charts.result_pie),
            Tab::Hierarchy => None,
        }
    }

    fn row_count(&self) -> usize {
        match self.series() {
            Some(series) => series.len(),
            None => self.view.charts.hierarchy.ids.len(),
        }
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.selected_row = 0;
    }

    pub fn next_tab(&mut self) {
        let next = (self.tab.index() + 1) % Tab::ALL.len();
        self.select_tab(Tab::ALL[next]);
    }

    pub fn prev_tab(&mut self) {
        let idx = self.tab.index();
        let prev = if idx == 0 { Tab::ALL.len() - 1 } else { idx - 1 };
        self.select_tab(Tab::ALL[prev]);
    }

    pub fn next_row(&mut self) {
        let rows = self.row_count();
        if rows > 0 {
            self.selected_row = (self.selected_row + 1) % rows;
        }
    }

    pub fn prev_row(&mut self) {
        let rows = self.row_count();
        if rows > 0 {
            self.selected_row = if self.selected_row == 0 {
                rows - 1
            } else {
                self.selected_row - 1
            };
        }
    }

    /// The chart event a click on the selected row would produce
    pub fn selected_event(&self) -> Option<ChartEvent> {
        if self.tab == Tab::Hierarchy {
            let id = self.view.charts.hierarchy.ids.get(self.selected_row)?.clone();
            return Some(ChartEvent::SunburstNode { id });
        }
        let label = self.series()?.labels.get(self.selected_row)?.clone();
        Some(match self.tab {
            Tab::Trend => ChartEvent::TimelinePoint { x: label },
            Tab::TestItems => ChartEvent::TestItemBar { x: label },
            Tab::TopErrors => ChartEvent::ErrorBar { y: label },
            Tab::ErrorShare => ChartEvent::ErrorSlice { label },
            Tab::Results => ChartEvent::ResultSlice { label },
            Tab::Hierarchy => ChartEvent::SunburstNode { id: label },
        })
    }

    pub fn click_selected(&mut self) {
        let Some(event) = self.selected_event() else {
            return;
        };
        self.dispatch(Action::Click(event));
        self.selected_row = 0;
        self.status_message = format!(
            "{} of {} records",
            self.view.filtered_records, self.view.total_records
        );
    }

    pub fn clear_view_filter(&mut self) {
        for dimension in self.tab.dimensions() {
            self.dashboard.dispatch(Action::ClearFilter(*dimension));
        }
        self.refresh();
        self.status_message = format!("Cleared {} filter", TAB_TITLES[self.tab.index()]);
    }

    pub fn cycle_dropdown(&mut self, dropdown: Dropdown) {
        self.dashboard.cycle_dropdown(dropdown);
        self.refresh();
        let value = self.dashboard.filter().dropdown(dropdown).unwrap_or(ALL_VALUES);
        self.status_message = format!("{}: {}", dropdown.dimension().name(), value);
    }

    pub fn nudge_range(&mut self, start_days: i64, end_days: i64) {
        self.dashboard.nudge_range(start_days, end_days);
        self.refresh();
        self.status_message = match self.dashboard.filter().range() {
            Some(range) => format!("Range: {}", range),
            None => "No dated records".to_string(),
        };
    }

    pub fn export(&mut self) {
        let filtered = self.dashboard.filtered();
        let headers = &self.dashboard.dataset().headers;
        self.status_message = match export::export_to_file(
            &self.export_path,
            headers,
            &filtered,
            self.export_delimiter,
        ) {
            Ok(n) => format!("Exported {} records to {}", n, self.export_path.display()),
            Err(e) => format!("Export failed: {}", e),
        };
    }

    /// Reload the source file; the current dataset stays on failure
    pub fn reload(&mut self) {
        let Some(path) = self.dashboard.dataset().source.clone() else {
            self.status_message = "Nothing to reload".to_string();
            return;
        };
        match loader::load_file(&path) {
            Ok(dataset) => {
                self.dashboard.install(dataset);
                self.selected_row = 0;
                self.refresh();
                self.status_message = format!(
                    "Reloaded {} records from {}",
                    self.view.total_records,
                    path.display()
                );
            }
            Err(e) => {
                warn!("Reload of {} failed: {}", path.display(), e);
                self.status_message = format!("Reload failed: {}", e);
            }
        }
    }

    /// Apply one key press; returns true when the app should exit
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => self.next_tab(),
            KeyCode::BackTab => self.prev_tab(),
            KeyCode::Down | KeyCode::Char('j') => self.next_row(),
            KeyCode::Up | KeyCode::Char('k') => self.prev_row(),
            KeyCode::Enter => self.click_selected(),
            KeyCode::Char('c') => self.clear_view_filter(),
            KeyCode::Char('x') => {
                self.dispatch(Action::ClearClicks);
                self.status_message = "Cleared chart selections".to_string();
            }
            KeyCode::Char('R') => {
                self.dispatch(Action::ResetAll);
                self.status_message = "Reset selections and date range".to_string();
            }
            KeyCode::Char('m') => self.cycle_dropdown(Dropdown::Model),
            KeyCode::Char('r') => self.cycle_dropdown(Dropdown::Result),
            KeyCode::Char('s') => self.cycle_dropdown(Dropdown::Stage),
            KeyCode::Char('[') => self.nudge_range(-1, 0),
            KeyCode::Char(']') => self.nudge_range(1, 0),
            KeyCode::Char('{') => self.nudge_range(0, -1),
            KeyCode::Char('}') => self.nudge_range(0, 1),
            KeyCode::Char('e') => self.export(),
            KeyCode::Char('o') => self.reload(),
            KeyCode::Char(c @ '1'..='6') => {
                let idx = c as usize - '1' as usize;
                self.select_tab(Tab::ALL[idx]);
            }
            _ => {}
        }
        false
    }
}

/// Run the TUI application
pub fn run_tui(dashboard: Dashboard, config: &Config) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(dashboard, config);
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

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key.code) {
                    return Ok(());
                }
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Length(4), // Filters + status
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    let tabs = Tabs::new(TAB_TITLES.to_vec())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" failboard - Failure Dashboard "),
        )
        .select(app.tab.index())
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[0]);

    let filters = if app.view.active_filters.is_empty() {
        "none".to_string()
    } else {
        app.view.active_filters.join(" | ")
    };
    let status = Paragraph::new(vec![
        Line::from(format!(
            "Records: {} / {}   Filters: {}",
            app.view.filtered_records, app.view.total_records, filters
        )),
        Line::from(app.status_message.clone()),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Status "));
    f.render_widget(status, chunks[1]);

    match app.series() {
        Some(series) if app.tab == Tab::Trend => render_trend(f, app, series, chunks[2]),
        Some(series) => render_series(f, app, series, chunks[2]),
        None => render_hierarchy(f, app, chunks[2]),
    }

    let footer_text = " q:Quit | Tab/1-6:View | j/k:Move | Enter:Filter | c:Clear view | x:Clear all | R:Reset | m/r/s:Dropdowns | [ ] { }:Range | e:Export | o:Reload ";
    let footer = Paragraph::new(footer_text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[3]);
}

fn placeholder(f: &mut Frame, title: &str, area: Rect) {
    let p = Paragraph::new("No data for the current filters.")
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", title)));
    f.render_widget(p, area);
}

fn render_trend(f: &mut Frame, app: &App, series: &Series, area: Rect) {
    if series.is_empty() {
        placeholder(f, "Trend Failure", area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let bars: Vec<Bar> = series
        .points()
        .enumerate()
        .map(|(i, (label, value))| {
            let style = if i == app.selected_row {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Cyan)
            };
            Bar::default()
                .value(value)
                .label(Line::from(label.get(5..).unwrap_or(label).to_string()))
                .style(style)
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(" Trend Failure "))
        .data(BarGroup::default().bars(&bars))
        .bar_width(5)
        .bar_gap(1);
    f.render_widget(chart, chunks[0]);

    render_series(f, app, series, chunks[1]);
}

fn render_series(f: &mut Frame, app: &App, series: &Series, area: Rect) {
    let title = TAB_TITLES[app.tab.index()];
    if series.is_empty() {
        placeholder(f, title, area);
        return;
    }

    let total = app.view.charts.total;
    let max = series.max().max(1);
    let rows: Vec<Row> = series
        .points()
        .enumerate()
        .map(|(i, (label, value))| {
            let style = if i == app.selected_row {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let bar_width = ((value as f64 / max as f64) * 30.0) as usize;
            let bar = "█".repeat(bar_width) + &"░".repeat(30 - bar_width);
            Row::new(vec![
                truncate(label, 60),
                value.to_string(),
                format!("{:>5.1}%", percent(value, total)),
                bar,
            ])
            .style(style)
        })
        .collect();

    let header = Row::new(vec!["Value", "Fails", "%", "Distribution"])
        .style(Style::default().add_modifier(Modifier::BOLD))
        .bottom_margin(1);

    let table = Table::new(
        rows,
        [
            Constraint::Min(30),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(32),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ({}) ", title, series.len())),
    );
    f.render_widget(table, area);
}

fn render_hierarchy(f: &mut Frame, app: &App, area: Rect) {
    let tree = &app.view.charts.hierarchy;
    let total = app.view.charts.total;

    let rows: Vec<Row> = (0..tree.ids.len())
        .map(|i| {
            let style = if i == app.selected_row {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let indent = "  ".repeat(tree.depths[i]);
            Row::new(vec![
                format!("{}{}", indent, truncate(&tree.labels[i], 60)),
                tree.values[i].to_string(),
                format!("{:>5.1}%", percent(tree.values[i], total)),
            ])
            .style(style)
        })
        .collect();

    let header = Row::new(vec!["Model / Test Item / Error", "Fails", "%"])
        .style(Style::default().add_modifier(Modifier::BOLD))
        .bottom_margin(1);

    let table = Table::new(
        rows,
        [
            Constraint::Min(40),
            Constraint::Length(8),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Hierarchy "));
    f.render_widget(table, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_bytes;
    use crate::view::ViewLimits;
    use std::fs;
    use tempfile::tempdir;

    const CSV: &str = "\
model,stage,result,test_item,fail_time,error_message
A,FT,FAIL,T1,2026-01-04 08:00:00,E1
A,FT,FAIL,T1,2026-01-05 08:00:00,E1
B,FT,PASS,T2,2026-01-06 08:00:00,E2
";

    fn app() -> App {
        let dashboard = Dashboard::new(load_bytes(CSV.as_bytes()).unwrap(), ViewLimits::default());
        App::new(dashboard, &Config::default())
    }

    #[test]
    fn test_tab_navigation() {
        let mut app = app();
        app.handle_key(KeyCode::BackTab);
        assert_eq!(app.tab, Tab::Hierarchy);
        app.handle_key(KeyCode::Tab);
        assert_eq!(app.tab, Tab::Trend);
        app.handle_key(KeyCode::Char('3'));
        assert_eq!(app.tab, Tab::TopErrors);
        assert!(app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn test_enter_filters_and_c_clears() {
        let mut app = app();
        app.handle_key(KeyCode::Char('2'));
        assert_eq!(
            app.selected_event(),
            Some(ChartEvent::TestItemBar { x: "T1".into() })
        );
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.view.filtered_records, 2);
        assert_eq!(app.view.active_filters, vec!["Test Item: T1"]);

        app.handle_key(KeyCode::Char('c'));
        assert_eq!(app.view.filtered_records, 3);
    }

    #[test]
    fn test_hierarchy_root_clears_path() {
        let mut app = app();
        app.handle_key(KeyCode::Char('6'));
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Enter);
        assert!(app.view.filtered_records < 3);

        // Row 0 is the root node
        app.selected_row = 0;
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.view.filtered_records, 3);
    }

    #[test]
    fn test_row_wraps() {
        let mut app = app();
        app.handle_key(KeyCode::Up);
        assert_eq!(app.selected_row, 2);
        app.handle_key(KeyCode::Down);
        assert_eq!(app.selected_row, 0);
    }

    #[test]
    fn test_dropdowns_and_reset() {
        let mut app = app();
        app.handle_key(KeyCode::Char('m'));
        assert_eq!(app.view.filtered_records, 2);
        app.handle_key(KeyCode::Char(']'));
        assert_eq!(app.view.filtered_records, 1);
        app.handle_key(KeyCode::Char('R'));
        // Dropdowns survive a reset
        assert_eq!(app.view.filtered_records, 2);
    }

    #[test]
    fn test_reload_failure_keeps_dataset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tickets.csv");
        fs::write(&path, CSV).unwrap();
        let dashboard = Dashboard::new(loader::load_file(&path).unwrap(), ViewLimits::default());
        let mut app = App::new(dashboard, &Config::default());

        fs::write(&path, "model,stage\nA,FT\n").unwrap();
        app.handle_key(KeyCode::Char('o'));
        assert!(app.status_message.starts_with("Reload failed"));
        assert_eq!(app.view.total_records, 3);

        fs::write(&path, "model,error_message\nC,boom\n").unwrap();
        app.handle_key(KeyCode::Char('o'));
        assert_eq!(app.view.total_records, 1);
    }

    #[test]
    fn test_export_writes_filtered_rows() {
        let dir = tempdir().unwrap();
        let mut app = app();
        app.export_path = dir.path().join("out.csv");
        app.handle_key(KeyCode::Char('r'));
        app.handle_key(KeyCode::Char('e'));
        assert!(app.status_message.starts_with("Exported 2 records"));
        let text = fs::read_to_string(&app.export_path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
