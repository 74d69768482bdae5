//! Draws the sidebar, tab bar, active terminal and status line.

use neurossh_logging::safe_truncate;
use neurossh_terminal::{CellStyle, Color as CellColor, ScreenSnapshot, StyledRow};
use neurossh_types::BridgeState;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs};
use ratatui::Frame;

use super::keymap::help_rows;
use super::state::{App, Focus, SidebarEntry};

const SIDEBAR_WIDTH: u16 = 30;
/// Longest label that fits inside the sidebar border with indentation
const SIDEBAR_LABEL: usize = SIDEBAR_WIDTH as usize - 5;

pub fn render(app: &App, frame: &mut Frame) {
    let [sidebar, main] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)]).areas(frame.area());
    let [tab_bar, terminal, status] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(main);

    render_sidebar(app, frame, sidebar);
    render_tab_bar(app, frame, tab_bar);
    render_terminal(app, frame, terminal);
    render_status(app, frame, status);

    if app.show_help {
        render_help(frame, main);
    }
}

fn focus_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = app
        .entries
        .iter()
        .map(|entry| match entry {
            SidebarEntry::Folder(name) => {
                ListItem::new(Line::from(safe_truncate(name, SIDEBAR_LABEL).bold()))
            }
            SidebarEntry::Session(config) => ListItem::new(Line::from(format!(
                "  {}",
                safe_truncate(config.display_name(), SIDEBAR_LABEL)
            ))),
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Sessions ")
                .borders(Borders::ALL)
                .border_style(focus_border(app.focus == Focus::Sidebar)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    if !app.entries.is_empty() {
        state.select(Some(app.cursor));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn state_color(state: &BridgeState) -> Color {
    match state {
        BridgeState::Connected => Color::Green,
        BridgeState::Connecting | BridgeState::Disconnected => Color::Yellow,
        BridgeState::Failed(_) => Color::Red,
        BridgeState::Closed => Color::DarkGray,
    }
}

fn render_tab_bar(app: &App, frame: &mut Frame, area: Rect) {
    let tabs = app.manager.tabs();
    if tabs.is_empty() {
        frame.render_widget(Paragraph::new(" no open tabs".dark_gray()), area);
        return;
    }

    let selected = tabs.iter().position(|tab| tab.active);
    let titles: Vec<Line> = tabs
        .iter()
        .map(|tab| {
            Line::from(vec![
                Span::raw(format!("{} ", tab.title)),
                Span::styled(format!("[{}]", tab.state.label()), Style::default().fg(state_color(&tab.state))),
            ])
        })
        .collect();

    let mut widget = Tabs::new(titles)
        .divider("|")
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
    if let Some(index) = selected {
        widget = widget.select(index);
    }
    frame.render_widget(widget, area);
}

fn render_terminal(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == Focus::Terminal;
    let Some(view) = &app.view else {
        let splash = Paragraph::new("Select a session and press Enter to connect.")
            .dark_gray()
            .block(Block::default().borders(Borders::ALL).border_style(focus_border(focused)));
        frame.render_widget(splash, area);
        return;
    };

    let mut title = format!(" {} [{}] ", view.title, view.state.label());
    if let Some(reason) = app.manager.failure(view.id) {
        let room = (area.width as usize).saturating_sub(view.title.chars().count() + 16);
        title = format!(" {} [{}: {}] ", view.title, view.state.label(), safe_truncate(&reason, room));
    }
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(state_color(&view.state))))
        .borders(Borders::ALL)
        .border_style(focus_border(focused));
    let inner = block.inner(area);

    frame.render_widget(Paragraph::new(screen_lines(&view.snapshot)).block(block), area);

    let (row, col) = view.snapshot.cursor;
    if focused && view.snapshot.cursor_visible && row < inner.height && col < inner.width {
        frame.set_cursor_position(Position::new(inner.x + col, inner.y + row));
    }
}

/// Convert a screen snapshot into styled lines
pub fn screen_lines(snapshot: &ScreenSnapshot) -> Vec<Line<'static>> {
    snapshot.rows.iter().map(row_line).collect()
}

fn row_line(row: &StyledRow) -> Line<'static> {
    Line::from(
        row.spans
            .iter()
            .map(|span| Span::styled(span.text.clone(), cell_style(&span.style)))
            .collect::<Vec<_>>(),
    )
}

fn cell_style(style: &CellStyle) -> Style {
    let mut out = Style::default().fg(map_color(style.fg)).bg(map_color(style.bg));
    if style.bold {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.italic {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.underline {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    if style.inverse {
        out = out.add_modifier(Modifier::REVERSED);
    }
    out
}

fn map_color(color: CellColor) -> Color {
    match color {
        CellColor::Default => Color::Reset,
        CellColor::Indexed(idx) => Color::Indexed(idx),
        CellColor::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let focus = match app.focus {
        Focus::Sidebar => "SIDEBAR",
        Focus::Terminal => "TERMINAL",
    };
    let mut spans = vec![Span::styled(
        format!(" {} ", focus),
        Style::default().fg(Color::Black).bg(Color::Cyan),
    )];
    if app.manager.is_broadcasting() {
        spans.push(Span::styled(" BROADCAST ", Style::default().fg(Color::Black).bg(Color::Magenta)));
    }
    if let Some(status) = &app.status {
        spans.push(Span::raw(format!(" {}", status)));
    }
    spans.push(Span::raw("  F1 help (sidebar)").dark_gray());
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let rows = help_rows();
    let width = area.width.min(60);
    let height = area.height.min(rows.len() as u16 + 4);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let lines: Vec<Line> = rows
        .into_iter()
        .map(|(chord, text)| {
            Line::from(vec![
                Span::styled(format!("{:<24}", chord), Style::default().fg(Color::Cyan)),
                Span::raw(text),
            ])
        })
        .collect();

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Keys (any key closes) ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        ),
        popup,
    );
}
