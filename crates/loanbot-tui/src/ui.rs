use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use loanbot_core::format::{markup_to_lines, Segment};
use loanbot_core::DownloadStatus;
use unicode_width::UnicodeWidthChar;
use crate::app::{App, ChatEntry};

/// Convert formatted assistant markup into styled lines
fn markup_to_text_lines(markup: &str) -> Vec<Line<'static>> {
    markup_to_lines(markup)
        .into_iter()
        .map(|segments| {
            if segments.is_empty() {
                Line::default()
            } else {
                Line::from(segments.into_iter().map(segment_span).collect::<Vec<_>>())
            }
        })
        .collect()
}

fn segment_span(segment: Segment) -> Span<'static> {
    let mut style = Style::default();
    if segment.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if segment.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    Span::styled(segment.text, style)
}

/// Rough count of wrapped rows, using character count for UTF-8 text
fn wrapped_height(lines: &[Line], width: usize) -> u16 {
    let width = width.max(1);
    lines
        .iter()
        .map(|line| {
            let chars = line.width();
            if chars == 0 {
                1
            } else {
                chars.div_ceil(width) as u16
            }
        })
        .sum()
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for entry in &app.entries {
        match entry {
            ChatEntry::User(text) => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(text.clone()));
            }
            ChatEntry::Assistant(markup) => {
                lines.push(Line::from(Span::styled(
                    "Shivaay:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                lines.extend(markup_to_text_lines(markup));
            }
            ChatEntry::Offer(index) => {
                if let Some(offer) = app.offers.get(*index) {
                    let (color, hint) = match &offer.status {
                        DownloadStatus::Ready => (Color::Green, " (Ctrl+D)".to_string()),
                        DownloadStatus::Generating => (Color::Yellow, String::new()),
                        DownloadStatus::Downloaded(path) => {
                            (Color::Green, format!(" {}", path.display()))
                        }
                        DownloadStatus::Failed(_) => (Color::Red, String::new()),
                    };
                    lines.push(Line::from(vec![
                        Span::styled(
                            format!("[ {} ]", offer.label()),
                            Style::default().fg(color).add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(hint, Style::default().fg(Color::DarkGray)),
                    ]));
                    lines.push(Line::from(Span::styled(
                        format!(
                            "{} - INR {} at {}%",
                            offer.offer.name, offer.offer.amount, offer.offer.interest_rate
                        ),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
        }
        lines.push(Line::default());
    }

    if app.typing {
        lines.push(Line::from(Span::styled(
            "Shivaay:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Shivaay Loan Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.server_url.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat ");

    let text = if app.entries.is_empty() && !app.typing {
        Text::from(Span::styled(
            "Say hello to start your loan application...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(chat_lines(app))
    };

    let total = wrapped_height(&text.lines, app.chat_width as usize);
    let max_scroll = total.saturating_sub(app.chat_height);
    if app.follow_bottom || app.scroll > max_scroll {
        app.scroll = max_scroll;
    }

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let (border_color, title) = if app.listening {
        (Color::Red, " Listening... (Ctrl+R to stop) ")
    } else {
        (Color::Yellow, " Message ")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = input_viewport(&app.input, app.cursor, inner_width);

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

/// Visible slice of the input and the cursor column, scrolled horizontally
/// so the cursor stays in view. Columns are display width, not chars.
fn input_viewport(input: &str, cursor: usize, width: usize) -> (String, u16) {
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());
    let col = |c: &char| c.width().unwrap_or(0);
    let cursor_col: usize = chars[..cursor].iter().map(col).sum();

    let mut skip = 0;
    let mut skipped_cols = 0;
    while width > 0 && skip < cursor && cursor_col - skipped_cols >= width {
        skipped_cols += col(&chars[skip]);
        skip += 1;
    }

    let mut used = 0;
    let visible: String = chars[skip..]
        .iter()
        .take_while(|c| {
            used += col(*c);
            used <= width
        })
        .collect();

    (visible, (cursor_col - skipped_cols) as u16)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    if let Some(status) = &app.status {
        let line = Line::from(Span::styled(
            format!(" {} ", status),
            Style::default().bg(Color::Blue).fg(Color::White),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" ^T ", key_style),
        Span::styled(if app.tts_enabled { " mute " } else { " unmute " }, label_style),
    ];
    if app.voice_available() {
        hints.extend(vec![
            Span::styled(" ^R ", key_style),
            Span::styled(if app.listening { " stop mic " } else { " mic " }, label_style),
        ]);
    }
    hints.extend(vec![
        Span::styled(" ^D ", key_style),
        Span::styled(" download ", label_style),
        Span::styled(" ^L ", key_style),
        Span::styled(" new chat ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
