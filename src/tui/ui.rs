use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::core::{BackgroundKind, ImagePayload, SessionPhase};

use super::app::{App, AppMode, SettingsField};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
    match app.mode {
        AppMode::Main | AppMode::Input => draw_main(frame, app),
        AppMode::Settings => draw_settings(frame, app),
    }
}

/// Draw main view: picker on the left, session on the right
fn draw_main(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Title/input
            Constraint::Min(10),    // Body
            Constraint::Length(3),  // Status bar
            Constraint::Length(2),  // Help line
        ])
        .split(frame.area());

    if app.mode == AppMode::Input {
        draw_input(frame, app, chunks[0]);
    } else {
        draw_title(frame, app, chunks[0]);
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    draw_picker(frame, app, body[0]);
    draw_session(frame, app, body[1]);
    draw_status(frame, app, chunks[2]);
    draw_help(frame, app, chunks[3]);
}

fn draw_title(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            "ID Photo",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" - Background Replacement", Style::default().fg(Color::Gray)),
    ];

    if !app.session.has_credential() {
        spans.push(Span::styled(
            "  No API key: set GEMINI_API_KEY or api.key",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let title = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(title, area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(app.input_target.title()),
        );
    frame.render_widget(input, area);

    let cursor_col = app.input[..app.cursor_pos].chars().count() as u16;
    frame.set_cursor_position((area.x + cursor_col + 1, area.y + 1));
}

fn draw_picker(frame: &mut Frame, app: &App, area: Rect) {
    let selected_id = app.session.state().selected_background.id;
    let mut items: Vec<ListItem> = Vec::new();
    let mut current_category = None;

    for (i, bg) in app.backgrounds.iter().enumerate() {
        if current_category != Some(bg.category) {
            current_category = Some(bg.category);
            items.push(ListItem::new(Line::from(Span::styled(
                bg.category.label(),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
            ))));
        }

        let marker = if bg.id == selected_id { "● " } else { "  " };
        let swatch = match bg.kind {
            BackgroundKind::Solid => Span::styled("■ ", Style::default().fg(hex_color(bg.value))),
            BackgroundKind::Transparent => Span::styled("□ ", Style::default().fg(Color::White)),
            BackgroundKind::Template => Span::styled("▦ ", Style::default().fg(Color::Magenta)),
            BackgroundKind::Custom => Span::styled("+ ", Style::default().fg(Color::Yellow)),
        };

        let name_style = if i == app.highlighted {
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD)
        } else if bg.id == selected_id {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::White)
        };

        items.push(ListItem::new(Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Green)),
            swatch,
            Span::styled(bg.display_name, name_style),
        ])));
    }

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Backgrounds ({})", app.backgrounds.len())),
    );
    frame.render_widget(list, area);
}

fn draw_session(frame: &mut Frame, app: &App, area: Rect) {
    let session = &app.session;
    let state = session.state();

    let phase_color = match session.phase() {
        SessionPhase::Idle => Color::Gray,
        SessionPhase::Ready => Color::Green,
        SessionPhase::Processing => Color::Yellow,
        SessionPhase::Error => Color::Red,
    };

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Gray));
    let value = |text: String| Span::styled(text, Style::default().fg(Color::White));

    let photo = match &app.subject_path {
        Some(path) => path.display().to_string(),
        None => "(none, press o to open)".to_string(),
    };

    let mut lines = vec![
        Line::from(vec![
            label("Status:     "),
            Span::styled(session.phase().to_string(), Style::default().fg(phase_color)),
        ]),
        Line::from(vec![label("Photo:      "), value(photo)]),
        Line::from(vec![
            label("Background: "),
            value(format!(
                "{} ({})",
                state.selected_background.display_name, state.selected_background.id
            )),
        ]),
    ];

    if let Some(path) = &app.custom_path {
        lines.push(Line::from(vec![
            label("Custom:     "),
            value(path.display().to_string()),
        ]));
    }

    lines.push(Line::from(""));

    match &state.processed_image {
        Some(processed) => {
            let mut spans = vec![
                Span::styled(
                    "Result:     ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                value(format!(
                    "{} ({})",
                    processed.background_id,
                    size_label(&processed.image)
                )),
            ];
            if session.result_is_stale() {
                spans.push(Span::styled(
                    "  outdated, press g",
                    Style::default().fg(Color::Yellow),
                ));
            }
            lines.push(Line::from(spans));
        }
        None if session.phase() == SessionPhase::Processing => {
            lines.push(Line::from(Span::styled(
                "Replacing background...",
                Style::default().fg(Color::Yellow),
            )));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "No result yet",
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    if let Some(path) = &app.saved_path {
        lines.push(Line::from(vec![
            label("Saved:      "),
            Span::styled(path.display().to_string(), Style::default().fg(Color::Green)),
        ]));
    }

    if let Some(err) = &state.error_message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            err.as_str(),
            Style::default().fg(Color::Red),
        )));
    }

    let details = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Photo"))
        .wrap(Wrap { trim: true });
    frame.render_widget(details, area);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let (message, style) = if let Some(err) = &app.error_message {
        (err.as_str(), Style::default().fg(Color::Red))
    } else if let Some(status) = &app.status_message {
        (status.as_str(), Style::default().fg(Color::Green))
    } else if app.is_processing() {
        ("Processing...", Style::default().fg(Color::Yellow))
    } else {
        ("Ready", Style::default().fg(Color::Gray))
    };

    let status = Paragraph::new(message)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}

fn draw_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = match app.mode {
        AppMode::Input => "Enter: Load | Esc: Cancel",
        AppMode::Main => {
            "o: Open photo | u: Upload background | Enter: Apply | g: Regenerate | w: Save | x: Reset | s: Settings | q: Quit"
        }
        AppMode::Settings => "",
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}

/// Draw settings screen
fn draw_settings(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Min(10),    // Settings list
            Constraint::Length(3),  // Status
            Constraint::Length(2),  // Help
        ])
        .split(area);

    // Header
    let header = Paragraph::new("Settings")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, chunks[0]);

    // Settings list
    let fields = SettingsField::all();
    let items: Vec<ListItem> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let is_selected = i == app.settings_selected;
            let value = if app.settings_editing && is_selected {
                format!("{}▏", app.settings_edit_buffer)
            } else {
                app.get_settings_value(field)
            };

            let has_options = app.get_settings_options(field).is_some();
            let hint = if has_options { " [cycle]" } else { "" };

            let content = Line::from(vec![
                Span::styled(
                    format!("{:<20}", field.label()),
                    if is_selected {
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(Color::White)
                    },
                ),
                Span::styled(
                    format!("{}{}", value, hint),
                    if is_selected && app.settings_editing {
                        Style::default().fg(Color::Yellow)
                    } else {
                        Style::default().fg(Color::Gray)
                    },
                ),
            ]);

            ListItem::new(content)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(list, chunks[1]);

    // Status
    draw_status(frame, app, chunks[2]);

    // Help
    let help_text = if app.settings_editing {
        "Enter: Save | Esc: Cancel"
    } else {
        "↑↓: Navigate | Enter/Space: Edit/Toggle | Esc/q: Back"
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[3]);
}

fn size_label(image: &ImagePayload) -> String {
    format!("{} KB", image.encoded_len() / 1024)
}

/// Parse `#RRGGBB` into a terminal color, gray when malformed
fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return Color::Gray;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Gray,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::{BackgroundDescriptor, BackgroundGenerator, IdPhotoError};
    use async_trait::async_trait;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    struct NeverCalled;

    #[async_trait]
    impl BackgroundGenerator for NeverCalled {
        async fn generate(
            &self,
            _subject: &ImagePayload,
            _background: &BackgroundDescriptor,
            _custom_background: Option<&ImagePayload>,
        ) -> Result<ImagePayload, IdPhotoError> {
            Err(IdPhotoError::GenerationEmpty)
        }
    }

    fn never_called() -> crate::tui::app::GeneratorFactory {
        Box::new(|_: &Config| Arc::new(NeverCalled) as Arc<dyn BackgroundGenerator>)
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_size_label_counts_decoded_bytes() {
        let image = ImagePayload::from_bytes(&vec![0u8; 3 * 1024], "image/png");
        assert_eq!(size_label(&image), "3 KB");
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#438EDB"), Color::Rgb(0x43, 0x8E, 0xDB));
        assert_eq!(hex_color("#FFF"), Color::Gray);
        assert_eq!(hex_color("#GGGGGG"), Color::Gray);
    }

    #[test]
    fn test_main_view_lists_backgrounds_and_warns_without_key() {
        let app = App::new(Config::default(), never_called());
        let screen = render(&app);
        assert!(screen.contains("Standard Blue"));
        assert!(screen.contains("Creative"));
        assert!(screen.contains("No API key"));
    }

    #[test]
    fn test_settings_view_renders_fields() {
        let mut app = App::new(Config::default(), never_called());
        app.mode = AppMode::Settings;
        let screen = render(&app);
        assert!(screen.contains("Default Background"));
        assert!(screen.contains("gemini-2.5-flash-image"));
    }
}
