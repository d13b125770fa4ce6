use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;

use super::app::{App, AppMode, InputTarget, SettingsField};

/// Handle input in main mode
pub async fn handle_main_input(app: &mut App, key: KeyEvent) -> Result<()> {
    // Picker and generation keys are disabled while a request is in flight
    let busy = app.is_processing();

    match key.code {
        // Navigation
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Home => app.highlighted = 0,
        KeyCode::End => app.highlighted = app.backgrounds.len().saturating_sub(1),

        KeyCode::Char('o') | KeyCode::Char('i') | KeyCode::Char('/') if !busy => {
            app.begin_input(InputTarget::SubjectPhoto);
        }

        KeyCode::Char('u') if !busy => {
            app.begin_input(InputTarget::CustomBackground);
        }

        // Apply highlighted background
        KeyCode::Enter | KeyCode::Char(' ') if !busy => {
            app.clear_messages();
            app.apply_highlighted();
        }

        // Regenerate
        KeyCode::Char('g') if !busy => {
            app.clear_messages();
            app.regenerate();
        }

        // Save result
        KeyCode::Char('w') if !busy => {
            app.save_result().await?;
        }

        // Reset
        KeyCode::Char('x') => app.reset(),

        // Open settings
        KeyCode::Char('s') => {
            app.mode = AppMode::Settings;
            app.settings_selected = 0;
            app.settings_editing = false;
        }

        // Quit
        KeyCode::Char('q') | KeyCode::Esc => {
            app.should_quit = true;
        }

        KeyCode::Char('o' | 'i' | '/' | 'u' | 'g' | 'w') | KeyCode::Enter | KeyCode::Char(' ') => {
            app.set_status("Processing, please wait...");
        }

        _ => {}
    }
    Ok(())
}

/// Handle input in path input mode
pub async fn handle_input_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => {
            app.mode = AppMode::Main;
            app.input.clear();
            app.cursor_pos = 0;
        }

        KeyCode::Enter => {
            let raw = app.input.trim().to_string();
            if !raw.is_empty() {
                app.input.clear();
                app.cursor_pos = 0;
                app.mode = AppMode::Main;

                let path = expand_home(&raw);
                match app.input_target {
                    InputTarget::SubjectPhoto => app.open_subject(&path).await,
                    InputTarget::CustomBackground => app.upload_custom(&path).await,
                }
            }
        }

        KeyCode::Char(c) => {
            app.input.insert(app.cursor_pos, c);
            app.cursor_pos += c.len_utf8();
        }

        KeyCode::Backspace => {
            if let Some(c) = app.input[..app.cursor_pos].chars().next_back() {
                app.cursor_pos -= c.len_utf8();
                app.input.remove(app.cursor_pos);
            }
        }

        KeyCode::Delete => {
            if app.cursor_pos < app.input.len() {
                app.input.remove(app.cursor_pos);
            }
        }

        KeyCode::Left => {
            if let Some(c) = app.input[..app.cursor_pos].chars().next_back() {
                app.cursor_pos -= c.len_utf8();
            }
        }

        KeyCode::Right => {
            if let Some(c) = app.input[app.cursor_pos..].chars().next() {
                app.cursor_pos += c.len_utf8();
            }
        }

        KeyCode::Home => {
            app.cursor_pos = 0;
        }

        KeyCode::End => {
            app.cursor_pos = app.input.len();
        }

        _ => {}
    }
    Ok(())
}

/// Handle input in settings mode
pub fn handle_settings_input(app: &mut App, key: KeyEvent) -> Result<()> {
    let fields = SettingsField::all();

    if app.settings_editing {
        // Editing a text field
        match key.code {
            KeyCode::Esc => {
                app.settings_editing = false;
                app.settings_edit_buffer.clear();
            }

            KeyCode::Enter => {
                let field = fields[app.settings_selected];
                let value = app.settings_edit_buffer.clone();
                if let Err(e) = app.set_settings_value(&field, &value) {
                    app.set_error(e.to_string());
                } else {
                    app.set_status(format!("Updated {}", field.label()));
                }
                app.settings_editing = false;
                app.settings_edit_buffer.clear();
            }

            KeyCode::Char(c) => {
                app.settings_edit_buffer.push(c);
            }

            KeyCode::Backspace => {
                app.settings_edit_buffer.pop();
            }

            _ => {}
        }
    } else {
        // Navigation
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                if app.settings_selected > 0 {
                    app.settings_selected -= 1;
                }
            }

            KeyCode::Down | KeyCode::Char('j') => {
                if app.settings_selected < fields.len() - 1 {
                    app.settings_selected += 1;
                }
            }

            KeyCode::Enter | KeyCode::Char(' ') => {
                let field = &fields[app.settings_selected];

                // Check if this field has options to cycle
                if app.get_settings_options(field).is_some() {
                    app.cycle_settings_option(field)?;
                    app.set_status(format!("Updated {}", field.label()));
                } else {
                    // Enter edit mode for text fields
                    app.settings_editing = true;
                    app.settings_edit_buffer = app.get_settings_value(field);
                }
            }

            KeyCode::Esc | KeyCode::Char('q') => {
                app.mode = AppMode::Main;
                app.clear_messages();
            }

            _ => {}
        }
    }
    Ok(())
}

/// Expand a leading `~/` to the home directory
fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}
