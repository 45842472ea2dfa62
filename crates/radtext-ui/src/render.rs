use crate::app::{form_rows, EditorApp, FormRow, Popup, StatusKind, TemplateForm, TemplatePicker};
use crate::common::{centered_rect, popup_block};
use radtext_core::{Generation, GenerationAction, KeyValueStore};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

const HELP_TEXT: &str =
    "Ctrl+T: Templates | F1: AutoTexto | Ctrl+G: Assistant | Ctrl+Y: Copy | Ctrl+S: Save | Esc: Quit";

/// Draw the whole editor screen
pub fn draw<B: Backend, S: KeyValueStore>(f: &mut Frame<B>, app: &EditorApp<S>) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Report
            Constraint::Length(3), // Status
            Constraint::Length(1), // Help text
        ])
        .split(size);

    draw_report(f, app, chunks[0]);
    draw_status(f, app, chunks[1]);

    let help = Paragraph::new(HELP_TEXT)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);

    match &app.popup {
        Some(Popup::Templates(picker)) => draw_template_picker(f, app, picker),
        Some(Popup::TemplateForm(form)) => draw_template_form(f, app, form),
        Some(Popup::Triggers { scroll }) => draw_trigger_help(f, app, *scroll),
        Some(Popup::GenerationMenu { selected }) => draw_generation_menu(f, *selected),
        Some(Popup::GenerationResult(generation)) => draw_generation_result(f, generation),
        None => {}
    }
}

fn draw_report<B: Backend, S: KeyValueStore>(f: &mut Frame<B>, app: &EditorApp<S>, area: Rect) {
    let title = match &app.file {
        Some(path) => format!(" {}{} ", path.display(), if app.dirty { " *" } else { "" }),
        None => format!(" radtext v{}{} ", env!("CARGO_PKG_VERSION"), if app.dirty { " *" } else { "" }),
    };

    let buffer = app.session.buffer();
    let (line, column) = buffer.cursor_position();
    let inner_height = area.height.saturating_sub(2) as usize;
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_y = (line + 1).saturating_sub(inner_height);
    let scroll_x = (column + 1).saturating_sub(inner_width);

    let report = Paragraph::new(buffer.text())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        )
        .scroll((scroll_y as u16, scroll_x as u16));
    f.render_widget(report, area);

    if app.popup.is_none() {
        f.set_cursor(
            area.x + 1 + column.saturating_sub(scroll_x) as u16,
            area.y + 1 + line.saturating_sub(scroll_y) as u16,
        );
    }
}

fn draw_status<B: Backend, S: KeyValueStore>(f: &mut Frame<B>, app: &EditorApp<S>, area: Rect) {
    let stats = app.session.stats();
    let (line, column) = app.session.buffer().cursor_position();

    let mut spans = vec![
        Span::styled(
            format!("{} palavras | {} caracteres | {}% ", stats.words, stats.characters, stats.progress),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("Ln {}, Col {} ", line + 1, column + 1),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if let Some(status) = &app.status {
        let color = match status.kind {
            StatusKind::Info => Color::Yellow,
            StatusKind::Success => Color::Green,
            StatusKind::Error => Color::Red,
        };
        spans.push(Span::styled(format!("| {}", status.text), Style::default().fg(color)));
    }

    let status = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn draw_template_picker<B: Backend, S: KeyValueStore>(
    f: &mut Frame<B>,
    app: &EditorApp<S>,
    picker: &TemplatePicker,
) {
    let area = centered_rect(70, 70, f.size());
    f.render_widget(Clear, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let search = Paragraph::new(picker.query.as_str())
        .block(popup_block(" Search templates "));
    f.render_widget(search, chunks[0]);

    let favorites = app.session.templates().favorite_ids();
    let items: Vec<ListItem> = app
        .template_results(&picker.query)
        .into_iter()
        .map(|template| {
            let star = if favorites.contains(&template.id) { "★ " } else { "  " };
            ListItem::new(Line::from(vec![
                Span::styled(star, Style::default().fg(Color::Yellow)),
                Span::styled(template.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(
                    format!("  {} · {} · {}", template.modality, template.body_part, template.template_type),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(picker.selected));
    }
    let list = List::new(items)
        .block(popup_block(" Templates "))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[1], &mut state);

    let help = Paragraph::new("↑/↓: Navigate | Enter: Insert | Ctrl+E: Fields | Ctrl+F: Favourite | Esc: Close")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);
}

fn draw_template_form<B: Backend, S: KeyValueStore>(
    f: &mut Frame<B>,
    app: &EditorApp<S>,
    form: &TemplateForm,
) {
    let area = centered_rect(70, 70, f.size());
    f.render_widget(Clear, area);

    let (Some(template), Ok(values)) = (
        app.session.templates().get(&form.template_id),
        app.session.select_template(&form.template_id),
    ) else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3), Constraint::Length(1)])
        .split(area);

    let items: Vec<ListItem> = form_rows(template)
        .into_iter()
        .map(|row| match row {
            FormRow::Section(s) => {
                let section = &template.sections[s];
                let mut spans = vec![Span::styled(
                    section.title.clone(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )];
                if section.is_optional {
                    let (label, color) = if values.is_section_enabled(&section.id) {
                        ("  [included]", Color::Green)
                    } else {
                        ("  [omitted]", Color::DarkGray)
                    };
                    spans.push(Span::styled(label, Style::default().fg(color)));
                }
                ListItem::new(Line::from(spans))
            }
            FormRow::Field(s, i) => {
                let field = &template.sections[s].dynamic_fields[i];
                let value = values
                    .get(&field.id)
                    .map(|v| v.render(field.unit.as_deref()))
                    .unwrap_or_else(|| "-".to_string());
                ListItem::new(Line::from(vec![
                    Span::raw(format!("  {}: ", field.name)),
                    Span::styled(value, Style::default().fg(Color::Yellow)),
                ]))
            }
        })
        .collect();

    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(form.selected));
    }
    let list = List::new(items)
        .block(popup_block(format!(" {} ", template.name)))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[0], &mut state);

    let input = match &form.input {
        Some(input) => Paragraph::new(input.text.as_str()).block(popup_block(" Value ")),
        None => Paragraph::new("").block(popup_block(" Value ")),
    };
    f.render_widget(input, chunks[1]);

    let help = Paragraph::new("↑/↓: Navigate | Enter: Change | Tab: Insert | Esc: Back")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);
}

fn draw_trigger_help<B: Backend, S: KeyValueStore>(f: &mut Frame<B>, app: &EditorApp<S>, scroll: u16) {
    let area = centered_rect(60, 80, f.size());
    f.render_widget(Clear, area);

    let mut lines = Vec::new();
    for (category, triggers) in app.session.registry().list_by_category() {
        lines.push(Line::from(Span::styled(
            category,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for entry in triggers {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<8}", entry.trigger), Style::default().fg(Color::Yellow)),
                Span::raw(entry.content.replace('\n', " ↵ ")),
            ]));
        }
        lines.push(Line::from(""));
    }

    let help = Paragraph::new(lines)
        .block(popup_block(" AutoTexto "))
        .scroll((scroll, 0));
    f.render_widget(help, area);
}

fn draw_generation_menu<B: Backend>(f: &mut Frame<B>, selected: usize) {
    let area = centered_rect(50, 40, f.size());
    f.render_widget(Clear, area);

    let items: Vec<ListItem> = GenerationAction::ALL
        .iter()
        .map(|action| ListItem::new(action.title()))
        .collect();
    let mut state = ListState::default();
    state.select(Some(selected));

    let list = List::new(items)
        .block(popup_block(" Assistant "))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_generation_result<B: Backend>(f: &mut Frame<B>, generation: &Generation) {
    let area = centered_rect(70, 60, f.size());
    f.render_widget(Clear, area);

    let footer = if generation.is_success() {
        "Enter: Add to report | c: Copy | Esc: Close"
    } else {
        "c: Copy | Esc: Close"
    };
    let color = if generation.is_success() { Color::White } else { Color::Red };

    let text = vec![
        Line::from(Span::styled(generation.text.clone(), Style::default().fg(color))),
        Line::from(""),
        Line::from(Span::styled(footer, Style::default().fg(Color::DarkGray))),
    ];
    let result = Paragraph::new(text)
        .block(popup_block(format!(" {} ", generation.title())))
        .wrap(Wrap { trim: false });
    f.render_widget(result, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use radtext_core::{EditorSession, MemoryStore, OfflineGenerator};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol.as_str())
            .collect()
    }

    #[test]
    fn test_draws_report_and_stats() {
        let mut session = EditorSession::new(MemoryStore::new());
        session.type_text("Exame sem /n ");
        let app = EditorApp::new(&mut session, &OfflineGenerator, None);

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();

        let screen = screen(&terminal);
        assert!(screen.contains("Exame sem normal"));
        assert!(screen.contains("3 palavras"));
    }

    #[test]
    fn test_draws_template_form_with_values() {
        let mut session = EditorSession::new(MemoryStore::new());
        session
            .set_section_enabled("ct-chest-normal", "comparison", true)
            .unwrap();
        let mut app = EditorApp::new(&mut session, &OfflineGenerator, None);
        app.popup = Some(Popup::TemplateForm(TemplateForm::new(
            "ct-chest-normal",
            TemplatePicker::default(),
        )));

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();

        let screen = screen(&terminal);
        assert!(screen.contains("CT Tórax Normal"));
        assert!(screen.contains("Nódulos: false"));
        assert!(screen.contains("Comparação  [included]"));
        assert!(screen.contains("Data do exame anterior: -"));
    }

    #[test]
    fn test_draws_trigger_help() {
        let mut session = EditorSession::new(MemoryStore::new());
        let mut app = EditorApp::new(&mut session, &OfflineGenerator, None);
        app.popup = Some(Popup::Triggers { scroll: 0 });

        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();

        let screen = screen(&terminal);
        assert!(screen.contains("AutoTexto"));
        assert!(screen.contains("common"));
        assert!(screen.contains("preservado"));
    }
}
