use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState, Wrap,
    },
};

use crate::tui_app::{App, InputMode, SortOrder, StatusFilter};
use agentfit_core::format::{format_bytes, format_context, format_context_options, format_headroom};
use agentfit_core::{CompatibilityStatus, MemoryPressure, context_length_multiplier, max_parallel_agents};

pub fn draw(frame: &mut Frame, app: &mut App) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // system info bar
            Constraint::Length(3), // parameters + search + filters
            Constraint::Min(10),   // main table
            Constraint::Length(1), // status bar
        ])
        .split(frame.area());

    draw_system_bar(frame, app, outer[0]);
    draw_parameter_bar(frame, app, outer[1]);

    if app.show_detail {
        draw_detail(frame, app, outer[2]);
    } else {
        draw_table(frame, app, outer[2]);
    }

    draw_status_bar(frame, app, outer[3]);
}

fn status_color(status: CompatibilityStatus) -> Color {
    match status {
        CompatibilityStatus::Ok => Color::Green,
        CompatibilityStatus::Heavy => Color::Yellow,
        CompatibilityStatus::Ng => Color::Red,
    }
}

fn pressure_color(pressure: MemoryPressure) -> Color {
    match pressure {
        MemoryPressure::Nominal => Color::Green,
        MemoryPressure::Warning => Color::Yellow,
        MemoryPressure::Critical => Color::Red,
    }
}

fn separator() -> Span<'static> {
    Span::styled("  │  ", Style::default().fg(Color::DarkGray))
}

fn draw_system_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut cpu = match &app.system.chip {
        Some(chip) if !app.system.cpu_model.contains(chip.as_str()) => {
            format!("{} / {} ({} cores", app.system.cpu_model, chip, app.system.cpu_cores)
        }
        _ => format!("{} ({} cores", app.system.cpu_model, app.system.cpu_cores),
    };
    if let Some(gpu_cores) = app.system.gpu_cores {
        cpu.push_str(&format!(", {gpu_cores} GPU"));
    }
    cpu.push(')');

    let text = Line::from(vec![
        Span::styled(" CPU: ", Style::default().fg(Color::DarkGray)),
        Span::styled(cpu, Style::default().fg(Color::White)),
        separator(),
        Span::styled("RAM: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!(
                "{} free / {} total",
                format_bytes(app.memory.free_ram_bytes as f64),
                format_bytes(app.memory.total_ram_bytes as f64)
            ),
            Style::default().fg(Color::Cyan),
        ),
        separator(),
        Span::styled("Pressure: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            app.dynamic.memory_pressure.label(),
            Style::default().fg(pressure_color(app.dynamic.memory_pressure)),
        ),
        separator(),
        Span::styled("Load: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{:.1}%", app.dynamic.cpu_load_percent),
            Style::default().fg(Color::White),
        ),
        separator(),
        Span::styled(
            format!(
                "updated {}",
                app.dynamic
                    .timestamp
                    .with_timezone(&chrono::Local)
                    .format("%H:%M:%S")
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let title = if app.demo {
        " agentfit (demo) "
    } else {
        " agentfit "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title)
        .title_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn small_box(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title)
        .title_style(Style::default().fg(Color::DarkGray))
}

fn draw_parameter_bar(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(30),    // search
            Constraint::Length(16), // agents
            Constraint::Length(18), // context
            Constraint::Length(14), // sort
            Constraint::Length(21), // status filter
        ])
        .split(area);

    // Search box
    let search_style = match app.input_mode {
        InputMode::Search => Style::default().fg(Color::Yellow),
        InputMode::Normal => Style::default().fg(Color::DarkGray),
    };

    let search_text = if app.search_query.is_empty() && app.input_mode == InputMode::Normal {
        Line::from(Span::styled(
            "Press / to search...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(Span::styled(
            &app.search_query,
            Style::default().fg(Color::White),
        ))
    };

    let search_block = Block::default()
        .borders(Borders::ALL)
        .border_style(search_style)
        .title(" Search ")
        .title_style(search_style);
    frame.render_widget(Paragraph::new(search_text).block(search_block), chunks[0]);

    if app.input_mode == InputMode::Search {
        let typed = app.search_query[..app.cursor_position].chars().count();
        frame.set_cursor_position((chunks[0].x + typed as u16 + 1, chunks[0].y + 1));
    }

    let agents = Paragraph::new(Line::from(Span::styled(
        format!(" {}", app.agents()),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )))
    .block(small_box(" Agents [+/-] "));
    frame.render_widget(agents, chunks[1]);

    let multiplier = context_length_multiplier(app.params.context_length);
    let context = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {}", format_context(app.params.context_length)),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  x{:.2}", multiplier),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(small_box(" Context [c/C] "));
    frame.render_widget(context, chunks[2]);

    let sort_color = match app.sort_order {
        SortOrder::Catalog => Color::White,
        SortOrder::Headroom => Color::Cyan,
    };
    let sort = Paragraph::new(Line::from(Span::styled(
        format!(" {}", app.sort_order.label()),
        Style::default().fg(sort_color),
    )))
    .block(small_box(" Sort [s] "));
    frame.render_widget(sort, chunks[3]);

    let filter_style = match app.status_filter {
        StatusFilter::All => Style::default().fg(Color::White),
        StatusFilter::Runnable | StatusFilter::Ok => Style::default().fg(Color::Green),
        StatusFilter::Heavy => Style::default().fg(Color::Yellow),
        StatusFilter::Ng => Style::default().fg(Color::Red),
    };
    let filter = Paragraph::new(Line::from(Span::styled(
        format!(" {}", app.status_filter.label()),
        filter_style,
    )))
    .block(small_box(" Status [f] "));
    frame.render_widget(filter, chunks[4]);
}

fn draw_table(frame: &mut Frame, app: &App, area: Rect) {
    let header_names = [
        "", "Model", "Family", "Params", "Quant", "Needs", "Headroom", "Disk", "Ctx", "Status",
    ];
    let header_cells = header_names.iter().enumerate().map(|(i, h)| {
        // Headroom column doubles as the sort key indicator.
        if i == 6 && app.sort_order == SortOrder::Headroom {
            Cell::from(format!("{} ▼", h)).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
        }
    });
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .filtered
        .iter()
        .map(|&idx| {
            let r = &app.results[idx];
            let color = status_color(r.status);
            let ctx_color = if r.model.supports_context(app.params.context_length) {
                Color::DarkGray
            } else {
                Color::Magenta
            };

            Row::new(vec![
                Cell::from("●").style(Style::default().fg(color)),
                Cell::from(r.model.name.clone()).style(Style::default().fg(Color::White)),
                Cell::from(r.model.family.clone()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(r.model.parameter_size.clone()).style(Style::default().fg(Color::White)),
                Cell::from(r.model.quantization.clone())
                    .style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_bytes(r.required_ram_bytes))
                    .style(Style::default().fg(Color::White)),
                Cell::from(format_headroom(r.headroom_bytes)).style(Style::default().fg(color)),
                Cell::from(format_bytes(r.model.disk_size_bytes as f64))
                    .style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_context_options(&r.model.context_length_options))
                    .style(Style::default().fg(ctx_color)),
                Cell::from(r.status.label()).style(Style::default().fg(color)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(2),  // indicator
        Constraint::Min(18),    // model name
        Constraint::Length(8),  // family
        Constraint::Length(7),  // params
        Constraint::Length(8),  // quant
        Constraint::Length(9),  // needs
        Constraint::Length(17), // headroom
        Constraint::Length(9),  // disk
        Constraint::Length(15), // ctx
        Constraint::Length(16), // status
    ];

    let count_text = format!(" Models ({}/{}) ", app.filtered.len(), app.results.len());

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(count_text)
                .title_style(Style::default().fg(Color::White)),
        )
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(40, 40, 70))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    if !app.filtered.is_empty() {
        state.select(Some(app.selected_row));
    }

    frame.render_stateful_widget(table, area, &mut state);

    if app.filtered.len() > (area.height as usize).saturating_sub(3) {
        let mut scrollbar_state =
            ScrollbarState::new(app.filtered.len()).position(app.selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓")),
            area,
            &mut scrollbar_state,
        );
    }
}

fn field(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<20}", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("  ── {} ──", title),
        Style::default().fg(Color::Cyan),
    ))
}

fn draw_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(r) = app.selected() else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" No model selected ");
        frame.render_widget(block, area);
        return;
    };

    let color = status_color(r.status);
    let agents = app.agents();
    let ctx = app.params.context_length;
    let overhead = r.parallel_overhead_bytes(app.memory.free_ram_bytes);

    let mut lines = vec![
        Line::from(""),
        field("Model:", r.model.name.clone(), Color::White),
        field("Id:", r.model.id.clone(), Color::DarkGray),
        field("Family:", r.model.family.clone(), Color::White),
        field("Parameters:", r.model.parameter_size.clone(), Color::White),
        field("Quantization:", r.model.quantization.clone(), Color::White),
        field(
            "Disk size:",
            format_bytes(r.model.disk_size_bytes as f64),
            Color::White,
        ),
        field(
            "Context options:",
            format_context_options(&r.model.context_length_options),
            Color::White,
        ),
    ];
    if !r.model.description.is_empty() {
        lines.push(field("Description:", r.model.description.clone(), Color::Gray));
    }

    lines.extend([
        Line::from(""),
        section(&format!(
            "Sizing for {} agent{} at {} context",
            agents,
            if agents == 1 { "" } else { "s" },
            format_context(ctx)
        )),
        Line::from(""),
        field(
            "Base requirement:",
            format_bytes(r.model.base_required_ram_bytes as f64),
            Color::White,
        ),
        field(
            "Context multiplier:",
            format!("x{:.2}", context_length_multiplier(ctx)),
            Color::White,
        ),
        field("Per instance:", format_bytes(r.required_ram_bytes), Color::White),
        field(
            "Free RAM:",
            format_bytes(app.memory.free_ram_bytes as f64),
            Color::Cyan,
        ),
        field(
            "Parallel overhead:",
            format!(
                "{} ({} extra agent{} x 30%)",
                format_bytes(overhead),
                agents - 1,
                if agents == 2 { "" } else { "s" }
            ),
            Color::White,
        ),
        field(
            "Effective available:",
            format_bytes(r.effective_available_bytes.max(0.0)),
            Color::White,
        ),
        field("Headroom:", format_headroom(r.headroom_bytes), color),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format!("  {:<20}", "Verdict:"),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                format!("{} {}", r.status.emoji(), r.status.label()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ]),
    ]);

    let max_agents = match max_parallel_agents(&r.model, &app.memory, ctx) {
        Some(n) => format!("{n}"),
        None => "none (does not fit a single instance)".to_string(),
    };
    lines.push(field("Max parallel agents:", max_agents, Color::White));

    if !r.model.supports_context(ctx) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(
                "  {} context is not among this model's listed options",
                format_context(ctx)
            ),
            Style::default().fg(Color::Magenta),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(format!(" {} ", r.model.name))
        .title_style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (keys, mode_text) = match app.input_mode {
        InputMode::Normal => {
            let detail_key = if app.show_detail {
                "Enter:table"
            } else {
                "Enter:detail"
            };
            (
                format!(
                    " ↑↓/jk:nav  {}  +/-:agents  c/C:context  /:search  f:status  s:sort  q:quit",
                    detail_key
                ),
                "NORMAL",
            )
        }
        InputMode::Search => (
            "  Type to search  Esc:done  Ctrl-U:clear".to_string(),
            "SEARCH",
        ),
    };

    let counts = app.counts();
    let summary = format!(
        " {} OK · {} Heavy · {} NR ",
        counts.ok, counts.heavy, counts.ng
    );

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(20),
            Constraint::Length(summary.chars().count() as u16),
        ])
        .split(area);

    let status_line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_text),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(status_line), chunks[0]);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            summary,
            Style::default().fg(Color::White),
        ))),
        chunks[1],
    );
}
