use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::resolve::{AvailabilityGrid, CellStatus};
use crate::search::RoomSummary;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(rows = grid.rows().len(), days = grid.dates().len()))]
    pub fn print_grid(&self, grid: &AvailabilityGrid) -> anyhow::Result<()> {
        let color = self.color && io::stdout().is_terminal();
        write_grid(io::stdout().lock(), grid, color)
    }

    #[tracing::instrument(skip_all, fields(units = catalog.len()))]
    pub fn print_rooms(&self, catalog: &Catalog) -> anyhow::Result<()> {
        write_rooms(io::stdout().lock(), catalog)
    }

    #[tracing::instrument(skip_all, fields(results = results.len()))]
    pub fn print_search(&self, results: &[RoomSummary]) -> anyhow::Result<()> {
        let color = self.color && io::stdout().is_terminal();
        write_search(io::stdout().lock(), results, color)
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }
}

pub fn write_grid<W: Write>(
    mut writer: W,
    grid: &AvailabilityGrid,
    color: bool,
) -> anyhow::Result<()> {
    let Some(first) = grid.dates().first() else {
        writeln!(writer, "(empty window)")?;
        return Ok(());
    };
    writeln!(writer, "{}", first.naive().format("%B %Y"))?;

    let mut headers = vec!["Room".to_string()];
    headers.extend(
        grid.dates()
            .iter()
            .map(|date| date.naive().format("%d %a").to_string()),
    );

    let rows = grid
        .rows()
        .iter()
        .map(|row| {
            let mut cells = vec![row.unit_name.clone()];
            cells.extend(row.cells.iter().map(|cell| paint_cell(cell, color)));
            cells
        })
        .collect();

    write_table(&mut writer, headers, rows)?;
    writeln!(
        writer,
        "price/stock = available   x = not available   # = closed for sale"
    )?;
    Ok(())
}

pub fn write_rooms<W: Write>(mut writer: W, catalog: &Catalog) -> anyhow::Result<()> {
    let headers = ["ID", "Name", "Price", "Guests", "Beds", "Size", "Features", "Bookings"]
        .map(String::from)
        .to_vec();

    let rows = catalog
        .units()
        .iter()
        .map(|unit| {
            vec![
                unit.id.to_string(),
                unit.name.clone(),
                unit.base_price.to_string(),
                opt(unit.capacity),
                opt(unit.beds),
                unit.size_m2.map(|s| format!("{s} m²")).unwrap_or_default(),
                unit.features.join(", "),
                unit.reservations.len().to_string(),
            ]
        })
        .collect();

    write_table(&mut writer, headers, rows)
}

pub fn write_search<W: Write>(
    mut writer: W,
    results: &[RoomSummary],
    color: bool,
) -> anyhow::Result<()> {
    let headers = ["ID", "Name", "Price/night", "Guests", "Beds", "Size", "Features", "Status"]
        .map(String::from)
        .to_vec();

    let rows = results
        .iter()
        .map(|room| {
            let status = if room.bookable {
                paint("book now", "32", color)
            } else {
                paint("not available", "31", color)
            };
            vec![
                room.id.to_string(),
                room.name.clone(),
                room.nightly_price.to_string(),
                opt(room.capacity),
                opt(room.beds),
                room.size_m2.map(|s| format!("{s} m²")).unwrap_or_default(),
                room.features.join(", "),
                status,
            ]
        })
        .collect();

    write_table(&mut writer, headers, rows)
}

fn paint_cell(cell: &CellStatus, color: bool) -> String {
    match cell {
        CellStatus::Available { price, stock } => paint(&format!("{price}/{stock}"), "32", color),
        CellStatus::Unavailable => paint("x", "31", color),
        CellStatus::Closed => paint("#", "90", color),
    }
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn opt(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        let padding = width.saturating_sub(UnicodeWidthStr::width(header.as_str()));
        write!(writer, "{}{} ", header, " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Pricing, WeeklyClosure};
    use crate::resolve::resolve;
    use crate::window::generate_window;

    #[test]
    fn grid_table_marks_each_status() {
        let catalog = Catalog::demo();
        let window = generate_window("2024-03-16".parse().expect("date"), 3);
        let grid = resolve(catalog.units(), &window, WeeklyClosure::sundays(), Pricing::default());

        let mut buf = Vec::new();
        write_grid(&mut buf, &grid, false).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "March 2024");
        assert!(lines[1].contains("16 Sat"));
        assert!(lines[1].contains("17 Sun"));
        // Deluxe: reserved, closed, reserved.
        assert!(lines[3].starts_with("Deluxe Oda"));
        assert!(lines[3].contains(" x "));
        assert!(lines[3].contains(" # "));
        // Suite is free on the 16th.
        assert!(lines[4].contains("132/1"));
    }

    #[test]
    fn empty_grid_renders_placeholder() {
        let mut buf = Vec::new();
        write_grid(&mut buf, &AvailabilityGrid::default(), false).expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "(empty window)\n");
    }

    #[test]
    fn ansi_is_ignored_for_widths() {
        assert_eq!(strip_ansi(&paint("x", "31", true)), "x");
    }
}
