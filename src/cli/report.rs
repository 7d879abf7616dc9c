//! Terminal rendering of the dashboard pages.
//!
//! Countries are colored by display region using the chart palette so the
//! reports read like a chart legend.

use crate::catalog::{IndicatorCatalog, region_color};
use crate::fit::FitResult;
use crate::views::{
    EmissionsView, EnergyThresholdView, LifeExpectancyView, LowCarbonView, ScatterPoint,
};
use colored::*;
use std::path::Path;

/// Terminal color for a palette color name
fn terminal_color(palette_color: &str) -> Color {
    match palette_color {
        // Black text disappears on dark terminals
        "black" => Color::White,
        "blue" => Color::Blue,
        "green" => Color::Green,
        "orange" => Color::TrueColor {
            r: 255,
            g: 165,
            b: 0,
        },
        "purple" => Color::Magenta,
        "red" => Color::Red,
        "brown" => Color::TrueColor {
            r: 165,
            g: 96,
            b: 42,
        },
        _ => Color::BrightBlack,
    }
}

fn region_label(region_name: &str) -> ColoredString {
    region_name.color(terminal_color(region_color(region_name)))
}

/// Thousands separators for kWh figures, e.g. 12,345
fn format_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if value < 0.0 && digits != "0" {
        grouped.insert(0, '-');
    }
    grouped
}

fn print_heading(title: &str) {
    println!();
    println!("{}", title.bright_green().bold());
    println!("{}", "=".repeat(title.chars().count()).bright_green());
}

fn print_points(points: &[ScatterPoint], x_label: &str, y_label: &str) {
    if points.is_empty() {
        println!("{}", "No country has data for this selection.".yellow());
        return;
    }

    println!(
        "  {:<32} {:<28} {:>14} {:>10}",
        "Country".bold(),
        "Region".bold(),
        x_label.bold(),
        y_label.bold()
    );
    for point in points {
        println!(
            "  {:<32} {:<28} {:>14} {:>10.2}",
            point.label(),
            region_label(&point.region_name),
            format_thousands(point.x),
            point.y
        );
    }
}

fn print_fit(fit: Option<&FitResult>) {
    if let Some(fit) = fit {
        println!(
            "  {} {} ({} countries)",
            "Fit:".bold(),
            fit.label().bright_yellow(),
            fit.points()
        );
    }
}

pub fn print_catalog(catalog: &IndicatorCatalog) {
    print_heading("Indicator catalog");
    for (key, code) in catalog.iter() {
        println!("  {:<40} {}", key.bright_cyan(), code.bright_black());
    }
}

pub fn print_life_expectancy(view: &LifeExpectancyView) {
    print_heading(&format!(
        "Life expectancy and energy consumption ({})",
        view.year
    ));
    print_points(&view.points, "kWh/capita", "Years");
    println!();
    if let Some(mean) = view.mean_energy {
        println!("  {} {} kWh", "Mean energy use:".bold(), format_thousands(mean));
    }
    if let Some(mean) = view.mean_life_expectancy {
        println!("  {} {:.0} years", "Mean life expectancy:".bold(), mean);
    }
    print_fit(view.fit.as_ref());
}

pub fn print_emissions(view: &EmissionsView) {
    print_heading(&format!(
        "Energy consumption and CO2 emissions ({})",
        view.year
    ));
    print_points(&view.points, "kWh/capita", "t CO2e");
    println!();
    print_fit(view.fit.as_ref());
}

pub fn print_threshold(view: &EnergyThresholdView) {
    print_heading(&format!("Energy consumption threshold ({})", view.year));

    match view.min_energy {
        None => println!(
            "{}",
            format!(
                "No country in the selected regions reaches at least {} years of life expectancy in {}.",
                view.min_life_expectancy, view.year
            )
            .yellow()
        ),
        Some(min_energy) => {
            print_points(&view.eligible, "kWh/capita", "Years");
            println!();
            println!(
                "  {} (minimum energy among countries with life expectancy >= {} years):",
                "Best observed threshold".bold(),
                view.min_life_expectancy
            );
            println!(
                "    {} with {} kWh/year per capita",
                view.best_countries.join(", ").bright_cyan(),
                format_thousands(min_energy).bold()
            );
            if let Some(mean) = view.mean_energy {
                println!(
                    "  {} among all countries above the threshold: {} kWh/year per capita ({} countries)",
                    "Average energy use".bold(),
                    format_thousands(mean).bold(),
                    view.eligible_count()
                );
            }
        }
    }
    print_fit(view.fit.as_ref());
}

pub fn print_low_carbon(view: &LowCarbonView) {
    print_heading(&format!(
        "Top {} countries by low-carbon electricity share ({})",
        view.rows.len(),
        view.year
    ));

    if view.rows.is_empty() {
        println!(
            "{}",
            "No low-carbon electricity data available for this year.".yellow()
        );
        return;
    }

    println!(
        "  {:>3} {:<32} {:>9} {:>11} {:>8}",
        "#".bold(),
        "Country".bold(),
        "Nuclear".bold(),
        "Renewables".bold(),
        "Total".bold()
    );
    for (rank, row) in view.rows.iter().enumerate() {
        println!(
            "  {:>3} {:<32} {:>8.1}% {:>10.1}% {:>7.1}%",
            rank + 1,
            row.name.color(terminal_color(region_color(&row.region_name))),
            row.nuclear,
            row.renewables,
            row.total
        );
    }
}

pub fn print_export(rows: usize, path: &Path) {
    println!(
        "{} {} rows to {}",
        "Exported".bright_green().bold(),
        rows,
        path.display().to_string().bright_cyan()
    );
}

/// Warning for a page whose indicators are not in the catalog
pub fn print_missing_column(page: &str, column: &str) {
    eprintln!(
        "{} {} needs indicator '{}', which is not in the configured catalog",
        "Warning:".yellow().bold(),
        page,
        column
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.4), "999");
        assert_eq!(format_thousands(1_000.0), "1,000");
        assert_eq!(format_thousands(219_999.6), "220,000");
        assert_eq!(format_thousands(-1_234_567.0), "-1,234,567");
    }

    #[test]
    fn test_region_colors() {
        assert_eq!(terminal_color(region_color("Europe & Central Asia")), Color::Blue);
        assert_eq!(terminal_color(region_color("Other")), Color::BrightBlack);
        assert_eq!(terminal_color(region_color("Atlantis")), Color::BrightBlack);
    }
}
