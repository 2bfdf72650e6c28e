use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use crate::summary::{AttemptSummary, ReportSummary};

pub fn generate_console_report(out: &mut dyn Write, summary: &ReportSummary) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        "📊 EngagementBaiting Telemetry Summary".bright_cyan().bold()
    )?;
    writeln!(out, "{}", "======================================".cyan())?;
    writeln!(out, "Players: {}", summary.players)?;
    writeln!(out, "Deaths: {}", summary.total_deaths.to_string().red())?;
    writeln!(out, "Catalog: {}", summary.catalog_fingerprint)?;
    if !summary.gaps.is_empty() {
        writeln!(out, "Missing inputs:")?;
        for gap in &summary.gaps {
            writeln!(out, "  • {}", gap.to_string().yellow())?;
        }
    }
    writeln!(out)?;

    for level in &summary.levels {
        writeln!(out, "{}", format!("🗺  {}", level.level).bright_yellow().bold())?;
        writeln!(
            out,
            "  {:<24} {:>6} {:>8} {:>8}",
            "room", "deaths", "visitors", "avg"
        )?;
        for average in summary
            .room_averages
            .iter()
            .filter(|a| a.level == level.level)
        {
            writeln!(
                out,
                "  {:<24} {:>6} {:>8} {:>8.2}",
                average.room, average.deaths, average.visitors, average.average
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", "💬 Sentiments".bright_magenta().bold())?;
    if summary.deaths_per_sentiment.is_empty() {
        writeln!(out, "  No labelled deaths.")?;
    }
    for (label, deaths) in &summary.deaths_per_sentiment {
        let average = summary
            .average_deaths_per_sentiment
            .get(label)
            .copied()
            .unwrap_or_default();
        writeln!(
            out,
            "  {:<16} total {:>4}  per player {:>6.2}",
            label.as_str().bold(),
            deaths,
            average
        )?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "⏱  Players".bright_blue().bold())?;
    for player in &summary.player_summaries {
        let dominant = player
            .dominant_sentiment
            .as_ref()
            .map_or("-", |label| label.as_str());
        writeln!(
            out,
            "  {} ({dominant}): {} deaths, {:.1}s played",
            player.player.bold(),
            player.deaths,
            player.playtime.total_seconds
        )?;
        let recent = rooms_most_recent_first(&player.attempts);
        if !recent.is_empty() {
            writeln!(out, "    latest first: {}", recent.join(" ← "))?;
        }
    }
    Ok(())
}

/// Room visit order of a player's attempts by session time, newest first,
/// with consecutive attempts in the same room collapsed into a count.
fn rooms_most_recent_first(attempts: &[AttemptSummary]) -> Vec<String> {
    let mut chronological: Vec<&AttemptSummary> = attempts.iter().collect();
    chronological.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut rooms: Vec<(&str, usize)> = Vec::new();
    for attempt in chronological {
        match rooms.last_mut() {
            Some((room, count)) if *room == attempt.room => *count += 1,
            _ => rooms.push((attempt.room.as_str(), 1)),
        }
    }
    rooms
        .into_iter()
        .rev()
        .map(|(room, count)| format!("{room} ×{count}"))
        .collect()
}

pub fn generate_json_report(out: &mut dyn Write, summary: &ReportSummary) -> Result<()> {
    let json_output = serde_json::to_string_pretty(summary)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, summary: &ReportSummary) -> Result<()> {
    writeln!(out, "# EngagementBaiting Telemetry Report\n")?;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Players**: {}", summary.players)?;
    writeln!(out, "- **Deaths**: {}", summary.total_deaths)?;
    writeln!(out, "- **Catalog**: `{}`", summary.catalog_fingerprint)?;
    for gap in &summary.gaps {
        writeln!(out, "- **Missing**: {gap}")?;
    }
    writeln!(out)?;

    writeln!(out, "## Deaths per room\n")?;
    writeln!(out, "| Level | Room | Deaths | Visitors | Avg deaths |")?;
    writeln!(out, "|---|---|---:|---:|---:|")?;
    for average in &summary.room_averages {
        writeln!(
            out,
            "| {} | {} | {} | {} | {:.2} |",
            average.level, average.room, average.deaths, average.visitors, average.average
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Deaths per sentiment\n")?;
    writeln!(out, "| Sentiment | Deaths | Per player |")?;
    writeln!(out, "|---|---:|---:|")?;
    for (label, deaths) in &summary.deaths_per_sentiment {
        let average = summary
            .average_deaths_per_sentiment
            .get(label)
            .copied()
            .unwrap_or_default();
        writeln!(out, "| {label} | {deaths} | {average:.2} |")?;
    }
    writeln!(out)?;

    for level in &summary.levels {
        let matrix = &level.sentiment_matrix;
        if matrix.sentiments.is_empty() {
            continue;
        }
        writeln!(out, "### {} by sentiment\n", level.level)?;
        let labels: Vec<&str> = matrix.sentiments.iter().map(|s| s.as_str()).collect();
        writeln!(out, "| Room | {} |", labels.join(" | "))?;
        writeln!(out, "|---|{}", "---:|".repeat(labels.len()))?;
        for (room, counts) in matrix.rooms.iter().zip(&matrix.counts) {
            let cells: Vec<String> = counts.iter().map(ToString::to_string).collect();
            writeln!(out, "| {room} | {} |", cells.join(" | "))?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Playtime\n")?;
    writeln!(out, "| Player | Dominant | Deaths | Seconds |")?;
    writeln!(out, "|---|---|---:|---:|")?;
    for player in &summary.player_summaries {
        let dominant = player
            .dominant_sentiment
            .as_ref()
            .map_or("-", |label| label.as_str());
        writeln!(
            out,
            "| {} | {dominant} | {} | {:.1} |",
            player.player, player.deaths, player.playtime.total_seconds
        )?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RoomRow<'a> {
    level: &'a str,
    room: &'a str,
    deaths: usize,
    visitors: usize,
    avg_deaths: f64,
}

pub fn generate_csv_report(out: &mut dyn Write, summary: &ReportSummary) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for average in &summary.room_averages {
        writer.serialize(RoomRow {
            level: &average.level,
            room: &average.room,
            deaths: average.deaths,
            visitors: average.visitors,
            avg_deaths: average.average,
        })?;
    }
    writer.flush()?;
    Ok(())
}
