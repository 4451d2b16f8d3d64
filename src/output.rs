//! Console table and CSV rendering of enriched channels.
//!
//! Rendering is deterministic: rows come out in the order the channels were
//! selected, one line per channel.

use std::fs;

use crate::enrich::EnrichedChannel;

const CSV_HEADER: [&str; 11] = [
    "Stream ID",
    "Name",
    "Category",
    "Archive",
    "EPG",
    "Video Codec",
    "Resolution",
    "Frame Rate",
    "Audio Codec",
    "Channels",
    "Sample Rate",
];

pub fn print_table(rows: &[EnrichedChannel]) {
    println!(
        "{:<10}{:<62}{:<42}{:<8}{:<6}{:<12}{:<15}{:<7}{:<12}{:<9}{:<12}",
        "ID",
        "Name",
        "Category",
        "Archive",
        "EPG",
        "Video Codec",
        "Resolution",
        "Frame",
        "Audio Codec",
        "Channels",
        "Sample Rate"
    );
    println!("{}", "=".repeat(180));

    for row in rows {
        let fields = row_fields(row);
        println!(
            "{:<10}{:<62}{:<42}{:<8}{:<6}{:<12}{:<15}{:<7}{:<12}{:<9}{:<12}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            fields[4],
            fields[5],
            fields[6],
            fields[7],
            fields[8],
            fields[9],
            fields[10]
        );
    }
}

/// Write rows as CSV with every field double-quoted.
pub fn write_csv(path: &str, rows: &[EnrichedChannel]) -> Result<(), String> {
    let mut out = String::new();
    out.push_str(&csv_line(&CSV_HEADER.map(String::from)));
    for row in rows {
        out.push_str(&csv_line(&row_fields(row)));
    }
    fs::write(path, out).map_err(|e| format!("error saving CSV to {path}: {e}"))
}

fn row_fields(row: &EnrichedChannel) -> [String; 11] {
    let probe = row.probe.as_ref();
    [
        row.channel.stream_id.to_string(),
        truncate(&row.channel.name, 60),
        truncate(&row.category_name, 40),
        row.channel
            .tv_archive_duration
            .clone()
            .unwrap_or_else(|| "N/A".to_string()),
        row.epg_count.map(|c| c.to_string()).unwrap_or_default(),
        opt_field(probe.and_then(|p| p.video_codec.as_deref())),
        probe.map_or_else(|| "N/A".to_string(), |p| p.resolution()),
        opt_field(probe.and_then(|p| p.frame_rate).map(|f| f.to_string()).as_deref()),
        opt_field(probe.and_then(|p| p.audio_codec.as_deref())),
        opt_field(probe.and_then(|p| p.audio_channels).map(|c| c.to_string()).as_deref()),
        opt_field(probe.and_then(|p| p.sample_rate.as_deref())),
    ]
}

fn opt_field(value: Option<&str>) -> String {
    value.unwrap_or("N/A").to_string()
}

// Truncate by characters, not bytes; channel names are routinely non-ASCII.
fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn csv_line(fields: &[String]) -> String {
    let quoted: Vec<String> = fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect();
    format!("{}\n", quoted.join(","))
}
