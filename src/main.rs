use std::env;
use std::fs;
use std::path::Path;
use std::process;

use scribe::{decode_payload, Score, Transcriber, TranscriberConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: scribe [--config <config.yaml>] [--session <out.json>] <events.jsonl>";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut config_path: Option<&String> = None;
    let mut session_path: Option<&String> = None;
    let mut input_path: Option<&String> = None;

    // Parse flags
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = args.get(i);
                if config_path.is_none() {
                    usage_error();
                }
            }
            "--session" => {
                i += 1;
                session_path = args.get(i);
                if session_path.is_none() {
                    usage_error();
                }
            }
            _ if input_path.is_none() => input_path = Some(&args[i]),
            _ => usage_error(),
        }
        i += 1;
    }

    let Some(input_path) = input_path else {
        usage_error();
    };

    let config = match config_path {
        Some(path) => match TranscriberConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        },
        None => TranscriberConfig::default(),
    };

    // Read input file
    let source = match fs::read_to_string(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", input_path, e);
            process::exit(1);
        }
    };

    // Replay: payloads without timestamps are stamped with the latest time seen
    let mut transcriber = Transcriber::new(config);
    let mut now = 0.0_f64;
    let mut dropped = 0;
    for (number, line) in source.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match decode_payload(line, now) {
            Ok(events) => {
                for event in &events {
                    now = now.max(event.timestamp());
                    transcriber.apply(event);
                }
            }
            Err(e) => {
                tracing::warn!(line = number + 1, error = %e, "skipping malformed payload");
                dropped += 1;
            }
        }
    }

    let score = transcriber.score(now);
    print_score(&score);
    if dropped > 0 {
        eprintln!("Skipped {} malformed payload(s)", dropped);
    }

    if let Some(path) = session_path {
        if let Err(e) = transcriber.to_payload().save(Path::new(path)) {
            eprintln!("{}", e);
            process::exit(1);
        }
        eprintln!("Wrote session to {}", path);
    }
}

fn usage_error() -> ! {
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn print_score(score: &Score) {
    println!(
        "tempo {} bpm, {} measure(s) on {} line(s), {} placeholder(s)",
        score.tempo.bpm(),
        score.measures.len(),
        score.line_count(),
        score.placeholder_count()
    );
    for (i, placed) in score.filled_measures().enumerate() {
        let notes: Vec<String> = placed
            .measure
            .notes
            .iter()
            .map(|n| {
                let pitches = n.pitches.join("+");
                if n.is_provisional {
                    format!("{} {} (held)", pitches, n.duration)
                } else {
                    format!("{} {}", pitches, n.duration)
                }
            })
            .collect();
        println!(
            "  {:>3} | line {} x={:<6} w={:<6} | {}",
            i + 1,
            placed.line + 1,
            placed.x,
            placed.width,
            notes.join(", ")
        );
    }
}
