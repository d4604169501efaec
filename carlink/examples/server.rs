//! Console-driven carlink server.
//!
//! Run with: `cargo run --example server [port]`
//!
//! Commands: `round` (start/stop a round), `broadcast <text>`, `slots`,
//! `log`, `treasures`, `quit`.

use carlink::prelude::*;
use std::io::BufRead;
use std::sync::Arc;

/// Prints each line and keeps the most recent ones for the `log` command.
struct ConsoleLog {
    recent: MessageLog,
}

impl LogSink for ConsoleLog {
    fn append(&self, text: &str) {
        println!("{}", text.trim_end());
        self.recent.append(text);
    }
}

fn demo_map() -> TagMap {
    [
        TagRecord::new([0x04, 0xA1, 0x22, 0x10], 1, 1, tag_kind::NORMAL),
        TagRecord::new([0x04, 0xA1, 0x22, 0x11], 2, 1, tag_kind::NORMAL),
        TagRecord::new([0x04, 0xA1, 0x22, 0x12], 3, 1, tag_kind::TREASURE),
        TagRecord::new([0x04, 0xB7, 0x31, 0x01], 6, 2, tag_kind::PARK_1),
        TagRecord::new([0x04, 0xB7, 0x31, 0x02], 6, 4, tag_kind::PARK_2),
        TagRecord::new([0x04, 0xB7, 0x31, 0x03], 6, 6, tag_kind::PARK_3),
        TagRecord::new([0x04, 0xB7, 0x31, 0x04], 6, 8, tag_kind::PARK_4),
    ]
    .into_iter()
    .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port = match std::env::args().nth(1) {
        Some(port) => port.parse()?,
        None => 5000,
    };

    let map = Arc::new(demo_map());
    let log = Arc::new(ConsoleLog {
        recent: MessageLog::default(),
    });

    let mut server = Server::builder()
        .port(port)
        .tag_lookup(Arc::clone(&map))
        .treasure_notifier(Arc::clone(&map))
        .log_sink(Arc::clone(&log))
        .build();

    let addr = server.start()?;
    println!("carlink server listening on {addr}");
    println!("Commands: round | broadcast <text> | slots | log | treasures | quit");

    let control = server.control();
    let timer = server.round_timer();

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let (command, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));

        match command {
            "round" => match &timer {
                Some(timer) => {
                    if timer.trigger() {
                        println!("Round running");
                    } else {
                        println!("Round stopped");
                    }
                }
                None => control.start_round(),
            },
            "broadcast" if !rest.is_empty() => control.toggle_broadcast(rest),
            "slots" => {
                for slot in control.slots() {
                    println!("{slot}");
                }
            }
            "log" => {
                for line in log.recent.lines() {
                    println!("{line}");
                }
            }
            "treasures" => {
                println!("{}/{} parking points found", map.found_count(), map.treasure_count());
                if let Some(elapsed) = timer.as_ref().and_then(|timer| timer.elapsed()) {
                    println!("Round time: {:.1}s", elapsed.as_secs_f64());
                }
            }
            "quit" | "exit" => break,
            "" => {}
            other => println!("Unknown command: {other}"),
        }
    }

    server.stop()?;
    println!("Server stopped");
    Ok(())
}
