use std::io::{self, BufRead};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, trace, warn};

use thinkgear_rs::device::{ByteStream, SerialDevice};
use thinkgear_rs::session::{ThinkGearConfig, ThinkGearSession};
use thinkgear_rs::sim::SimulatedHeadset;
use thinkgear_rs::types::ThinkGearEvent;

/// How often the session is polled.  At 57600 baud this is ~115 bytes,
/// well under the read buffer.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Value following `flag` on the command line, e.g. `--port /dev/rfcomm1`.
///
/// `Ok(None)` if the flag is absent; an error if it has no value or is
/// followed by another flag.
fn arg_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    let Some(i) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    match args.get(i + 1) {
        Some(value) if !value.starts_with("--") => Ok(Some(value.as_str())),
        _ => bail!("{flag} requires a value"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // Set RUST_LOG=debug for verbose output, e.g.:
    //   RUST_LOG=thinkgear_rs=debug cargo run -- --simulate
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // ── Configuration ─────────────────────────────────────────────────────────
    // Precedence: --port / --baud, then THINKGEAR_PORT, then platform default.
    let args: Vec<String> = std::env::args().skip(1).collect();
    let simulate = args.iter().any(|a| a == "--simulate");
    let json = args.iter().any(|a| a == "--json");

    let mut config = ThinkGearConfig::default();
    if let Ok(port) = std::env::var("THINKGEAR_PORT") {
        config.port = port;
    }
    if let Some(port) = arg_value(&args, "--port")? {
        config.port = port.to_owned();
    }
    if let Some(baud) = arg_value(&args, "--baud")? {
        config.baud_rate = baud
            .parse()
            .with_context(|| format!("invalid --baud value {baud:?}"))?;
    }

    let device: Box<dyn ByteStream> = if simulate {
        info!("Simulation mode: no hardware will be opened");
        Box::new(SimulatedHeadset::new())
    } else {
        Box::new(SerialDevice::new())
    };

    info!("Using {} @ {} baud", config.port, config.baud_rate);
    let mut session = ThinkGearSession::new(device, config);
    let mut sub = session.subscribe_all();

    info!("Press Ctrl-C or type 'q' + Enter to quit.");
    info!("Commands (type + Enter):");
    info!("  q  – quit");
    info!("  c  – close the session (sends disconnect)");
    info!("  o  – reopen a closed session");
    info!("  f  – flush the port and drop any partial packet");

    // ── Stdin command loop ────────────────────────────────────────────────────
    // Lines are read on a dedicated OS thread and relayed over a channel so
    // the main loop never blocks on stdin.
    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if line_tx.send(l.trim().to_owned()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    // ── Main poll loop ────────────────────────────────────────────────────────
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted.");
                break;
            }
            Some(line) = line_rx.recv() => {
                match line.as_str() {
                    "" => {}
                    "q" => {
                        info!("Quit requested.");
                        break;
                    }
                    "c" => {
                        info!("Closing session …");
                        session.close();
                    }
                    "o" => {
                        info!("Reopening session …");
                        session.reopen();
                    }
                    "f" => {
                        info!("Flushing …");
                        session.flush();
                    }
                    other => info!("Unknown command '{other}'"),
                }
            }
            _ = ticker.tick() => {
                session.poll();
                while let Ok(event) = sub.rx.try_recv() {
                    if json {
                        println!("{}", serde_json::to_string(&event)?);
                    } else {
                        print_event(&event, &session);
                    }
                }
            }
        }
    }

    session.close();
    let stats = session.decoder_stats();
    info!(
        "Session finished: {} packets, {} checksum errors, {} length errors",
        stats.packets, stats.checksum_errors, stats.length_errors
    );
    Ok(())
}

fn print_event<D: ByteStream>(event: &ThinkGearEvent, session: &ThinkGearSession<D>) {
    match event {
        // Raw samples arrive at 512 Hz; only log them when asked to.
        ThinkGearEvent::Raw(o) => trace!("[RAW] {:+6}", o.raw),
        ThinkGearEvent::Power(o) => println!("[POWER]      {}", o.power),
        ThinkGearEvent::PoorSignal(o) => println!("[SIGNAL]     poor={}", o.poor_signal),
        ThinkGearEvent::HeartRate(o) => println!("[HEART]      {} bpm", o.heart_rate),
        ThinkGearEvent::BlinkStrength(o) => println!("[BLINK]      {}", o.blink_strength),
        ThinkGearEvent::Attention(o) => println!("[ATTENTION]  {}", o.attention),
        ThinkGearEvent::Meditation(o) => println!("[MEDITATION] {}", o.meditation),
        ThinkGearEvent::Eeg(_) => println!("[EEG]        {}", session.bands()),
        ThinkGearEvent::Connecting(_) => info!("Dongle in standby, requesting autoconnect …"),
        ThinkGearEvent::Ready(_) => info!("✅  Headset connected"),
        ThinkGearEvent::Error(msg) => warn!("❌  {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flag_value_is_returned() {
        let a = args(&["--simulate", "--port", "/dev/rfcomm1", "--json"]);
        assert_eq!(arg_value(&a, "--port").unwrap(), Some("/dev/rfcomm1"));
        assert_eq!(arg_value(&a, "--baud").unwrap(), None);
    }

    #[test]
    fn trailing_flag_without_value_is_rejected() {
        let a = args(&["--json", "--baud"]);
        let err = arg_value(&a, "--baud").unwrap_err();
        assert!(err.to_string().contains("--baud"));
    }

    #[test]
    fn flag_followed_by_flag_is_rejected() {
        let a = args(&["--port", "--json"]);
        assert!(arg_value(&a, "--port").is_err());
    }
}
