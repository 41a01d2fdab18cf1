//! # tnfilter
//!
//! A small telnet server that shows what the IAC filter does to a live
//! client: every connection gets the option handshake, then the cleaned
//! input bytes and window size changes are printed as they arrive.
//!
//! # Quick Start
//!
//! ```text
//! tnfilter                    # listen on 127.0.0.1:2323
//! tnfilter -l 0.0.0.0:2323    # listen on all interfaces
//! telnet 127.0.0.1 2323       # from another terminal
//! ```
//!
//! Clients are served one at a time; the filter is single-threaded and
//! blocking by design.

use std::env;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tnfilter::config::Config as FileConfig;
use tnfilter::core::events::{CommandEvent, TelnetListener};
use tnfilter::core::session::{SessionOptions, TelnetSession};
use tnfilter::core::telnet::TelnetOption;

/// Command line options
#[derive(Default)]
struct Args {
    /// Listen address override
    listen: Option<String>,
    /// Explicit config file
    config: Option<PathBuf>,
    /// Exit after the first client disconnects
    once: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("tnfilter {}", VERSION);
}

fn print_help() {
    eprintln!("tnfilter {} - telnet IAC filter demo server", VERSION);
    eprintln!();
    eprintln!("Usage: tnfilter [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -l, --listen <ADDR>   Listen address (default 127.0.0.1:2323)");
    eprintln!("  -c, --config <PATH>   Config file (default ~/.tnfilter/config.toml)");
    eprintln!("      --once            Exit after the first client disconnects");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Logging: RUST_LOG overrides log_level from the config file");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-l" | "--listen" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing listen address".to_string());
                }
                parsed.listen = Some(args[i].clone());
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config path".to_string());
                }
                parsed.config = Some(PathBuf::from(&args[i]));
            }
            "--once" => {
                parsed.once = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Install the tracing subscriber: file if configured, stderr otherwise
fn init_logging(config: &FileConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let log_file = config.log_file.as_ref().and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match log_file {
        Some(file) => builder
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
}

/// Prints events as they come off the session
struct ConsoleListener {
    session_id: u64,
}

impl TelnetListener for ConsoleListener {
    fn on_resize(&mut self, columns: u16, rows: u16) {
        info!("Session {} resized to {}x{}", self.session_id, columns, rows);
        println!("[{}] window {}x{}", self.session_id, columns, rows);
    }

    fn on_command(&mut self, event: &CommandEvent) {
        println!("[{}] peer {} {}", self.session_id, event.verb, event.option);
    }

    fn on_subnegotiation(&mut self, option: TelnetOption, payload: &[u8]) {
        println!("[{}] subnegotiation {} {:02X?}", self.session_id, option, payload);
    }
}

/// Printable form of filtered input: ASCII as-is, everything else escaped
fn render_input(bytes: &[u8]) -> String {
    bytes.iter().flat_map(|b| std::ascii::escape_default(*b)).map(char::from).collect()
}

/// Flush printed output; a failure is logged, not fatal
fn flush_output<W: Write>(out: &mut W) -> bool {
    match out.flush() {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to flush stdout: {}", e);
            false
        }
    }
}

fn serve(id: u64, stream: TcpStream, options: &SessionOptions) -> anyhow::Result<()> {
    let mut session = TelnetSession::start(id, stream, options)
        .with_context(|| format!("starting session {}", id))?;
    let mut listener = ConsoleListener { session_id: id };
    let mut buf = [0u8; 512];

    session.write(b"tnfilter: type away, Ctrl-D to quit\r\n")?;

    loop {
        let n = session.read_blocking(&mut buf)?;
        session.dispatch_events(&mut listener);
        if n == 0 {
            break;
        }
        let input = &buf[..n];
        println!("[{}] input \"{}\"", id, render_input(input));
        flush_output(&mut std::io::stdout());

        // Ctrl-D ends the session
        if input.contains(&0x04) {
            break;
        }
    }

    info!("Session {} closed", id);
    session.close()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = match &args.config {
        Some(path) => FileConfig::load_from(path)?,
        None => FileConfig::load()?,
    };
    // Command line overrides the config file
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    init_logging(&config);
    info!("tnfilter {} starting...", VERSION);

    let listener = TcpListener::bind(&config.listen)
        .with_context(|| format!("binding {}", config.listen))?;
    eprintln!("Listening on {}", config.listen);

    let options = config.session_options();
    let mut next_id = 1u64;

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };

        let id = next_id;
        next_id += 1;
        if let Err(e) = serve(id, stream, &options) {
            error!("Session {} failed: {:#}", id, e);
        }

        if args.once {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_input() {
        assert_eq!(render_input(b"ls\r\n"), "ls\\r\\n");
        assert_eq!(render_input(&[0xFF, b'a']), "\\xffa");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_flush_failure_is_not_fatal() {
        assert!(flush_output(&mut Vec::<u8>::new()));
        assert!(!flush_output(&mut BrokenPipe));
    }
}
