//! x11core - Main entry point
//!
//! An X11 core protocol display server with a null drawing backend

use std::env;
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;

use x11core::backend::null::NullBackend;
use x11core::connection::Listener;
use x11core::security::AccessPolicy;
use x11core::server::listener::{
    lock_server, serve, spawn_input_pump, tcp_port, unix_socket_path, SharedServer,
    INPUT_POLL_INTERVAL,
};
use x11core::server::{Server, ServerConfig};
use x11core::VERSION;

#[cfg(unix)]
use nix::sys::signal::{SigSet, Signal};

fn print_usage() {
    println!("x11core v{}", VERSION);
    println!("An X11 core protocol display server");
    println!();
    println!("Usage: x11core [OPTIONS] [:<display>]");
    println!();
    println!("Options:");
    println!("  -display <n>          Display number (default: 0)");
    println!("  -screen <W>x<H>       Screen size in pixels (default: 1024x768)");
    println!("  -notcp                Do not listen on TCP (port 6000 + display)");
    println!("  -nounix               Do not listen on Unix sockets");
    println!("  --permissive          Accept every TCP peer");
    println!("  --strict              Local clients only; clients cannot change access");
    println!("  -h, --help            Show this help message");
    println!();
    println!("Logging is controlled with RUST_LOG (default: info).");
    println!();
}

#[derive(Debug)]
struct Config {
    display: u16,
    width: u16,
    height: u16,
    listen_tcp: bool,
    listen_unix: bool,
    access: AccessPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            display: 0,
            width: 1024,
            height: 768,
            listen_tcp: true,
            listen_unix: cfg!(unix),
            access: AccessPolicy::default(),
        }
    }
}

fn parse_display(value: &str) -> Result<u16, String> {
    value
        .trim_start_matches(':')
        .parse()
        .map_err(|_| format!("Invalid display number: {}", value))
}

fn parse_size(value: &str) -> Result<(u16, u16), String> {
    let invalid = || format!("Invalid screen size: {}", value);
    let (w, h) = value.split_once('x').ok_or_else(invalid)?;
    let width: u16 = w.parse().map_err(|_| invalid())?;
    let height: u16 = h.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

fn parse_args() -> Result<Config, String> {
    let mut config = Config::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-display" | "--display" => {
                let value = args.next().ok_or("Missing value for -display")?;
                config.display = parse_display(&value)?;
            }
            "-screen" | "--screen" => {
                let value = args.next().ok_or("Missing value for -screen")?;
                (config.width, config.height) = parse_size(&value)?;
            }
            "-notcp" | "--no-tcp" => config.listen_tcp = false,
            "-nounix" | "--no-unix" => config.listen_unix = false,
            "--permissive" => config.access = AccessPolicy::permissive(),
            "--strict" => config.access = AccessPolicy::strict(),
            display if display.starts_with(':') => config.display = parse_display(display)?,
            other => return Err(format!("Unknown option: {}", other)),
        }
    }

    if !config.listen_tcp && !config.listen_unix {
        return Err("Nothing to listen on".to_string());
    }
    Ok(config)
}

#[cfg(unix)]
fn open_local_listeners(display: u16, listeners: &mut Vec<(String, Listener)>) {
    let path = unix_socket_path(display);
    match Listener::unix(&path) {
        Ok(listener) => listeners.push((path.clone(), listener)),
        Err(e) => log::error!("Cannot listen on {}: {}", path, e),
    }
    open_abstract_listener(&path, listeners);
}

#[cfg(not(unix))]
fn open_local_listeners(_display: u16, _listeners: &mut Vec<(String, Listener)>) {}

#[cfg(target_os = "linux")]
fn open_abstract_listener(path: &str, listeners: &mut Vec<(String, Listener)>) {
    match Listener::abstract_unix(path) {
        Ok(listener) => listeners.push((format!("@{}", path), listener)),
        Err(e) => log::warn!("Cannot listen on abstract socket @{}: {}", path, e),
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn open_abstract_listener(_path: &str, _listeners: &mut Vec<(String, Listener)>) {}

/// Block SIGINT and SIGTERM so every thread spawned afterwards leaves them
/// to `wait_for_shutdown`
#[cfg(unix)]
fn block_shutdown_signals() -> Option<SigSet> {
    let mut signals = SigSet::empty();
    signals.add(Signal::SIGINT);
    signals.add(Signal::SIGTERM);
    match signals.thread_block() {
        Ok(()) => Some(signals),
        Err(e) => {
            log::warn!("Cannot block shutdown signals: {}", e);
            None
        }
    }
}

#[cfg(unix)]
fn wait_for_shutdown(signals: Option<SigSet>, threads: Vec<thread::JoinHandle<()>>) {
    match signals.map(|s| s.wait()) {
        Some(Ok(signal)) => log::info!("Received {:?}", signal),
        Some(Err(e)) => {
            log::warn!("Waiting for signals failed: {}", e);
            join_all(threads);
        }
        None => join_all(threads),
    }
}

#[cfg(not(unix))]
fn wait_for_shutdown(_signals: Option<()>, threads: Vec<thread::JoinHandle<()>>) {
    join_all(threads);
}

#[cfg(not(unix))]
fn block_shutdown_signals() -> Option<()> {
    None
}

fn join_all(threads: Vec<thread::JoinHandle<()>>) {
    for thread in threads {
        if thread.join().is_err() {
            log::error!("Listener thread panicked");
        }
    }
}

/// Bind every listener the configuration asks for
fn open_listeners(config: &Config) -> Vec<(String, Listener)> {
    let mut listeners = Vec::new();

    if config.listen_tcp {
        let port = tcp_port(config.display);
        match Listener::tcp(port) {
            Ok(listener) => listeners.push((format!("tcp port {}", port), listener)),
            Err(e) => log::error!("Cannot listen on TCP port {}: {}", port, e),
        }
    }

    if config.listen_unix {
        open_local_listeners(config.display, &mut listeners);
    }

    listeners
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    log::info!("x11core v{}", VERSION);
    log::info!(
        "Display :{} ({}x{})",
        config.display,
        config.width,
        config.height
    );
    log::info!(
        "Access control {}, client changes {}",
        if config.access.enabled { "enabled" } else { "disabled" },
        if config.access.allow_client_changes { "allowed" } else { "refused" }
    );

    let mut server_config = ServerConfig::with_size(config.width, config.height);
    server_config.access = config.access.clone();
    let server: SharedServer = Arc::new(Mutex::new(Server::new(
        server_config,
        Box::new(NullBackend::new()),
    )));

    let listeners = open_listeners(&config);
    if listeners.is_empty() {
        eprintln!("Error: no listener could be opened for display :{}", config.display);
        process::exit(1);
    }

    let signals = block_shutdown_signals();
    let _pump = spawn_input_pump(&server, INPUT_POLL_INTERVAL);
    let mut threads = Vec::new();
    for (name, listener) in listeners {
        log::info!("Listening on {}", name);
        let server = Arc::clone(&server);
        threads.push(thread::spawn(move || serve(listener, server)));
    }
    lock_server(&server).start(config.display);

    wait_for_shutdown(signals, threads);
    lock_server(&server).shutdown();
    if config.listen_unix && cfg!(unix) {
        let _ = std::fs::remove_file(unix_socket_path(config.display));
    }
}
