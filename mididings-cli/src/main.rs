mod callbacks;
mod input;
mod options;
mod router;

use std::fs::File;
use std::time::Duration;

use crossbeam_channel::unbounded;
use mididings_core::midi::{encode_midi_event, parse_midi_message};
use mididings_core::units::Call;
use mididings_core::{CallbackDispatcher, DispatchConfig};
use mididings_types::MidiEvent;

use options::{Options, USAGE};
use router::Router;

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("mididings")
        .join("mididings.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path).unwrap_or_else(|_| {
        File::create(std::env::temp_dir().join("mididings.log")).expect("Cannot create log file")
    });

    WriteLogger::init(log_level, Config::default(), log_file)
        .expect("Failed to initialize logger");

    log::info!("mididings starting (log level: {:?})", log_level);
}

fn print_event(event: &MidiEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => log::error!("cannot serialize {}: {}", event, e),
        }
        return;
    }
    let hex: Vec<String> = encode_midi_event(event)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    println!("{:<12} {}", hex.join(" "), event);
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let opts = match Options::parse(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    init_logging(opts.verbose);

    if opts.list_ports {
        #[cfg(feature = "midi-input")]
        {
            match input::hardware::list_ports() {
                Ok(ports) => {
                    for (i, name) in ports.iter().enumerate() {
                        println!("{}: {}", i, name);
                    }
                    return Ok(());
                }
                Err(e) => {
                    eprintln!("Cannot open MIDI input: {}", e);
                    std::process::exit(1);
                }
            }
        }
        #[cfg(not(feature = "midi-input"))]
        {
            eprintln!("Port listing requires the 'midi-input' feature.");
            eprintln!("Build with: cargo build --features midi-input");
            std::process::exit(1);
        }
    }

    let config = DispatchConfig::load();
    let settle_timeout = config.shutdown_timeout;
    let dispatcher = CallbackDispatcher::new(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let mut router = Router::new(dispatcher);
    if opts.monitor {
        router.push_unit(Call::deferred(callbacks::monitor(opts.json), true));
    }
    if let Some(semitones) = opts.transpose {
        router.push_unit(Call::immediate(callbacks::transpose(semitones)));
    }
    if opts.octave {
        router.push_unit(Call::immediate(callbacks::octave()));
    }
    log::info!("pipeline has {} unit(s)", router.unit_count());

    let (tx, rx) = unbounded();

    #[cfg(feature = "midi-input")]
    let _connection = match opts.port {
        Some(index) => Some(
            input::hardware::connect(index, tx)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
        ),
        None => {
            input::spawn_stdin_reader(tx)?;
            None
        }
    };
    #[cfg(not(feature = "midi-input"))]
    {
        if opts.port.is_some() {
            eprintln!("Hardware input requires the 'midi-input' feature.");
            eprintln!("Build with: cargo build --features midi-input");
            std::process::exit(1);
        }
        input::spawn_stdin_reader(tx)?;
    }

    // Ends once every sender is gone: stdin hit EOF or the port closed
    for (port, bytes) in rx.iter() {
        let Some(event) = parse_midi_message(port, &bytes) else {
            log::debug!("ignoring unsupported message {:02x?}", bytes);
            continue;
        };
        for out in router.process(event) {
            print_event(&out, opts.json);
        }
    }

    if !router.settle(settle_timeout) {
        log::warn!(
            "{} deferred call(s) still pending at exit",
            router.dispatcher().pending_calls()
        );
    }
    let summary = router.dispatcher_mut().take_call_summary();
    log::info!(
        "{} immediate call(s), {} over budget",
        summary.calls,
        summary.overruns
    );
    log::info!(
        "lock wait avg {}us max {}us, callback avg {}us max {}us",
        summary.lock_wait.avg_us(summary.calls),
        summary.lock_wait.max_us,
        summary.callback.avg_us(summary.calls),
        summary.callback.max_us
    );
    log::info!("dispatch stats: {:?}", router.dispatcher().stats());
    Ok(())
}
