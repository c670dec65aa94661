//! Raw MIDI sources feeding the pipeline: hex lines on stdin, or a hardware
//! port when built with the `midi-input` feature.

use std::io::BufRead;
use std::thread;

use crossbeam_channel::Sender;

/// One raw message and the input port it arrived on.
pub type RawMessage = (u32, Vec<u8>);

/// Parse a line of whitespace-separated hex bytes (`90 3c 64`).
/// Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_hex_line(line: &str) -> Result<Option<Vec<u8>>, String> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }
    line.split_whitespace()
        .map(|tok| {
            let tok = tok.trim_start_matches("0x").trim_start_matches("0X");
            u8::from_str_radix(tok, 16).map_err(|_| format!("invalid hex byte: {}", tok))
        })
        .collect::<Result<Vec<u8>, String>>()
        .map(Some)
}

/// Read stdin line by line on a background thread until EOF.
pub fn spawn_stdin_reader(tx: Sender<RawMessage>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("mididings-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for (lineno, line) in stdin.lock().lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::error!(target: "input", "stdin read failed: {}", e);
                        break;
                    }
                };
                match parse_hex_line(&line) {
                    Ok(Some(bytes)) => {
                        if tx.send((mididings_types::DEFAULT_PORT, bytes)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!(target: "input", "line {}: {}", lineno + 1, e),
                }
            }
            log::debug!(target: "input", "stdin closed");
        })
}

#[cfg(feature = "midi-input")]
pub mod hardware {
    use super::RawMessage;
    use crossbeam_channel::Sender;
    use midir::{MidiInput, MidiInputConnection};

    const CLIENT_NAME: &str = "mididings";

    pub fn list_ports() -> Result<Vec<String>, String> {
        let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
        Ok(midi_in
            .ports()
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
            .collect())
    }

    /// Connect to input port `index`. Messages flow into `tx` for as long as
    /// the returned connection is alive.
    pub fn connect(
        index: usize,
        tx: Sender<RawMessage>,
    ) -> Result<MidiInputConnection<()>, String> {
        let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
        let ports = midi_in.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| format!("Invalid port index: {}", index))?;
        let name = midi_in.port_name(port).unwrap_or_else(|_| "Unknown".to_string());
        log::info!(target: "input", "connecting to port {}: {}", index, name);

        midi_in
            .connect(
                port,
                "mididings-input",
                move |_timestamp, message, _| {
                    let _ = tx.send((index as u32, message.to_vec()));
                },
                (),
            )
            .map_err(|e| e.to_string())
    }
}
