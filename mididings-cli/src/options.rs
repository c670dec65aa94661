/// Command line options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    pub verbose: bool,
    pub json: bool,
    /// Print every event from the async worker, after the pipeline has moved on
    pub monitor: bool,
    /// Semitones applied by an immediate callback
    pub transpose: Option<i16>,
    /// Add a note one octave up for every note
    pub octave: bool,
    pub list_ports: bool,
    /// Hardware input port index (requires the `midi-input` feature)
    pub port: Option<usize>,
}

impl Options {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut opts = Options::default();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-v" | "--verbose" => opts.verbose = true,
                "--json" => opts.json = true,
                "--monitor" => opts.monitor = true,
                "--octave" => opts.octave = true,
                "--list-ports" => opts.list_ports = true,
                "--transpose" => {
                    let value = iter.next().ok_or("--transpose needs a value")?;
                    let semitones = value
                        .parse::<i16>()
                        .map_err(|_| format!("invalid --transpose value: {}", value))?;
                    opts.transpose = Some(semitones);
                }
                "--port" => {
                    let value = iter.next().ok_or("--port needs a value")?;
                    let index = value
                        .parse::<usize>()
                        .map_err(|_| format!("invalid --port value: {}", value))?;
                    opts.port = Some(index);
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
        }
        Ok(opts)
    }
}

pub const USAGE: &str = "\
usage: mididings [options]

Reads MIDI messages as hex bytes from stdin, one message per line
(e.g. `90 3c 64`), runs them through the callback units selected below
and prints the resulting events.

options:
  --transpose N   shift notes by N semitones (immediate callback)
  --octave        add a note one octave above every note (immediate callback)
  --monitor       print every incoming event from the async worker (deferred callback)
  --json          print events as JSON
  --list-ports    list hardware MIDI input ports (midi-input feature)
  --port N        read from hardware input port N instead of stdin (midi-input feature)
  -v, --verbose   debug logging";

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("mididings")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Options::parse(&args(&[])).unwrap(), Options::default());
    }

    #[test]
    fn test_flags_and_values() {
        let argv = args(&["--monitor", "--transpose", "-3", "--port", "2", "-v"]);
        let opts = Options::parse(&argv).unwrap();
        assert!(opts.monitor);
        assert!(opts.verbose);
        assert_eq!(opts.transpose, Some(-3));
        assert_eq!(opts.port, Some(2));
    }

    #[test]
    fn test_missing_value() {
        assert!(Options::parse(&args(&["--transpose"])).is_err());
    }

    #[test]
    fn test_unknown_argument() {
        let err = Options::parse(&args(&["--bogus"])).unwrap_err();
        assert!(err.contains("--bogus"));
    }
}
