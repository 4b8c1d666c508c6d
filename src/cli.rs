//! Shared plumbing for the stage binaries

use crate::{Error, Result};
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. The filter comes from `RUST_LOG`,
/// defaulting to `warn`; stdout is left to the stage's own report.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second call (e.g. from a test harness) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Number of positional arguments `P` declares.
#[must_use]
pub fn arity<P: CommandFactory>() -> usize {
    P::command().get_positionals().count()
}

/// Parse `argv` (program name first) as exactly `arity::<P>()` positional
/// values.
///
/// The count is checked before clap sees anything, and clap then parses
/// behind a `--` escape: `--help`, `--` and `-x.csv` are plain values
/// that occupy a slot like any other path.
///
/// # Errors
///
/// Returns [`Error::Usage`] with `usage` as the message when the count
/// differs or a value does not convert to its field type.
pub fn parse_from<P, I, T>(usage: &str, argv: I) -> Result<P>
where
    P: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut argv = argv.into_iter().map(Into::into);
    let program = argv
        .next()
        .unwrap_or_else(|| OsString::from(usage.split_whitespace().next().unwrap_or_default()));
    let values: Vec<OsString> = argv.collect();

    let expected = arity::<P>();
    if values.len() != expected {
        tracing::debug!(expected, got = values.len(), "wrong argument count");
        return Err(Error::Usage(usage.to_string()));
    }

    let escaped = [program, OsString::from("--")].into_iter().chain(values);
    P::try_parse_from(escaped).map_err(|e| {
        tracing::debug!(kind = ?e.kind(), "rejected command line");
        Error::Usage(usage.to_string())
    })
}

/// Parse the process arguments, printing the usage error to stderr and
/// exiting 1 before any file I/O when they do not match.
pub fn parse_or_exit<P: Parser>(usage: &str) -> P {
    match parse_from(usage, std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Parser)]
    struct TwoPaths {
        first: String,
        second: String,
    }

    #[derive(Debug, Parser)]
    struct NoArgs {}

    const USAGE: &str = "train <train_path> <model_path>";

    #[test]
    fn test_exact_count_parses() {
        let args: TwoPaths = parse_from(USAGE, ["train", "a.csv", "m.bin"]).unwrap();
        assert_eq!(args.first, "a.csv");
        assert_eq!(args.second, "m.bin");
    }

    #[test]
    fn test_wrong_count_is_usage_error() {
        for argv in [vec!["train"], vec!["train", "a"], vec!["train", "a", "b", "c"]] {
            let err = parse_from::<TwoPaths, _, _>(USAGE, argv).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Arguments error. Usage: train <train_path> <model_path>"
            );
        }
    }

    #[test]
    fn test_flags_count_as_arguments() {
        for argv in [
            vec!["train", "--help"],
            vec!["train", "--version"],
            vec!["train", "--", "a", "b"],
        ] {
            let err = parse_from::<TwoPaths, _, _>(USAGE, argv).unwrap_err();
            assert!(matches!(err, Error::Usage(_)));
        }
    }

    #[test]
    fn test_hyphen_values_fill_slots() {
        let args: TwoPaths = parse_from(USAGE, ["train", "-a.csv", "--"]).unwrap();
        assert_eq!(args.first, "-a.csv");
        assert_eq!(args.second, "--");

        let args: TwoPaths = parse_from(USAGE, ["train", "--help", "-V"]).unwrap();
        assert_eq!(args.first, "--help");
        assert_eq!(args.second, "-V");
    }

    #[test]
    fn test_zero_arity() {
        assert_eq!(arity::<NoArgs>(), 0);
        assert_eq!(arity::<TwoPaths>(), 2);
        assert!(parse_from::<NoArgs, _, _>("pipeline", ["pipeline"]).is_ok());
        assert!(parse_from::<NoArgs, _, _>("pipeline", ["pipeline", "--help"]).is_err());
    }
}
