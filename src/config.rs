//! Command-line configuration for the `blockfs` binary.

use std::ffi::OsString;
use std::path::PathBuf;

/// Default image size, in mebibytes, when `create` is invoked without
/// `--size`.
pub const DEFAULT_SIZE_MB: u32 = 1;

/// The action requested on the command line.
pub enum Action {
    /// Create a new image, then drop into the interactive shell.
    Create { path: PathBuf, size_mb: u32 },
    /// Mount an existing image, then drop into the interactive shell.
    Open { path: PathBuf },
}

/// Parsed command-line configuration.
pub struct Config {
    pub action: Action,
    pub verbose: bool,
}

const USAGE: &str = "usage: blockfs <create|open> <image-path> [--size <mb>] [-v]";

/// Parses `argv` (excluding the binary name) into a [`Config`].
///
/// Accepts `create <path> [--size <mb>]` or `open <path>`, plus a leading
/// `-v`/`--verbose` flag in any position. Returns `Err` with a usage message
/// on malformed input.
pub fn parse_args<I: IntoIterator<Item = OsString>>(args: I) -> Result<Config, String> {
    let mut verbose = false;
    let mut positional = Vec::new();
    let mut size_mb = DEFAULT_SIZE_MB;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.to_str() {
            Some("-v" | "--verbose") => verbose = true,
            Some("--size") => {
                let value = iter
                    .next()
                    .and_then(|v| v.to_str().map(str::to_owned))
                    .ok_or("--size requires a value")?;
                size_mb = value.parse::<u32>().map_err(|_| "--size must be a number")?;
            }
            _ => positional.push(arg),
        }
    }

    let mode = positional
        .first()
        .and_then(|s| s.to_str())
        .ok_or(USAGE)?
        .to_string();
    let path = positional.get(1).map(PathBuf::from).ok_or(USAGE)?;

    let action = match mode.as_str() {
        "create" => Action::Create { path, size_mb },
        "open" => Action::Open { path },
        other => return Err(format!("unknown mode `{other}` (expected `create` or `open`)")),
    };

    Ok(Config { action, verbose })
}

#[cfg(test)]
mod test {
    use super::*;

    fn owned(items: &[&str]) -> Vec<OsString> {
        items.iter().copied().map(OsString::from).collect()
    }

    #[test]
    fn missing_mode_is_rejected() {
        assert!(parse_args(owned(&[])).is_err());
    }

    #[test]
    fn create_with_explicit_size_parses() {
        let config = parse_args(owned(&["create", "/tmp/img", "--size", "4"])).unwrap();
        match config.action {
            Action::Create { size_mb, .. } => assert_eq!(size_mb, 4),
            Action::Open { .. } => panic!("expected Create"),
        }
    }

    #[test]
    fn create_without_size_uses_the_default() {
        let config = parse_args(owned(&["create", "/tmp/img"])).unwrap();
        match config.action {
            Action::Create { size_mb, .. } => assert_eq!(size_mb, DEFAULT_SIZE_MB),
            Action::Open { .. } => panic!("expected Create"),
        }
    }

    #[test]
    fn open_mode_parses() {
        let config = parse_args(owned(&["open", "/tmp/img"])).unwrap();
        assert!(matches!(config.action, Action::Open { .. }));
    }

    #[test]
    fn verbose_flag_is_recognized_anywhere() {
        let config = parse_args(owned(&["-v", "open", "/tmp/img"])).unwrap();
        assert!(config.verbose);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(parse_args(owned(&["delete", "/tmp/img"])).is_err());
    }

    #[test]
    fn size_without_value_is_rejected() {
        assert!(parse_args(owned(&["create", "/tmp/img", "--size"])).is_err());
    }
}
