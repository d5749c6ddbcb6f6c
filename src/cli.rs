//! Minimal CLI parsing for output selection and model overrides.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub model_override: Option<PathBuf>,
    pub print_sdl: bool,
    pub print_topology: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--sdl" => options.print_sdl = true,
                "--topology" => options.print_topology = true,
                "--model" => {
                    if let Some(value) = args.next() {
                        options.model_override = Some(value.into());
                    }
                }
                _ if arg.starts_with("--model=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.model_override = Some(value.into());
                    }
                }
                _ => {}
            }
        }
        // Nothing selected: print everything.
        if !options.print_sdl && !options.print_topology {
            options.print_sdl = true;
            options.print_topology = true;
        }
        options
    }
}
