//! Demo driver for the TinyFS library.

mod demo;
mod fragtest;

use std::env;
use std::fmt;
use std::process::exit;

/// Writes an error to stderr, then exits.
pub fn error<M: fmt::Display>(bin: &str, msg: M) -> ! {
    eprintln!("{bin}: error: {msg}");
    exit(1);
}

fn main() {
    let mut args = env::args_os();
    args.next();
    let Some(cmd) = args.next().and_then(|s| s.into_string().ok()) else {
        error("tinyfs", "missing subcommand (expected `demo` or `fragtest`)");
    };
    match cmd.as_str() {
        "demo" => demo::main(args),
        "fragtest" => fragtest::main(args),
        _ => error("tinyfs", format_args!("unknown subcommand `{cmd}`")),
    }
}
