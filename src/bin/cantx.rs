// can-transceiver/src/bin/cantx.rs

//! Simple CLI tool to exercise a point-to-point CAN transceiver from the
//! Linux command line.
//!
//! ```text
//! $ cantx vcan0 listen 301 --secs 5
//! $ cantx vcan0 send 301 AABBCCDD
//! ```

use anyhow::{anyhow, Context, Result};
use can_transceiver::{DeviceConfig, Transceiver};
use clap::{arg, value_parser, ArgAction, ArgMatches, Command};
use std::{process, thread, time::Duration};

// Make the app version the same as the package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parses a hex CAN ID, with or without a leading "0x".
fn parse_id(s: &str) -> Result<u32> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(s, 16).with_context(|| format!("Invalid CAN ID '{}'", s))
}

// --------------------------------------------------------------------------

/// Process the 'listen' subcommand.
///
/// Prints every frame received for the ID until the time runs out.
fn listen_cmd(iface: &str, opts: &ArgMatches) -> Result<()> {
    let id = parse_id(opts.get_one::<String>("id").unwrap())?;
    let secs = *opts.get_one::<u64>("secs").unwrap();

    let name = iface.to_string();
    let cfg = DeviceConfig::read_only(iface, id, move |frame| println!("  {}  {:X}", name, frame))?;
    let mut dev = Transceiver::open(cfg)?;

    dev.read()?;
    thread::sleep(Duration::from_secs(secs));
    dev.stop()?;
    Ok(())
}

/// Process the 'send' subcommand.
///
/// Sends a single frame with the ID and hex payload.
fn send_cmd(iface: &str, opts: &ArgMatches) -> Result<()> {
    let id = parse_id(opts.get_one::<String>("id").unwrap())?;
    let data = match opts.get_one::<String>("data") {
        Some(s) => hex::decode(s).with_context(|| format!("Invalid payload '{}'", s))?,
        None => Vec::new(),
    };

    let dev = Transceiver::open(DeviceConfig::write_only(iface, id)?)?;
    dev.send(&data)?;
    Ok(())
}

// --------------------------------------------------------------------------

fn main() {
    let opts = Command::new("cantx")
        .version(VERSION)
        .about("Command line tool to send and receive CAN frames for a single ID")
        .disable_help_flag(true)
        .arg(
            arg!(--help "Print help information")
                .short('?')
                .action(ArgAction::Help)
                .global(true),
        )
        .arg(
            arg!(<iface> "The CAN interface to use, like 'can0', 'vcan0', etc")
                .required(true)
                .index(1),
        )
        .subcommand(
            Command::new("listen")
                .about("Print the frames received for an ID")
                .arg(arg!(<id> "The CAN ID to receive, in hex").required(true))
                .arg(
                    arg!(-s --secs <secs> "How long to listen, in seconds")
                        .required(false)
                        .default_value("10")
                        .value_parser(value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("send")
                .about("Send a single frame")
                .arg(arg!(<id> "The CAN ID to send, in hex").required(true))
                .arg(arg!(<data> "The payload, in hex (up to 8 bytes)").required(false)),
        )
        .get_matches();

    let iface = opts.get_one::<String>("iface").unwrap();

    let res = if let Some(sub_opts) = opts.subcommand_matches("listen") {
        listen_cmd(iface, sub_opts)
    } else if let Some(sub_opts) = opts.subcommand_matches("send") {
        send_cmd(iface, sub_opts)
    } else {
        Err(anyhow!("Need to specify a subcommand (-? for help)."))
    };

    if let Err(err) = res {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}
