// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto
mod card_cntr;
mod dispatcher;
mod runtime;
mod usbio;

mod model;

mod input_ctl;
mod mixer_ctl;
mod monitor_ctl;
mod mux_ctl;
mod status_ctl;

use {
    alsactl::{prelude::*, ElemEventMask, ElemId, ElemIfaceType, ElemValue},
    card_cntr::*,
    clap::Parser,
    dispatcher::*,
    glib::{ControlFlow, Error, FileError},
    input_ctl::*,
    mixer_ctl::*,
    model::*,
    monitor_ctl::*,
    mux_ctl::*,
    nix::sys::signal,
    runtime::*,
    scarlett_usb_protocols::{
        config::*, mixer::*, model::*, mux::*, status::*, sw_cfg::*, transaction::*, *,
    },
    status_ctl::*,
    tracing::{debug, debug_span, info, warn, Level},
    usbio::*,
};

/// The timeout of each control transfer.
const TIMEOUT_MS: u32 = 1000;

/// The level to debug runtime.
#[derive(clap::ValueEnum, Debug, Copy, Clone, Eq, PartialEq)]
enum LogLevel {
    Debug,
}

#[derive(Parser)]
#[clap(name = "snd-scarlett-ctl-service")]
struct Arguments {
    /// The numeric identifier of sound card in Linux sound subsystem.
    card_id: u32,

    /// The path to the character device of the unit in Linux USB subsystem;
    /// e.g. `/dev/bus/usb/001/004`.
    device: String,

    /// Register control elements. Without the option the service reports how to enable
    /// itself and exits successfully.
    #[clap(long = "enable", short = 'e')]
    enable: bool,

    /// The level to debug runtime, disabled as a default.
    #[clap(long, short, arg_enum)]
    log_level: Option<LogLevel>,
}

fn main() {
    // NOTE: clap(v3.2)::Parser::parse() can exit process with 2 when detecting any
    // error or printing help.
    let args = Arguments::parse();

    if let Some(level) = args.log_level {
        let fmt_level = match level {
            LogLevel::Debug => Level::DEBUG,
        };
        tracing_subscriber::fmt().with_max_level(fmt_level).init();
    }

    if !args.enable {
        println!(
            "Focusrite Scarlett Gen 2/3 control service is disabled as a default. Run \
             with --enable option to register control elements, and report any issue."
        );
        std::process::exit(libc::EXIT_SUCCESS);
    }

    let code = ScarlettRuntime::new(args.card_id, &args.device)
        .and_then(|mut runtime| {
            runtime.listen()?;
            runtime.run()?;
            Ok(libc::EXIT_SUCCESS)
        })
        .map_err(|e| e.to_string())
        .unwrap_or_else(|msg| {
            eprintln!("{}", msg);
            libc::EXIT_FAILURE
        });

    std::process::exit(code)
}
