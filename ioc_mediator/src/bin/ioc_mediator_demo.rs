// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

#[derive(Parser)]
struct Cli {
    /// Guest-facing virtual UART path (the symlink the mediator publishes
    /// to, not the PTY master it opens internally).
    #[arg(long, default_value = "/dev/ioc-virtual-uart")]
    virtual_uart: String,

    /// Non-zero boot reason the host is starting the mediator with.
    #[arg(long)]
    boot_reason: String,

    /// Install a SIGINT/SIGTERM handler and run until signalled, rather
    /// than starting and immediately tearing down. Useful for manual
    /// testing against the PTY this prints.
    #[arg(long)]
    run_until_signalled: bool,
}

fn main() {
    env_logger::init();

    let args = Cli::parse();
    let opts = format!("{},{}", args.virtual_uart, args.boot_reason);

    let mediator = match ioc_mediator::IocMediator::init(&opts) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("ioc mediator failed to start: {e}");
            std::process::exit(1);
        }
    };

    println!("ioc mediator running, virtual uart published at {}", args.virtual_uart);

    if args.run_until_signalled {
        wait_for_signal();
    } else {
        println!("demo run: stopping immediately");
    }

    mediator.deinit();
}

/// Blocks until SIGINT or SIGTERM arrives, using the same signal-mask
/// wait pattern the NFS server demo binaries use for a clean shutdown
/// point instead of an infinite sleep loop.
fn wait_for_signal() {
    use nix::sys::signal::{SigSet, Signal};

    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_block().expect("block SIGINT/SIGTERM");
    let _ = mask.wait();
}
