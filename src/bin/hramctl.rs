// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! A thin command-line harness over [`hramfs::Filesystem`]. Argument
//! parsing, calling the API, and formatting the result — no logic of
//! its own, so the byte-layout of its output stays free to vary.

use clap::{Parser, Subcommand};
use hramfs::{Config, Filesystem};
use transport::TcpTransport;

#[derive(Parser)]
#[command(name = "hramctl", about = "Talk to an HRAM device over the filesystem API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Power the device on: reset, zero every cartridge, init the cache.
    Poweron,
    /// Power the device off: release files, shut down, tear down the cache.
    Poweroff,
    /// Open (or create) a file by name, printing its handle.
    Open { name: String },
    /// Close a file by handle.
    Close { handle: i16 },
    /// Read up to `count` bytes from a file and print them as UTF-8 (lossy).
    Read { handle: i16, count: usize },
    /// Write `data` to a file.
    Write { handle: i16, data: String },
    /// Seek a file to a byte offset.
    Seek { handle: i16, offset: u32 },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::from_env();
    let transport = TcpTransport::new(config.host.clone(), config.port);
    let mut fs = Filesystem::new(transport, &config);

    match cli.command {
        Command::Poweron => {
            fs.power_on()?;
            println!("ok");
        }
        Command::Poweroff => {
            fs.power_off()?;
            println!("ok");
        }
        Command::Open { name } => {
            let handle = fs.open(name.as_bytes())?;
            println!("{}", handle);
        }
        Command::Close { handle } => {
            fs.close(handle)?;
            println!("ok");
        }
        Command::Read { handle, count } => {
            let mut buf = vec![0u8; count];
            let n = fs.read(handle, &mut buf, count)?;
            println!("{}", String::from_utf8_lossy(&buf[..n]));
        }
        Command::Write { handle, data } => {
            let n = fs.write(handle, data.as_bytes(), data.len())?;
            println!("{}", n);
        }
        Command::Seek { handle, offset } => {
            fs.seek(handle, offset)?;
            println!("ok");
        }
    }

    Ok(())
}
