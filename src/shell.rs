//! A line-oriented shell for poking at a provisioned lab

use std::fmt::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{emulator::Emulator, topology::Topology};

const PROMPT: &[u8] = b"labnet> ";
const HELP: &str = "\
Commands:
  <host> <command...>  run a shell command on a host
  nodes                list hosts and their addresses
  help                 show this message
  exit, quit           leave the shell
";

/// Serve commands from `input` until it is exhausted or the user leaves
pub async fn run<E, R, W>(emulator: &mut E, topology: &Topology, input: R, mut output: W) -> std::io::Result<()>
where
    E: Emulator,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(PROMPT).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        let line = line.trim();
        let (first, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(first, rest)| (first, rest.trim()));

        let reply = match (first, rest) {
            ("", _) => continue,
            ("exit" | "quit", "") => break,
            ("help", "") => HELP.to_string(),
            ("nodes", "") => nodes(topology),
            (host, "") => format!("Usage: {host} <command...>\n"),
            (host, command) => match topology.host(host) {
                Ok(host) => match emulator.execute(host, command).await {
                    Ok(result) => {
                        let failed = !result.success();
                        let mut reply = result.stdout;
                        reply.push_str(&result.stderr);
                        if failed {
                            let _ = writeln!(reply, "(exit status {})", result.exit_code);
                        }
                        reply
                    }
                    Err(error) => format!("{error}\n"),
                },
                Err(error) => format!("{error}\n"),
            },
        };
        output.write_all(reply.as_bytes()).await?;
    }
    output.flush().await
}

fn nodes(topology: &Topology) -> String {
    let mut listing = String::new();
    for host in topology.hosts() {
        let addresses: Vec<String> = host
            .interfaces()
            .iter()
            .filter_map(|interface| interface.address)
            .map(|address| address.to_string())
            .collect();
        let _ = writeln!(listing, "{} {}", host.name(), addresses.join(" "));
    }
    listing
}
