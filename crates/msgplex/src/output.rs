use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use msgplex_transport::SocketAddress;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One live listener as reported by `serve`.
#[derive(Serialize, Debug)]
pub struct ListenerOutput {
    pub address: String,
    pub transport: &'static str,
    pub handler: String,
}

impl ListenerOutput {
    pub fn new(address: &SocketAddress, handler: String) -> Self {
        let transport = match address {
            SocketAddress::Unix(_) => "unix",
            SocketAddress::Inet { .. } => "tcp",
        };
        Self {
            address: address.to_uri(),
            transport,
            handler,
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    address: String,
    sent_bytes: usize,
    response_size: usize,
    response: String,
    timestamp: String,
    #[serde(skip)]
    raw: &'a [u8],
}

pub fn print_listeners(listeners: &[ListenerOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for listener in listeners {
                print_json_line(listener);
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "TRANSPORT", "HANDLER"]);
            for listener in listeners {
                table.add_row(vec![
                    listener.address.clone(),
                    listener.transport.to_string(),
                    listener.handler.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for listener in listeners {
                println!(
                    "listening on {} ({}) handler={}",
                    listener.address, listener.transport, listener.handler
                );
            }
        }
    }
    let _ = std::io::stdout().flush();
}

pub fn print_response(
    address: &SocketAddress,
    sent_bytes: usize,
    response: &[u8],
    format: OutputFormat,
) {
    let out = ResponseOutput {
        address: address.to_uri(),
        sent_bytes,
        response_size: response.len(),
        response: payload_preview(response),
        timestamp: now_unix_seconds(),
        raw: response,
    };

    match format {
        OutputFormat::Json => print_json_line(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "SENT", "SIZE", "RESPONSE"])
                .add_row(vec![
                    out.address.clone(),
                    out.sent_bytes.to_string(),
                    out.response_size.to_string(),
                    out.response.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "address={} sent={} size={} response={}",
                out.address, out.sent_bytes, out.response_size, out.response
            );
        }
        OutputFormat::Raw => print_raw(out.raw),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json_line<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
