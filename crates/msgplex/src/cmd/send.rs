use std::fs;

use msgplex_frame::FrameConfig;
use msgplex_peer::{Client, ClientConfig};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{io_error, peer_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let config = ClientConfig {
        frame: FrameConfig {
            max_payload_size: args.max_payload,
            read_timeout: Some(timeout),
            write_timeout: Some(timeout),
            ..FrameConfig::default()
        },
        log_payloads: args.log_payloads,
    };

    let mut client = Client::connect_with_config(&args.address, config)
        .map_err(|err| peer_error("connect failed", err))?;
    let sent = client
        .send(&payload)
        .map_err(|err| peer_error("send failed", err))?;
    let response = client
        .receive()
        .map_err(|err| peer_error("receive failed", err))?;
    client.disconnect();

    print_response(&args.address, sent, &response, format);
    Ok(SUCCESS)
}

/// `--data`, `--file`, or an empty message when neither is given.
fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
