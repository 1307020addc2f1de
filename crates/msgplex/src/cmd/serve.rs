use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use msgplex_frame::FrameConfig;
use msgplex_peer::{Binding, EchoHandler, PeerError, PrefixHandler, Server, ServerConfig};
use msgplex_transport::SocketAddress;
use tracing::{info, warn};

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listeners, ListenerOutput, OutputFormat};

/// Built-in handler selectable from the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerSpec {
    Echo,
    Ack,
    Prefix(String),
}

impl HandlerSpec {
    fn into_binding(self, address: SocketAddress) -> Binding {
        match self {
            HandlerSpec::Echo => Binding::new(address, EchoHandler),
            HandlerSpec::Ack => Binding::new(address, PrefixHandler::ack()),
            HandlerSpec::Prefix(prefix) => Binding::new(address, PrefixHandler::new(prefix)),
        }
    }
}

impl FromStr for HandlerSpec {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "echo" => Ok(HandlerSpec::Echo),
            "ack" => Ok(HandlerSpec::Ack),
            other => other
                .strip_prefix("prefix:")
                .map(|prefix| HandlerSpec::Prefix(prefix.to_string()))
                .ok_or_else(|| format!("unknown handler {other:?} (expected echo, ack or prefix:TEXT)")),
        }
    }
}

impl fmt::Display for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerSpec::Echo => f.write_str("echo"),
            HandlerSpec::Ack => f.write_str("ack"),
            HandlerSpec::Prefix(prefix) => write!(f, "prefix:{prefix}"),
        }
    }
}

/// `ADDRESS=HANDLER` from the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingSpec {
    pub address: SocketAddress,
    pub handler: HandlerSpec,
}

impl FromStr for BindingSpec {
    type Err = String;

    /// Splits at the first `=` that leaves a valid address on the left and
    /// a valid handler on the right, so either side may contain `=`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut last_error = format!("expected ADDRESS=HANDLER, got {input:?}");
        for (index, _) in input.match_indices('=') {
            let (address, handler) = (&input[..index], &input[index + 1..]);
            let address = match address.parse::<SocketAddress>() {
                Ok(address) => address,
                Err(err) => {
                    last_error = err.to_string();
                    continue;
                }
            };
            match handler.parse::<HandlerSpec>() {
                Ok(handler) => return Ok(BindingSpec { address, handler }),
                Err(err) => last_error = err,
            }
        }
        Err(last_error)
    }
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let tick = parse_duration(&args.tick)?;
    let config = ServerConfig {
        frame: FrameConfig {
            max_payload_size: args.max_payload,
            ..FrameConfig::default()
        },
        backlog: args.backlog,
        log_payloads: args.log_payloads,
        ..ServerConfig::default()
    };

    let handler_names: Vec<String> = args.bindings.iter().map(|b| b.handler.to_string()).collect();
    let bindings = args
        .bindings
        .into_iter()
        .map(|spec| spec.handler.into_binding(spec.address))
        .collect();

    let mut server = Server::with_config(bindings, config);
    server
        .listen()
        .map_err(|err| peer_error("listen failed", err))?;

    let listeners: Vec<ListenerOutput> = server
        .listener_addresses()
        .iter()
        .zip(handler_names)
        .map(|(address, handler)| ListenerOutput::new(address, handler))
        .collect();
    print_listeners(&listeners, format);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut handled = 0usize;
    while running.load(Ordering::SeqCst) {
        match server.check_messages(Some(tick)) {
            Ok(delivered) => handled += delivered,
            Err(PeerError::Wait(err)) => warn!(error = %err, "readiness wait failed"),
            Err(err) => return Err(peer_error("serve failed", err)),
        }
        if args.count.is_some_and(|count| handled >= count) {
            break;
        }
    }

    info!(handled, "shutting down");
    server.close_all();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_handler_specs() {
        assert_eq!("echo".parse::<HandlerSpec>().unwrap(), HandlerSpec::Echo);
        assert_eq!("ack".parse::<HandlerSpec>().unwrap(), HandlerSpec::Ack);
        assert_eq!(
            "prefix:OK=".parse::<HandlerSpec>().unwrap(),
            HandlerSpec::Prefix("OK=".into())
        );
        assert!("shout".parse::<HandlerSpec>().is_err());
    }

    #[test]
    fn parses_binding_specs() {
        let spec: BindingSpec = "unix:/tmp/a.sock=echo".parse().unwrap();
        assert_eq!(spec.address, SocketAddress::unix("/tmp/a.sock"));
        assert_eq!(spec.handler, HandlerSpec::Echo);

        let spec: BindingSpec = "tcp6:[::1]:9000=prefix:k=v".parse().unwrap();
        assert_eq!(spec.address, SocketAddress::inet6("::1", 9000));
        assert_eq!(spec.handler, HandlerSpec::Prefix("k=v".into()));

        let spec: BindingSpec = "/tmp/a=b.sock=ack".parse().unwrap();
        assert_eq!(spec.address, SocketAddress::unix("/tmp/a=b.sock"));
        assert_eq!(spec.handler, HandlerSpec::Ack);
    }

    #[test]
    fn rejects_bad_binding_specs() {
        assert!("unix:/tmp/a.sock".parse::<BindingSpec>().is_err());
        assert!("unix:/tmp/a.sock=nope".parse::<BindingSpec>().is_err());
        assert!("bogus=echo".parse::<BindingSpec>().is_err());
    }
}
