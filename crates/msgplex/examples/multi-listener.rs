//! One server, three listeners, three handlers.
//!
//! Run with:
//!   cargo run --example multi-listener
//!
//! The example serves a Unix socket and two TCP ports from a single thread,
//! then drives each one with a client from a second thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use msgplex::peer::{Binding, Client, EchoHandler, PrefixHandler, Server};
use msgplex::transport::SocketAddress;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("msgplex-multi-{}", std::process::id()));

    let mut server = Server::new(vec![
        Binding::new(SocketAddress::unix(sock_dir.join("echo.sock")), EchoHandler),
        Binding::new(SocketAddress::inet("127.0.0.1", 0), PrefixHandler::ack()),
        Binding::new(SocketAddress::inet("127.0.0.1", 0), |req: &[u8]| {
            req.iter().rev().copied().collect::<Vec<u8>>()
        }),
    ]);
    server.listen()?;
    let addresses = server.listener_addresses();
    for address in &addresses {
        eprintln!("listening on {}", address.to_uri());
    }

    let done = Arc::new(AtomicBool::new(false));
    let clients_done = Arc::clone(&done);
    let clients = thread::spawn(move || {
        let result = drive_clients(&addresses);
        clients_done.store(true, Ordering::SeqCst);
        result
    });

    let mut handled = 0;
    while !done.load(Ordering::SeqCst) {
        handled += server.check_messages(Some(Duration::from_millis(50)))?;
    }
    clients.join().map_err(|_| "client thread panicked")??;
    eprintln!("handled {handled} messages");

    server.close_all();
    let _ = std::fs::remove_dir_all(&sock_dir);
    Ok(())
}

fn drive_clients(addresses: &[SocketAddress]) -> Result<(), msgplex::peer::PeerError> {
    for address in addresses {
        let mut client = Client::connect(address)?;
        for message in ["ping", "hello"] {
            let response = client.request(message.as_bytes())?;
            eprintln!(
                "{} <- {message:?} -> {:?}",
                address.to_uri(),
                String::from_utf8_lossy(&response)
            );
        }
    }
    Ok(())
}
