use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("msgplex {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "target: {}",
        option_env!("MSGPLEX_BUILD_TARGET").unwrap_or(std::env::consts::ARCH)
    );
    println!(
        "profile: {}",
        option_env!("MSGPLEX_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("rust-version: {}", env!("CARGO_PKG_RUST_VERSION"));
    println!(
        "transports: unix, tcp4, tcp6 (backlog {})",
        msgplex_transport::DEFAULT_BACKLOG
    );
    println!(
        "wire: {}-byte big-endian length prefix",
        msgplex_frame::HEADER_SIZE
    );

    Ok(SUCCESS)
}
