use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("portrelay {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: portrelay");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", env!("PORTRELAY_BUILD_TARGET"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "frame limits: {} elements, {} bytes per element",
        portrelay_frame::DEFAULT_MAX_ELEMENTS,
        portrelay_frame::DEFAULT_MAX_ELEMENT_SIZE
    );
    println!(
        "features: peer={}, async={}, cli=true",
        cfg!(feature = "peer"),
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
