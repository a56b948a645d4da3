use castr_session::SessionConfig;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_version, OutputFormat, VersionOutput};

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("castr {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let defaults = SessionConfig::default();
    let ports = defaults.ports.range();
    let out = VersionOutput {
        name: "castr",
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("CASTR_BUILD_TARGET").unwrap_or("unknown"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        formats: vec!["opus", "flac"],
        port_range: format!(
            "{}..{}",
            ports.start,
            u32::from(ports.start) + u32::from(ports.len)
        ),
        max_tracks: defaults.limits.max_tracks,
    };
    print_version(&out, format);

    Ok(SUCCESS)
}
