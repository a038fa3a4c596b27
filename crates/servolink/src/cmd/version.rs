use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    build_target: &'static str,
    rustc: &'static str,
    git_hash: &'static str,
    async_codec: bool,
    default_baud: u32,
}

impl BuildInfo {
    fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            target_os: std::env::consts::OS,
            target_arch: std::env::consts::ARCH,
            build_target: option_env!("SERVOLINK_BUILD_TARGET").unwrap_or("unknown"),
            rustc: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            async_codec: cfg!(feature = "async"),
            default_baud: servolink_transport::DEFAULT_BAUD_RATE,
        }
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let info = BuildInfo::current();
    if !args.extended {
        println!("{} {}", info.name, info.version);
        return Ok(SUCCESS);
    }

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(SUCCESS);
    }

    println!("name: {}", info.name);
    println!("version: {}", info.version);
    println!("target_os: {}", info.target_os);
    println!("target_arch: {}", info.target_arch);
    println!("build_target: {}", info.build_target);
    println!("rustc: {}", info.rustc);
    println!("git_hash: {}", info.git_hash);
    println!("features: async={}, cli=true", info.async_codec);
    println!("default_baud: {}", info.default_baud);

    Ok(SUCCESS)
}
