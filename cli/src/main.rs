mod args;
mod harness;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let config = match args::parse(argv) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}\n\n{}", args::USAGE);
            std::process::exit(1);
        }
    };

    // `harness::run` panics on fatal error conditions (corrupt child,
    // unexpected wait status); there is no recoverable `Result` to
    // propagate past that point, so main's own `anyhow::Result` surface is
    // reserved for argument/setup failures at this boundary.
    let report = harness::run(config);
    println!("{report}");
    Ok(())
}
