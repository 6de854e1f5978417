use std::time::Duration;
use thiserror::Error;

/// Which scheduler variant to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    RoundRobin,
    Mlfq,
    Sjf,
}

/// Parsed command-line configuration. Follows a `-k=v`/`--name=v`
/// prefix-stripping grammar rather than `clap`, which does not cleanly
/// express bare `-k=v` short flags without treating `=` as a separate
/// long-form concept.
#[derive(Debug, Clone)]
pub struct Config {
    pub scheduler: SchedulerKind,
    pub ncpus: usize,
    pub timeslice: Duration,
    pub nlevels: usize,
    pub runtime: Duration,
    pub boost_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::RoundRobin,
            ncpus: 1,
            timeslice: Duration::from_millis(24),
            nlevels: 4,
            runtime: Duration::from_secs(30),
            boost_period: Duration::from_millis(2500),
        }
    }
}

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("unrecognized argument: {0}")]
    UnrecognizedArgument(String),
    #[error("no scheduler selected (pass -s=rr, -s=mlfq, or -s=sjf)")]
    MissingScheduler,
    #[error("unknown scheduler '{0}' (expected rr, mlfq, or sjf)")]
    UnknownScheduler(String),
    #[error("invalid value for {flag}: '{value}'")]
    InvalidValue {
        flag: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

pub const USAGE: &str = "\
Usage: schedsim -s=<rr|mlfq|sjf> [options]

Selecting a scheduler:
    -s=SCHEDULER                 rr, mlfq, or sjf (required)

Tunable parameters:
    -n=N,  --ncpus=N              simulated CPU / worker count (default 1)
    -t=T,  --timeslice=T          timeslice in milliseconds (default 24)
    -l=L,  --nlevels=L            MLFQ priority levels (default 4)
    -r=R,  --runtime=R            total simulated wall time in seconds (default 30)
    -b=B,  --boost-period=B       MLFQ priority-boost period in milliseconds (default 2500)
";

/// Parse `args` (typically `std::env::args().skip(1)`) into a [`Config`].
pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Config, ArgsError> {
    let mut config = Config::default();
    let mut scheduler = None;

    for arg in args {
        if let Some(v) = strip_flag(&arg, &["-s="]) {
            scheduler = Some(parse_scheduler(v)?);
        } else if let Some(v) = strip_flag(&arg, &["-n=", "--ncpus="]) {
            config.ncpus = parse_usize("ncpus", v)?;
        } else if let Some(v) = strip_flag(&arg, &["-t=", "--timeslice="]) {
            config.timeslice = Duration::from_millis(parse_u64("timeslice", v)?);
        } else if let Some(v) = strip_flag(&arg, &["-l=", "--nlevels="]) {
            config.nlevels = parse_usize("nlevels", v)?;
        } else if let Some(v) = strip_flag(&arg, &["-r=", "--runtime="]) {
            config.runtime = Duration::from_secs(parse_u64("runtime", v)?);
        } else if let Some(v) = strip_flag(&arg, &["-b=", "--boost-period="]) {
            config.boost_period = Duration::from_millis(parse_u64("boost-period", v)?);
        } else {
            return Err(ArgsError::UnrecognizedArgument(arg));
        }
    }

    config.scheduler = scheduler.ok_or(ArgsError::MissingScheduler)?;
    Ok(config)
}

fn strip_flag<'a>(arg: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| arg.strip_prefix(p))
}

fn parse_scheduler(v: &str) -> Result<SchedulerKind, ArgsError> {
    match v {
        "rr" => Ok(SchedulerKind::RoundRobin),
        "mlfq" => Ok(SchedulerKind::Mlfq),
        "sjf" => Ok(SchedulerKind::Sjf),
        other => Err(ArgsError::UnknownScheduler(other.to_string())),
    }
}

fn parse_usize(flag: &'static str, v: &str) -> Result<usize, ArgsError> {
    v.parse()
        .map_err(|source| ArgsError::InvalidValue { flag, value: v.to_string(), source })
}

fn parse_u64(flag: &'static str, v: &str) -> Result<u64, ArgsError> {
    v.parse()
        .map_err(|source| ArgsError::InvalidValue { flag, value: v.to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_apply_when_only_scheduler_given() {
        let config = parse(args(&["-s=rr"])).unwrap();
        assert_eq!(config.scheduler, SchedulerKind::RoundRobin);
        assert_eq!(config.ncpus, 1);
        assert_eq!(config.timeslice, Duration::from_millis(24));
        assert_eq!(config.nlevels, 4);
        assert_eq!(config.runtime, Duration::from_secs(30));
    }

    #[test]
    fn long_and_short_forms_agree() {
        let a = parse(args(&["-s=mlfq", "-n=4"])).unwrap();
        let b = parse(args(&["-s=mlfq", "--ncpus=4"])).unwrap();
        assert_eq!(a.ncpus, b.ncpus);
    }

    #[test]
    fn missing_scheduler_is_an_error() {
        assert!(matches!(
            parse(args(&["-n=2"])),
            Err(ArgsError::MissingScheduler)
        ));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(matches!(
            parse(args(&["-s=rr", "--bogus=1"])),
            Err(ArgsError::UnrecognizedArgument(_))
        ));
    }

    #[test]
    fn unknown_scheduler_is_rejected() {
        assert!(matches!(
            parse(args(&["-s=cfs"])),
            Err(ArgsError::UnknownScheduler(_))
        ));
    }
}
