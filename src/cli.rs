use clap::Parser;

use crate::registry::SelectionPolicy;

/// In-memory service registry for the job platform
#[derive(Debug, Parser)]
#[command(name = "jobfirst-registry", version, about)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the HTTP server to
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Seconds an instance survives without a heartbeat
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Policy used to pick among healthy instances
    #[arg(long, value_enum)]
    pub policy: Option<SelectionPolicy>,

    /// Directory for the rolling log files
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Actively probe registered health check URLs
    #[arg(long)]
    pub probe: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "jobfirst-registry",
            "--port",
            "9000",
            "--policy",
            "round-robin",
            "--probe",
        ]);

        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.policy, Some(SelectionPolicy::RoundRobin));
        assert!(cli.probe);
        assert!(cli.host.is_none());
    }
}
