use clap::Parser;
use serde::{Deserialize, Serialize};

/// Passive traffic observer for a key-value database protocol.
#[derive(Parser, Debug, Serialize, Deserialize)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database port to sniff.
    #[arg(short = 'P', long, default_value_t = 8087, env = "KVSNIFF_PORT")]
    pub port: u16,

    /// Interface to sniff.
    #[arg(
        short = 'i',
        long,
        default_value = "eth0",
        env = "KVSNIFF_INTERFACE"
    )]
    pub interface: String,

    /// Bytes captured per packet.
    #[arg(short = 's', long, default_value_t = 1024, env = "KVSNIFF_SNAPLEN")]
    pub snaplen: i32,

    /// Seconds between status reports.
    #[arg(short = 't', long, default_value_t = 10, env = "KVSNIFF_PERIOD")]
    pub period: u64,

    /// Fingerprints shown per status report.
    #[arg(
        short = 'd',
        long,
        default_value_t = 25,
        env = "KVSNIFF_DISPLAY_COUNT"
    )]
    pub display_count: usize,

    /// Print every decoded query (spammy).
    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::SetTrue,
        env = "KVSNIFF_VERBOSE"
    )]
    #[serde(skip_serializing_if = "is_false")]
    pub verbose: bool,

    /// Fingerprint template: #b bucket, #k key, #s source ip:port,
    /// #i source ip, #m method, ## a literal '#'.
    #[arg(short = 'f', long, default_value = "#b:#k", env = "KVSNIFF_FORMAT")]
    pub format: String,
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::Cli;

    #[test]
    fn defaults_match_the_documented_interface() {
        let cli = Cli::parse_from(["kvsniff"]);
        assert_eq!(cli.port, 8087);
        assert_eq!(cli.interface, "eth0");
        assert_eq!(cli.snaplen, 1024);
        assert_eq!(cli.period, 10);
        assert_eq!(cli.display_count, 25);
        assert!(!cli.verbose);
        assert_eq!(cli.format, "#b:#k");
    }

    #[test]
    fn parses_short_flags() {
        let cli = Cli::parse_from([
            "kvsniff", "-P", "9000", "-i", "lo", "-s", "65535", "-t", "5", "-d", "10", "-v",
            "-f", "#m #b",
        ]);
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.interface, "lo");
        assert_eq!(cli.snaplen, 65535);
        assert_eq!(cli.period, 5);
        assert_eq!(cli.display_count, 10);
        assert!(cli.verbose);
        assert_eq!(cli.format, "#m #b");
    }

    #[test]
    fn parses_long_flags() {
        let cli = Cli::parse_from(["kvsniff", "--port", "8098", "--interface", "en0"]);
        assert_eq!(cli.port, 8098);
        assert_eq!(cli.interface, "en0");
    }
}
