//! Defines command-line interface options using `clap` for the ncjson server.

use clap::Parser;
use std::path::PathBuf;

/// Serve a NetCDF file as JSON over HTTP
#[derive(Parser, Debug)]
#[command(
    name = "ncjson",
    version,
    about = "Read-only JSON access to a NetCDF file"
)]
pub struct Args {
    /// Path to the NetCDF file
    #[arg(short, long, env = "NCJSON_FILE")]
    pub file: PathBuf,

    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080", env = "NCJSON_LISTEN")]
    pub listen: String,

    /// Number of worker threads, each holding its own file handle. Defaults to number of CPU cores.
    #[arg(short = 'w', long, env = "NCJSON_WORKERS")]
    pub workers: Option<usize>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "NCJSON_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false, env = "NCJSON_LOG_JSON")]
    pub log_json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ncjson", "--file", "plume.nc"]).unwrap();
        assert_eq!(args.file, PathBuf::from("plume.nc"));
        assert_eq!(args.listen, "0.0.0.0:8080");
        assert_eq!(args.workers, None);
        assert!(!args.log_json);
    }

    #[test]
    fn test_file_is_required() {
        assert!(Args::try_parse_from(["ncjson"]).is_err());
    }

    #[test]
    fn test_workers_flag() {
        let args = Args::try_parse_from(["ncjson", "-f", "a.nc", "-w", "3", "--log-json"]).unwrap();
        assert_eq!(args.workers, Some(3));
        assert!(args.log_json);
    }
}
