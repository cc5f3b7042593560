// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

use crate::gateway::gemini;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string). Unused in local mode.
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Whether to run in local mode (in-memory store, no rate limiting).
    pub local_mode: bool,
    /// API key for the Gemini model service.
    pub gemini_api_key: String,
    /// Base URL of the model service (overridable for testing).
    pub gemini_base_url: String,
    /// Model used for image analysis.
    pub analysis_model: String,
    /// Model used for battle narration.
    pub battle_model: String,
    /// Directory containing pre-built frontend files to serve.
    /// When set, the backend serves static files from this path.
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:bug_arena.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `BUG_ARENA_LOCAL_MODE` - Set to `true` to enable local mode
    /// - `GEMINI_API_KEY` - model service credential (empty key means every
    ///   model call fails and battles fall back to the no-harm outcome)
    /// - `GEMINI_BASE_URL`, `ANALYSIS_MODEL`, `BATTLE_MODEL` - overrides
    /// - `STATIC_DIR` - path to frontend dist directory for static file serving
    ///
    /// CLI flags:
    /// - `--local` - Enable local mode (same as `BUG_ARENA_LOCAL_MODE=true`)
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:bug_arena.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(&args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let local_mode = args.contains(&"--local".to_string())
            || std::env::var("BUG_ARENA_LOCAL_MODE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false);

        let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        let gemini_base_url = std::env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| gemini::DEFAULT_BASE_URL.to_string());
        let analysis_model =
            std::env::var("ANALYSIS_MODEL").unwrap_or_else(|_| gemini::DEFAULT_MODEL.to_string());
        let battle_model =
            std::env::var("BATTLE_MODEL").unwrap_or_else(|_| gemini::DEFAULT_MODEL.to_string());

        let static_dir = std::env::var("STATIC_DIR").ok().map(PathBuf::from);

        Config {
            database_url,
            port,
            local_mode,
            gemini_api_key,
            gemini_base_url,
            analysis_model,
            battle_model,
            static_dir,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

/// Global flag indicating local mode is active.
/// This is set once at startup and read by the rate limiter.
static LOCAL_MODE: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Set the local mode flag (called once at startup).
pub fn set_local_mode(enabled: bool) {
    LOCAL_MODE.store(enabled, std::sync::atomic::Ordering::Relaxed);
}

/// Check if local mode is active.
pub fn is_local_mode() -> bool {
    LOCAL_MODE.load(std::sync::atomic::Ordering::Relaxed)
}
