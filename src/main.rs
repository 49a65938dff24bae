use anyhow::Result;
use serde_json::json;
use tapewatch::logging::{log, obj, v_str, Domain, Level};
use tapewatch::{Sentinel, SentinelConfig};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = SentinelConfig::from_env();
    let run_secs: u64 = std::env::var("RUN_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(60);

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("run_id", v_str(tapewatch::logging::run_id())),
            ("run_secs", json!(run_secs)),
            ("tick_ms", json!(cfg.tick_interval.as_millis() as u64)),
            ("trigger_prob", json!(cfg.trigger_probability)),
            ("auto_confidence", json!(cfg.auto_trigger_confidence)),
        ]),
    );

    let sentinel = Sentinel::random(cfg)?;
    sentinel.start()?;

    tokio::select! {
        _ = sleep(Duration::from_secs(run_secs)) => {}
        _ = tokio::signal::ctrl_c() => {
            log(Level::Info, Domain::System, "interrupt", obj(&[]));
        }
    }

    sentinel.stop();
    sentinel.log_session_summary();
    Ok(())
}
