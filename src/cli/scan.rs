//! The `scan` subcommand.

use std::fs;
use std::sync::Arc;

use arcadescan_probe::{ChromiumTransport, ProbeConfig, ProbeTransport, TransportConfig};
use tracing::{info, warn};
use url::Url;

use crate::cli::{OutputFormat, ScanArgs};
use crate::errors::{ScanError, ScanResult, EXIT_CLEAN, EXIT_FLAGGED};
use crate::manifest::Manifest;
use crate::reconcile::apply_demotions;
use crate::report::{render_json, render_table};
use crate::runner::{ScanRunner, SessionProber};

pub async fn cmd_scan(args: ScanArgs) -> ScanResult<u8> {
    let base_url =
        Url::parse(&args.base_url).map_err(|err| ScanError::BadEndpoint(err.to_string()))?;
    let mut manifest = Manifest::load(&args.manifest)?;

    let probe_cfg = ProbeConfig::default().with_readiness_timeout_ms(args.timeout * 1000);
    let runner = ScanRunner::new(base_url, probe_cfg);

    // Infra failure aborts before any browser work; no partial results.
    runner.check_reachable().await?;

    let transport = Arc::new(build_transport(&args));
    transport.start().await?;

    let prober = SessionProber::new(transport, probe_cfg);
    let results = runner.run(&manifest.games, &prober).await?;

    match args.format {
        OutputFormat::Table => print!("{}", render_table(&results)),
        OutputFormat::Json => println!("{:#}", render_json(&results)),
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&results)
            .map_err(|err| ScanError::Other(err.into()))?;
        fs::write(path, json).map_err(|err| ScanError::Other(err.into()))?;
        info!(target: "scan", path = %path.display(), "structured report written");
    }

    if args.fix {
        let updated = apply_demotions(&mut manifest, &results, &args.manifest)?;
        if updated > 0 {
            info!(target: "scan", updated, "entries demoted to broken");
        }
    } else if results.iter().any(|r| r.wants_write_back()) {
        warn!(target: "scan", "fresh demotions found; re-run with --fix to persist them");
    }

    let flagged = results.iter().filter(|r| r.is_broken()).count();
    Ok(if flagged > 0 { EXIT_FLAGGED } else { EXIT_CLEAN })
}

fn build_transport(args: &ScanArgs) -> ChromiumTransport {
    let mut cfg = TransportConfig::default();
    if let Some(path) = &args.chrome_path {
        cfg.executable = path.clone();
    }
    if args.headful {
        cfg.headless = false;
    }
    cfg.websocket_url = args.ws_url.clone();
    ChromiumTransport::new(cfg)
}
