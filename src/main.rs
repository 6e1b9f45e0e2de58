use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use sdf_mesher::config::{BuildParams, CliArgs};
use sdf_mesher::export;
use sdf_mesher::mesh::ExtractionStats;
use sdf_mesher::pipeline::Pipeline;
use sdf_mesher::progress::{CancelToken, TaskStatus};

/// Summary printed with `--stats-json`.
#[derive(Serialize)]
struct RunSummary {
    scene: String,
    vertices: usize,
    triangles: usize,
    cells: usize,
    duration_s: f64,
    extraction: ExtractionStats,
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Init tracing
    let filter = if args.verbose {
        EnvFilter::new("sdf_mesher=debug")
    } else {
        EnvFilter::new("sdf_mesher=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let params: BuildParams = (&args).into();
    let sdf = args.scene.field();
    let cancel = CancelToken::new();

    let result = Pipeline::run(0, &sdf, &params, &cancel, |update| {
        if update.status == TaskStatus::Running {
            debug!(phase = ?update.phase, progress = update.progress, "progress");
        }
    });

    match result {
        Ok(result) => {
            export::write_obj(&args.output, &result.mesh)?;
            if args.stats_json {
                let summary = RunSummary {
                    scene: args.scene.to_string(),
                    vertices: result.mesh.vertex_count(),
                    triangles: result.mesh.triangle_count(),
                    cells: result.cell_count,
                    duration_s: result.duration.as_secs_f64(),
                    extraction: result.stats,
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Done: {} vertices, {} triangles in {:.2}s -> {}",
                    result.mesh.vertex_count(),
                    result.mesh.triangle_count(),
                    result.duration.as_secs_f64(),
                    args.output.display()
                );
            }
            Ok(())
        }
        Err(e) => {
            error!(%e, "Meshing failed");
            Err(anyhow::anyhow!(e)).context("sdf-mesher pipeline failed")
        }
    }
}
