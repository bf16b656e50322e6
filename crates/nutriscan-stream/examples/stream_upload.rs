use std::path::PathBuf;

use clap::Parser;
use nutriscan_stream::prelude::*;

/// Uploads a lab report, prints analysis steps as they stream in, then
/// prints the deficiencies from the finished report.
#[derive(Parser)]
struct Args {
    /// PDF lab report to analyze.
    report: PathBuf,
    /// Dietary preference tags, comma separated (for example `vegan,gluten-free`).
    #[arg(long, value_delimiter = ',')]
    preferences: Vec<String>,
    /// API base URL; overrides `NUTRISCAN_API_URL`.
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StreamError> {
    let _ = dotenvy::dotenv();
    init_observability();
    let args = Args::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = args.base_url {
        config = config.base_url(base_url);
    }
    let client = ReportClient::new(config)?;
    let policy = StreamPolicy::from_env()?;
    let upload = UploadRequest::from_path(&args.report)
        .await?
        .dietary_preferences(&args.preferences);

    let mut session = Session::new();
    let mut updates = session.subscribe();
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            for step in snapshot.progress.iter().skip(printed) {
                match step.kind {
                    ProgressKind::ToolInvocation => println!(
                        "[{}] {} -> {}",
                        step.step_number,
                        step.tool_name.as_deref().unwrap_or("tool"),
                        step.result_summary
                    ),
                    ProgressKind::Narration => println!("[{}] {}", step.step_number, step.reasoning),
                }
            }
            printed = snapshot.progress.len();
            if snapshot.state.is_terminal() {
                break;
            }
        }
    });

    let (abort, signal) = abort_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let outcome = run_attempt(&mut session, &client, &upload, &policy, signal).await;
    let _ = printer.await;

    match outcome {
        AttemptOutcome::Completed(summary) => {
            println!(
                "report {}: {} biomarkers, {} deficiencies, {} recommendations",
                summary.report_id,
                summary.biomarker_count,
                summary.deficiency_count,
                summary.recommendation_count
            );
            let report = client.fetch_report(&summary.report_id).await?;
            for deficiency in &report.deficiencies {
                println!(
                    "  {} {} {} ({}, normal {})",
                    deficiency.name,
                    deficiency.value,
                    deficiency.unit,
                    deficiency.severity,
                    deficiency.normal_range
                );
            }
        }
        AttemptOutcome::Failed(message) => eprintln!("analysis failed: {message}"),
        AttemptOutcome::Cancelled => eprintln!("analysis cancelled"),
    }
    Ok(())
}
