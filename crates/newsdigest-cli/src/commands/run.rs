use anyhow::Result;

use newsdigest_core::digest::{DigestPipeline, JobStatus};
use newsdigest_core::feed::FeedFetcher;
use newsdigest_core::mail::{GmailCredentials, GmailSender};
use newsdigest_core::AppConfig;

pub async fn run(config: &AppConfig) -> Result<()> {
    let settings = config.resolve()?;
    let credentials = GmailCredentials::from_config(&config.gmail)?;

    let fetcher = FeedFetcher::new(&config.sync)?;
    let sender = GmailSender::new(credentials, config.sync.request_timeout_secs)?;
    let pipeline = DigestPipeline::new(Box::new(fetcher), Box::new(sender), &settings);

    println!(
        "Running {} digest job(s) for the last {}h...\n",
        settings.jobs.len(),
        settings.params.hours_back
    );

    let reports = pipeline.run_all(&settings.jobs).await;

    let mut failed = 0;
    for report in &reports {
        match &report.status {
            JobStatus::Sent { items } => {
                println!(
                    "  Sent {} digest with {} items to {}",
                    report.tag, items, report.recipient
                );
            }
            JobStatus::Failed { stage, error } => {
                failed += 1;
                println!("  Job {} failed during {}: {}", report.tag, stage, error);
            }
        }
    }

    let skipped = settings.jobs.len() - reports.len();
    if skipped > 0 {
        println!("  {} job(s) skipped after the first failure", skipped);
    }

    super::ensure_no_failures(failed, settings.jobs.len())?;

    println!("\nDone.");
    Ok(())
}
