use std::path::Path;

use anyhow::{anyhow, Result};

use newsdigest_core::digest::{build_digest, DigestRenderer};
use newsdigest_core::feed::FeedFetcher;
use newsdigest_core::AppConfig;

pub async fn run(
    config: &AppConfig,
    tag: Option<&str>,
    html: bool,
    output: Option<&Path>,
) -> Result<()> {
    let params = config.digest_params()?;
    let mut jobs = config.resolve_jobs()?;

    if let Some(tag) = tag {
        jobs.retain(|job| job.tag.eq_ignore_ascii_case(tag));
        if jobs.is_empty() {
            return Err(anyhow!("No job with tag '{}'", tag));
        }
    }

    if let Some(dir) = output {
        std::fs::create_dir_all(dir)?;
    }

    let fetcher = FeedFetcher::new(&config.sync)?;
    let renderer = DigestRenderer::new();

    let mut failed = 0;
    for job in &jobs {
        let digest = match build_digest(&fetcher, job, params).await {
            Ok(digest) => digest,
            Err(e) => {
                failed += 1;
                eprintln!("Job {} failed: {}", job.tag, e);
                continue;
            }
        };

        let rendered = renderer.render(&digest);
        let subject = digest.subject(&config.digest.subject_prefix);

        match output {
            Some(dir) => {
                let base = job.tag.to_ascii_lowercase();
                let text_path = dir.join(format!("{}.txt", base));
                let html_path = dir.join(format!("{}.html", base));
                std::fs::write(&text_path, &rendered.text)?;
                std::fs::write(&html_path, &rendered.html)?;
                println!("{}", subject);
                println!("  {}", text_path.display());
                println!("  {}", html_path.display());
            }
            None => {
                println!("Subject: {}\n", subject);
                if html {
                    println!("{}", rendered.html);
                } else {
                    println!("{}", rendered.text);
                }
                println!();
            }
        }
    }

    super::ensure_no_failures(failed, jobs.len())
}
