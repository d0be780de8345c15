use std::io::{self, Write};
use std::process::ExitCode;

use tracing::{error, info};

use pr_commenter::comment::CallContext;
use pr_commenter::config::PluginConfig;
use pr_commenter::github::GithubClient;
use pr_commenter::{repo, secret, Commenter, Outcome, Policy};

fn main() -> ExitCode {
    pr_commenter::setup_log();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            report_failure(&mut io::stderr(), &message);
            ExitCode::FAILURE
        }
    }
}

/// Written regardless of the log filter, so `RUST_LOG=off` still shows why
/// the step failed.
fn report_failure(out: &mut impl Write, message: &str) {
    let _ = writeln!(out, "{message}");
}

fn run() -> Result<(), String> {
    let cfg = PluginConfig::from_env().map_err(|e| format!("Error reading configuration: {e}"))?;

    let (owner, repo) = repo::parse_repo(&cfg.repository)
        .map_err(|e| format!("Error parsing repo info: {e}"))?;

    let Some(pr_number) = cfg.pull_request.as_deref() else {
        println!("Not a pull request. Exiting gracefully.");
        return Ok(());
    };

    let token = secret::get_secret(&cfg.secret_name)
        .map_err(|e| format!("Error retrieving secret: {e}"))?;

    let client = GithubClient::new(&cfg.api_url, &token, cfg.timeout)
        .map_err(|e| format!("Error creating GitHub client: {e}"))?;

    let commenter = Commenter::new(client, &cfg.signature_config())
        .map_err(|e| format!("Error preparing comment signature: {e}"))?;

    let policy = Policy::from_allow_repeats(cfg.allow_repeats);
    info!(%owner, %repo, pr = pr_number, ?policy, signature = %commenter.signature(), "Commenting on pull request");

    let ctx = CallContext::with_timeout(cfg.timeout);
    let outcome = commenter
        .run(&ctx, policy, &owner, &repo, pr_number, &cfg.message)
        .map_err(|e| format!("Error commenting on {owner}/{repo}#{pr_number}: {e}"))?;

    match outcome {
        Outcome::Created(comment) => {
            println!("Comment posted successfully: {}", comment.html_url)
        }
        Outcome::Unchanged(comment) => println!("Matching comment exists: {}", comment.html_url),
        Outcome::Updated(comment) => {
            println!("Comment updated successfully: {}", comment.html_url)
        }
    }

    Ok(())
}
