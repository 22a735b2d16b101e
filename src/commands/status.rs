// ABOUTME: Read-only commands: status and deployment history.
// ABOUTME: Status never waits for a running deploy.

use super::Context;
use keel::error::Result;

pub async fn status(ctx: &Context, json: bool) -> Result<()> {
    let runtime = ctx.connect()?;
    let status = ctx.deployment.status(&runtime).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    if status.is_empty() {
        println!("No project deployed.");
        return Ok(());
    }

    let config = ctx.deployment.config();
    println!("Project: {}", config.project_name);
    println!("Branch: {}", status.branch);
    println!("Commit: {} {}", status.commit_hash, status.commit_message);
    println!("Build type: {}", status.build_type);
    if status.build_container_active {
        println!("Build in progress");
    }
    if status.containers.is_empty() {
        println!("Containers: none");
    } else {
        println!("Containers: {}", status.containers.join(", "));
    }
    Ok(())
}

pub fn history(ctx: &Context) -> Result<()> {
    for record in ctx.deployment.history()? {
        let commit = record.commit_hash.get(..7).unwrap_or(&record.commit_hash);
        println!(
            "{}  {}  {:<10}  {}",
            record.deployed_at.format("%Y-%m-%d %H:%M:%S"),
            commit,
            record.build_type,
            record.containers.join(", ")
        );
    }
    Ok(())
}
