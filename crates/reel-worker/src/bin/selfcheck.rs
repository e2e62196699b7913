use std::path::Path;
use std::time::Duration;

use reel_media::{ExternalTool, ProcessTool};
use reel_worker::WorkerConfig;

const TOOLS: &[(&str, &str)] = &[("yt-dlp", "--version"), ("ffmpeg", "-version"), ("ffprobe", "-version")];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = WorkerConfig::from_env();

    println!(
        "reel-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    for dir in config.writable_dirs() {
        ensure_dir(dir).await?;
    }

    for (name, flag) in TOOLS {
        let explicit = match *name {
            "yt-dlp" => config.ytdlp_path.as_deref(),
            "ffmpeg" => config.ffmpeg_path.as_deref(),
            _ => config.ffprobe_path.as_deref(),
        };
        ensure_tool(name, explicit, flag).await?;
    }

    println!("reel-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))?;
    Ok(())
}

async fn ensure_tool(name: &str, explicit: Option<&str>, flag: &str) -> anyhow::Result<()> {
    let tool = ProcessTool::locate(name, explicit)
        .map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;
    let output = tool
        .invoke(&[flag.to_string()], Duration::from_secs(30))
        .await
        .map_err(|e| anyhow::anyhow!("{} {} failed: {}", name, flag, e))?;

    let version = output.stdout.lines().next().unwrap_or("").trim().to_string();
    println!("reel-selfcheck: {} {}", name, version);
    Ok(())
}
