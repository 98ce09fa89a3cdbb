//! Media pipeline: image generation and video rendering.
//!
//! Images come from an A1111-compatible endpoint; videos are rendered from
//! a generated still through the external frame tool. Artifacts land in
//! `outputs/` named `<kind>-<iso-timestamp>.<ext>`.

use crate::config::Config;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

/// Base64 decode without pulling a crate in for it.
fn decode_base64(input: &str) -> Result<Vec<u8>> {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut lookup = [255u8; 256];
    for (i, &c) in TABLE.iter().enumerate() {
        lookup[c as usize] = i as u8;
    }
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &byte in input.as_bytes() {
        if byte == b'=' || byte == b'\n' || byte == b'\r' {
            continue;
        }
        let v = lookup[byte as usize];
        if v == 255 {
            anyhow::bail!("invalid base64 input");
        }
        acc = (acc << 6) | v as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }
    Ok(out)
}

fn artifact_path(config: &Config, kind: &str, ext: &str) -> Result<PathBuf> {
    let dir = config.outputs_dir();
    std::fs::create_dir_all(&dir).context("creating outputs dir")?;
    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
    Ok(dir.join(format!("{}-{}.{}", kind, stamp, ext)))
}

/// Generate one image; returns the artifact path.
pub async fn generate_image(config: &Config, prompt: &str) -> Result<PathBuf> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;
    let url = format!("{}/sdapi/v1/txt2img", config.a1111_url);
    let body = serde_json::json!({
        "prompt": prompt,
        "steps": 20,
        "width": 768,
        "height": 512,
    });

    let response = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .context("image backend unreachable")?;
    if !response.status().is_success() {
        anyhow::bail!("image backend returned {}", response.status());
    }
    let parsed: Value = response.json().await.context("parsing image response")?;
    let encoded = parsed["images"][0]
        .as_str()
        .context("image backend returned no images")?;
    let bytes = decode_base64(encoded)?;

    let path = artifact_path(config, "image", "png")?;
    std::fs::write(&path, bytes).context("writing image artifact")?;
    info!("image artifact: {}", path.display());
    Ok(path)
}

/// Render a short video by looping a generated still through the frame
/// tool.
pub async fn generate_video(config: &Config, prompt: &str, seconds: u32) -> Result<PathBuf> {
    let still = generate_image(config, prompt).await?;
    let out = artifact_path(config, "video", "mp4")?;
    let seconds = seconds.clamp(1, 30);

    let status = Command::new(&config.ffmpeg_path)
        .args([
            "-y",
            "-loop",
            "1",
            "-i",
            &still.display().to_string(),
            "-t",
            &seconds.to_string(),
            "-vf",
            "scale=768:512,format=yuv420p",
            "-r",
            "24",
            &out.display().to_string(),
        ])
        .status()
        .await
        .context("frame tool unavailable")?;
    if !status.success() {
        anyhow::bail!("frame tool exited with {:?}", status.code());
    }
    info!("video artifact: {}", out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64() {
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64("aGVsbG8h").unwrap(), b"hello!");
        assert!(decode_base64("not base64 !!!").is_err());
    }

    #[test]
    fn test_artifact_naming() {
        let mut config = Config::from_env();
        let dir = tempfile::tempdir().unwrap();
        config.data_dir = dir.path().to_path_buf();
        let path = artifact_path(&config, "image", "png").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("image-"));
        assert!(name.ends_with(".png"));
        assert!(path.parent().unwrap().ends_with("outputs"));
    }
}
