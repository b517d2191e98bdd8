// ABOUTME: Runs compositor command-line tools (hyprctl, niri msg) and parses their JSON output
// ABOUTME: Commands are routed through flatpak-spawn when running inside a flatpak sandbox

use crate::error::BackendError;
use crate::platform::{Rect, WmInfo};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

fn in_flatpak() -> bool {
    std::env::var("container").is_ok_and(|v| v == "flatpak")
}

/// Builds a command for a program on the host, escaping the flatpak sandbox if needed.
pub fn host_command(program: &str, args: &[&str]) -> Command {
    let mut cmd = if in_flatpak() {
        let mut cmd = Command::new("flatpak-spawn");
        cmd.arg("--host").arg(program);
        cmd
    } else {
        Command::new(program)
    };
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs the program and returns its stdout. A non-zero exit is an error.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner;

#[async_trait]
impl ToolRunner for CommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>> {
        let command = format!("{} {}", program, args.join(" "));
        if !in_flatpak() && which::which(program).is_err() {
            return Err(BackendError::Tool {
                command,
                message: format!("{} was not found in PATH", program),
            }
            .into());
        }

        let output = host_command(program, args)
            .output()
            .await
            .map_err(|e| BackendError::Tool {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(BackendError::Tool {
                command,
                message: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }
        Ok(output.stdout)
    }
}

/// A CLI that prints JSON when invoked with `base_args` before the subcommand.
#[derive(Clone)]
pub struct JsonTool {
    runner: Arc<dyn ToolRunner>,
    program: &'static str,
    base_args: &'static [&'static str],
}

impl JsonTool {
    pub fn new(runner: Arc<dyn ToolRunner>, program: &'static str, base_args: &'static [&'static str]) -> Self {
        Self {
            runner,
            program,
            base_args,
        }
    }

    pub fn hyprctl(runner: Arc<dyn ToolRunner>) -> Self {
        Self::new(runner, "hyprctl", &["-j"])
    }

    pub fn niri(runner: Arc<dyn ToolRunner>) -> Self {
        Self::new(runner, "niri", &["msg", "-j"])
    }

    pub async fn query(&self, subcommand: &str) -> Result<serde_json::Value> {
        let mut args: Vec<&str> = self.base_args.to_vec();
        args.push(subcommand);
        let stdout = self.runner.run(self.program, &args).await?;

        serde_json::from_slice(&stdout).map_err(|e| {
            BackendError::Tool {
                command: format!("{} {}", self.program, args.join(" ")),
                message: format!("invalid JSON: {}", e),
            }
            .into()
        })
    }

    pub async fn query_as<T: DeserializeOwned>(&self, subcommand: &str) -> Result<T> {
        let value = self.query(subcommand).await?;
        serde_json::from_value(value).map_err(|e| {
            BackendError::Tool {
                command: format!("{} {}", self.program, subcommand),
                message: format!("unexpected output: {}", e),
            }
            .into()
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HyprWindow {
    title: String,
    class: String,
    initial_title: String,
    initial_class: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HyprCursor {
    x: i32,
    y: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HyprWorkspace {
    #[serde(rename = "monitorID")]
    monitor_id: i64,
}

#[derive(Debug, Deserialize)]
struct HyprMonitor {
    id: i64,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    #[serde(default = "default_scale")]
    scale: f64,
    // left, top, right, bottom
    #[serde(default)]
    reserved: [i32; 4],
}

fn default_scale() -> f64 {
    1.0
}

fn first_non_empty(preferred: String, fallback: String) -> String {
    if preferred.is_empty() { fallback } else { preferred }
}

impl HyprMonitor {
    fn work_area(&self) -> Rect {
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        let [left, top, right, bottom] = self.reserved;
        Rect {
            x: self.x + left,
            y: self.y + top,
            width: (f64::from(self.width) / scale).round() as i32 - left - right,
            height: (f64::from(self.height) / scale).round() as i32 - top - bottom,
        }
    }
}

/// Window, pointer and work area from `hyprctl`.
pub async fn hyprland_wm_info(hyprctl: &JsonTool) -> Result<WmInfo> {
    let (window, cursor, workspace, monitors) = tokio::try_join!(
        hyprctl.query_as::<HyprWindow>("activewindow"),
        hyprctl.query_as::<HyprCursor>("cursorpos"),
        hyprctl.query_as::<HyprWorkspace>("activeworkspace"),
        hyprctl.query_as::<Vec<HyprMonitor>>("monitors"),
    )?;

    let work_area = monitors
        .iter()
        .find(|m| m.id == workspace.monitor_id)
        .map(HyprMonitor::work_area);
    if work_area.is_none() {
        tracing::warn!("No Hyprland monitor with id {}", workspace.monitor_id);
    }

    Ok(WmInfo {
        window_name: first_non_empty(window.initial_title, window.title),
        app_name: first_non_empty(window.initial_class, window.class),
        pointer_x: cursor.x,
        pointer_y: cursor.y,
        work_area,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NiriWindow {
    pub title: Option<String>,
    pub app_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NiriLogical {
    x: i32,
    y: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NiriOutput {
    logical: Option<NiriLogical>,
}

/// The focused window; niri prints `null` when nothing has focus.
pub async fn niri_focused_window(niri: &JsonTool) -> Result<NiriWindow> {
    Ok(niri
        .query_as::<Option<NiriWindow>>("focused-window")
        .await?
        .unwrap_or_default())
}

/// Logical origin of the focused output.
pub async fn niri_output_origin(niri: &JsonTool) -> Result<(i32, i32)> {
    let output = niri.query_as::<Option<NiriOutput>>("focused-output").await?;
    Ok(output
        .and_then(|o| o.logical)
        .map(|l| (l.x, l.y))
        .unwrap_or_default())
}
