// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use scraped_app::{MessageId, Reply, Request};
use scraped_gateway::Client;
use scraped_tui::InternalEvent;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, info};
use url::Url;

const INTERRUPTED_REQUEST: &str = "Requête interrompue.";

pub struct GatewayRuntime {
    client: Client,
    export_dir: PathBuf,
}

impl GatewayRuntime {
    pub fn new(client: Client, export_dir: PathBuf) -> Self {
        Self { client, export_dir }
    }
}

impl scraped_tui::AppRuntime for GatewayRuntime {
    fn search(&mut self, query: &str) -> Result<Reply> {
        Ok(self.client.search(query)?)
    }

    fn activate(&mut self, message_id: MessageId, label: &str) -> Result<Reply> {
        Ok(self.client.activate(message_id, label)?)
    }

    fn save_export(&mut self, file_name: &str, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.export_dir)
            .with_context(|| format!("create export directory {}", self.export_dir.display()))?;
        let path = self.export_dir.join(file_name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url).with_context(|| format!("invalid link {url:?}"))?;
        if !matches!(parsed.scheme(), "http" | "https" | "tg") {
            bail!("refusing to open {:?} link", parsed.scheme());
        }
        info!(url = parsed.as_str(), "opening external link");
        opener_command(parsed.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("launch system link opener")?;
        Ok(())
    }

    /// Runs the request on a worker thread. A panicking worker still reports
    /// a failed completion.
    fn spawn_request(&mut self, request: Request, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        let kind = request.kind();
        thread::Builder::new()
            .name(format!("scraped-{}", kind.label()))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &request {
                    Request::Search { query } => client.search(query),
                    Request::Activate { message_id, label } => {
                        client.activate(*message_id, label)
                    }
                }));
                let result = match outcome {
                    Ok(result) => result.map_err(|error| error.message()),
                    Err(_) => Err(INTERRUPTED_REQUEST.to_owned()),
                };
                debug!(kind = kind.label(), ok = result.is_ok(), "request finished");
                let _ = tx.send(InternalEvent::RequestFinished { kind, result });
            })
            .map(|_| ())
            .map_err(|error| anyhow!("start request worker: {error}"))
    }
}

fn opener_command(url: &str) -> Command {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}
