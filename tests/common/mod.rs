#![allow(dead_code)]

use std::{
    collections::HashMap,
    env,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use hub_native_host::{Bridge, HostError, Response, Supervisor, WorkerOutcome};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Env guard that restores previous env vars on drop.
pub struct EnvGuard {
    old: HashMap<String, Option<String>>,
}

impl EnvGuard {
    pub fn set(vars: &[(&str, String)]) -> Self {
        let mut old = HashMap::new();
        for (k, v) in vars {
            old.insert((*k).to_string(), env::var(k).ok());
            env::set_var(k, v);
        }
        Self { old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (k, prev) in self.old.drain() {
            match prev {
                Some(v) => env::set_var(k, v),
                None => env::remove_var(k),
            }
        }
    }
}

/// Frame an arbitrary payload without going through serde.
pub fn raw_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

pub fn frame(value: &Value) -> Vec<u8> {
    raw_frame(&serde_json::to_vec(value).unwrap())
}

pub fn preview(package: &str) -> Vec<u8> {
    frame(&serde_json::json!({ "action": "preview", "packageName": package }))
}

/// Supervisor double: records every package it is asked to run.
pub struct RecordingSupervisor {
    calls: Mutex<Vec<String>>,
    outcome: Box<dyn Fn(&str) -> WorkerOutcome + Send + Sync>,
}

impl RecordingSupervisor {
    pub fn new(outcome: impl Fn(&str) -> WorkerOutcome + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            outcome: Box::new(outcome),
        })
    }

    /// Echoes `out:<package>` on stdout.
    pub fn echo() -> Arc<Self> {
        Self::new(|pkg| WorkerOutcome::Completed {
            stdout: format!("out:{pkg}"),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Supervisor for RecordingSupervisor {
    async fn run(&self, package_name: &str) -> WorkerOutcome {
        self.calls.lock().unwrap().push(package_name.to_owned());
        (self.outcome)(package_name)
    }
}

/// Supervisor double whose `slow` package waits until released.
pub struct GatedSupervisor {
    pub gate: Notify,
}

impl GatedSupervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Notify::new(),
        })
    }
}

#[async_trait]
impl Supervisor for GatedSupervisor {
    async fn run(&self, package_name: &str) -> WorkerOutcome {
        if package_name == "slow" {
            self.gate.notified().await;
        }
        WorkerOutcome::Completed {
            stdout: package_name.to_owned(),
        }
    }
}

/// Supervisor double that panics on `boom` and echoes everything else.
pub struct PanickingSupervisor;

#[async_trait]
impl Supervisor for PanickingSupervisor {
    async fn run(&self, package_name: &str) -> WorkerOutcome {
        if package_name == "boom" {
            panic!("supervisor blew up on {package_name}");
        }
        WorkerOutcome::Completed {
            stdout: format!("out:{package_name}"),
        }
    }
}

/// A bridge wired to in-memory pipes.
pub struct Harness {
    pub to_host: DuplexStream,
    pub from_host: DuplexStream,
    pub task: JoinHandle<Result<(), HostError>>,
}

impl Harness {
    pub fn spawn(bridge: Bridge) -> Self {
        let (to_host, host_in) = tokio::io::duplex(64 * 1024);
        let (host_out, from_host) = tokio::io::duplex(4 * 1024 * 1024);
        let task = tokio::spawn(async move { bridge.run(host_in, host_out).await });
        Self {
            to_host,
            from_host,
            task,
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.to_host.write_all(bytes).await.unwrap();
        self.to_host.flush().await.unwrap();
    }

    pub async fn recv(&mut self) -> Response {
        read_response(&mut self.from_host).await
    }

    /// Close stdin and wait for the bridge to finish.
    pub async fn finish(self) -> (Result<(), HostError>, DuplexStream) {
        let Harness {
            to_host,
            from_host,
            task,
        } = self;
        drop(to_host);
        (task.await.unwrap(), from_host)
    }
}

pub async fn read_response(reader: &mut DuplexStream) -> Response {
    let mut len = [0u8; 4];
    reader.read_exact(&mut len).await.unwrap();
    let mut body = vec![0u8; u32::from_le_bytes(len) as usize];
    reader.read_exact(&mut body).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}
