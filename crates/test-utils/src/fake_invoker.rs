use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use batchrun::exec::{BatchInvoker, InvocationError, InvocationRequest};

/// When a scripted invocation should fail.
#[derive(Debug, Clone)]
pub enum FailWhen {
    /// Batches with more images than this fail.
    LargerThan(usize),
    /// Any batch containing this image file name fails.
    Contains(String),
    /// Every invocation of this command fails.
    Command(String),
}

impl FailWhen {
    fn matches(&self, request: &InvocationRequest) -> bool {
        match self {
            FailWhen::LargerThan(n) => request.images.len() > *n,
            FailWhen::Contains(name) => request
                .images
                .iter()
                .any(|p| p.file_name().and_then(|f| f.to_str()) == Some(name.as_str())),
            FailWhen::Command(command) => request.command == *command,
        }
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub command: String,
    pub program: PathBuf,
    pub flags: Vec<String>,
    pub images: Vec<String>,
    pub working_dir: PathBuf,
}

/// A scripted invoker that:
/// - records every call
/// - fails calls matching any [`FailWhen`] rule with a non-zero exit
/// - otherwise prints one well-formed result line per image, with the value
///   `<command>:<image stem>`.
#[derive(Debug, Clone, Default)]
pub struct FakeInvoker {
    rules: Vec<FailWhen>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(mut self, rule: FailWhen) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Value the fake reports for `image` under `command`.
    pub fn value_for(command: &str, image: &str) -> String {
        format!("{command}:{}", stem(image))
    }
}

fn stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or_default()
        .to_string()
}

impl BatchInvoker for FakeInvoker {
    fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, InvocationError>> + Send + '_>> {
        Box::pin(async move {
            let images: Vec<String> = request.images.iter().map(|p| file_name(p)).collect();
            {
                let mut guard = self.calls.lock().unwrap();
                guard.push(Call {
                    command: request.command.clone(),
                    program: request.program.clone(),
                    flags: request.flags.clone(),
                    images: images.clone(),
                    working_dir: request.working_dir.clone(),
                });
            }

            if self.rules.iter().any(|rule| rule.matches(&request)) {
                return Err(InvocationError::NonZeroExit {
                    code: Some(1),
                    stderr: "scripted failure".to_string(),
                });
            }

            tokio::task::yield_now().await;

            Ok(request
                .images
                .iter()
                .zip(&images)
                .map(|(path, name)| {
                    format!(
                        "Processing: {} - Result: {}*",
                        path.display(),
                        FakeInvoker::value_for(&request.command, name)
                    )
                })
                .collect())
        })
    }
}
