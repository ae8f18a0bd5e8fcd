//! Scripted in-process [`JobBackend`] for state machine and poller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use vidfetch_core::{FileResponse, FormatDescriptor, JobBackend, RemoteError, VideoInfo};

/// A fault the fake can be told to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// HTTP 401.
    Auth,
    /// HTTP 400.
    BadUrl,
    /// Non-success status with a message.
    Status(u16),
    /// Transport timeout.
    Transport,
}

impl Fault {
    fn into_error(self, endpoint: &str) -> RemoteError {
        match self {
            Self::Auth => RemoteError::auth_required(endpoint, "Cookies expired"),
            Self::BadUrl => RemoteError::InvalidUrl {
                url: "bad".to_string(),
                message: "Missing URL".to_string(),
            },
            Self::Status(status) => RemoteError::unavailable(endpoint, status, "backend failure"),
            Self::Transport => RemoteError::Timeout {
                endpoint: endpoint.to_string(),
            },
        }
    }
}

/// One scripted answer of the file endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileReply {
    /// Answer `status` with a body of `len` bytes.
    Status(u16, usize),
    /// Fail at the transport level.
    Transport,
}

pub struct FakeBackend {
    info: Mutex<Result<VideoInfo, Fault>>,
    info_by_url: Mutex<HashMap<String, (Duration, Result<VideoInfo, Fault>)>>,
    submit: Mutex<Result<String, Fault>>,
    submit_gate: Mutex<Option<Arc<Notify>>>,
    files: Mutex<VecDeque<FileReply>>,
    file_default: Mutex<FileReply>,
    file_delay: Mutex<Duration>,
    progress: AtomicU8,
    progress_script: Mutex<VecDeque<u8>>,
    has_cookies: Mutex<Result<bool, Fault>>,
    upload: Mutex<Result<(), Fault>>,
    test_cookies: Mutex<Result<String, Fault>>,
    cancel_result: Mutex<Result<(), Fault>>,

    pub info_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub file_calls: AtomicUsize,
    pub progress_calls: AtomicUsize,
    pub cancelled: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<String>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            info: Mutex::new(Ok(song_info())),
            info_by_url: Mutex::new(HashMap::new()),
            submit: Mutex::new(Ok("J1".to_string())),
            submit_gate: Mutex::new(None),
            files: Mutex::new(VecDeque::new()),
            file_default: Mutex::new(FileReply::Status(202, 0)),
            file_delay: Mutex::new(Duration::ZERO),
            progress: AtomicU8::new(0),
            progress_script: Mutex::new(VecDeque::new()),
            has_cookies: Mutex::new(Ok(true)),
            upload: Mutex::new(Ok(())),
            test_cookies: Mutex::new(Ok("Restricted Song".to_string())),
            cancel_result: Mutex::new(Ok(())),
            info_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            file_calls: AtomicUsize::new(0),
            progress_calls: AtomicUsize::new(0),
            cancelled: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_info(&self, info: Result<VideoInfo, Fault>) {
        *self.info.lock().unwrap() = info;
    }

    /// Answers lookups of `url` with `info` after `delay`.
    pub fn script_info(&self, url: &str, delay: Duration, info: Result<VideoInfo, Fault>) {
        self.info_by_url
            .lock()
            .unwrap()
            .insert(url.to_string(), (delay, info));
    }

    pub fn set_submit(&self, result: Result<&str, Fault>) {
        *self.submit.lock().unwrap() = result.map(str::to_string);
    }

    /// Holds every submission until the returned gate is notified.
    pub fn gate_submit(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.submit_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Queues file answers; once drained, `default` repeats.
    pub fn script_files(&self, replies: impl IntoIterator<Item = FileReply>, default: FileReply) {
        self.files.lock().unwrap().extend(replies);
        *self.file_default.lock().unwrap() = default;
    }

    pub fn set_file_delay(&self, delay: Duration) {
        *self.file_delay.lock().unwrap() = delay;
    }

    pub fn set_progress(&self, progress: u8) {
        self.progress.store(progress, Ordering::SeqCst);
    }

    /// Queues progress answers; once drained, the last one repeats.
    pub fn script_progress(&self, values: impl IntoIterator<Item = u8>) {
        self.progress_script.lock().unwrap().extend(values);
    }

    pub fn set_has_cookies(&self, result: Result<bool, Fault>) {
        *self.has_cookies.lock().unwrap() = result;
    }

    pub fn set_upload(&self, result: Result<(), Fault>) {
        *self.upload.lock().unwrap() = result;
    }

    pub fn set_test_cookies(&self, result: Result<&str, Fault>) {
        *self.test_cookies.lock().unwrap() = result.map(str::to_string);
    }

    pub fn set_cancel_result(&self, result: Result<(), Fault>) {
        *self.cancel_result.lock().unwrap() = result;
    }

    pub fn cancelled_jobs(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn file_calls(&self) -> usize {
        self.file_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn fetch_info(&self, url: &str, _identity: &str) -> Result<VideoInfo, RemoteError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.info_by_url.lock().unwrap().get(url).cloned();
        let info = match scripted {
            Some((delay, info)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                info
            }
            None => self.info.lock().unwrap().clone(),
        };
        info.map_err(|fault| fault.into_error("/api/info"))
    }

    async fn submit_job(
        &self,
        _url: &str,
        _format: &FormatDescriptor,
        _title: &str,
        _identity: &str,
    ) -> Result<String, RemoteError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.submit_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.submit
            .lock()
            .unwrap()
            .clone()
            .map_err(|fault| fault.into_error("/api/download"))
    }

    async fn query_progress(&self, _job_id: &str) -> u8 {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.progress_script.lock().unwrap().pop_front() {
            self.progress.store(next, Ordering::SeqCst);
        }
        self.progress.load(Ordering::SeqCst)
    }

    async fn fetch_file(&self, _job_id: &str) -> Result<FileResponse, RemoteError> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.file_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let reply = {
            let mut queue = self.files.lock().unwrap();
            queue
                .pop_front()
                .unwrap_or(*self.file_default.lock().unwrap())
        };
        match reply {
            FileReply::Status(status, len) => Ok(FileResponse::new(
                status,
                Some("video/mp4".to_string()),
                vec![0u8; len],
            )),
            FileReply::Transport => Err(Fault::Transport.into_error("/api/download-file")),
        }
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), RemoteError> {
        self.cancelled.lock().unwrap().push(job_id.to_string());
        self.cancel_result
            .lock()
            .unwrap()
            .clone()
            .map_err(|fault| fault.into_error("/api/cancel"))
    }

    async fn has_credentials(&self, _identity: &str) -> Result<bool, RemoteError> {
        self.has_cookies
            .lock()
            .unwrap()
            .clone()
            .map_err(|fault| fault.into_error("/api/has-cookies"))
    }

    async fn upload_credentials(&self, _identity: &str, cookies: &str) -> Result<(), RemoteError> {
        self.uploads.lock().unwrap().push(cookies.to_string());
        self.upload.lock().unwrap().clone().map_err(|fault| match fault {
            Fault::Status(status) => RemoteError::UploadRejected {
                status,
                message: "No cookies received".to_string(),
            },
            other => other.into_error("/api/upload-cookies"),
        })
    }

    async fn test_credentials(&self, _identity: &str, _test_url: &str) -> Result<String, RemoteError> {
        self.test_cookies
            .lock()
            .unwrap()
            .clone()
            .map_err(|fault| fault.into_error("/api/test-cookies"))
    }
}

pub fn format(id: &str, ext: &str, audio_only: bool, resolution: Option<u32>) -> FormatDescriptor {
    FormatDescriptor {
        format_id: id.to_string(),
        ext: Some(ext.to_string()),
        audio_only,
        resolution,
        bitrate: None,
        size_mb: Some(10.5),
        requires_merge: false,
        vcodec: None,
        acodec: None,
    }
}

/// `Song`, 125 s, one 720p MP4 (`f1`) and one MP3 (`a1`).
pub fn song_info() -> VideoInfo {
    VideoInfo {
        title: "Song".to_string(),
        thumbnail: None,
        duration: Some(125),
        formats: vec![format("f1", "mp4", false, Some(720)), format("a1", "mp3", true, None)],
    }
}
