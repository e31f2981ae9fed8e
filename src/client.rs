//! The client as seen by the rest of an application.
//!
//! [NfsClient] owns a thread running a single-threaded tokio runtime. The
//! UDP transport and every download live on that thread; callers on other
//! threads only submit jobs through the command queue and receive results
//! over one-shot channels.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::command_queue::{CommandQueue, CompletionCallback, DownloadJob, JobProcessor};
use crate::config::ClientConfig;
use crate::download::{self, DownloadRequest, Downloaded};
use crate::error::{Error, Result};
use crate::udp::RpcUdpTransport;

/// Looks up the address of a player by its number.
pub trait PlayerDirectory: Send + Sync {
    fn player_address(&self, player: u8) -> Option<IpAddr>;
}

impl PlayerDirectory for HashMap<u8, IpAddr> {
    fn player_address(&self, player: u8) -> Option<IpAddr> {
        self.get(&player).copied()
    }
}

/// Kind of a metadata request answered by a player's database server.
/// Only mount info replies point at a file that can be downloaded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataRequest {
    Metadata,
    Artwork,
    Waveform,
    PreviewWaveform,
    ColorWaveform,
    ColorPreviewWaveform,
    BeatGrid,
    MountInfo,
}

/// Mount info of a track as reported by a player.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MountInfo {
    /// Path of the track file below the slot's export
    pub mount_path: Option<String>,
}

/// Pending result of a download.
pub struct DownloadHandle {
    receiver: mpsc::Receiver<Result<Downloaded>>,
}

impl DownloadHandle {
    fn failed(error: Error) -> Self {
        let (sender, receiver) = mpsc::channel();
        // the receiver is alive, so this cannot fail
        let _ = sender.send(Err(error));
        DownloadHandle { receiver }
    }

    /// Blocks until the download finished or `timeout` passed.
    pub fn wait(self, timeout: Duration) -> Result<Downloaded> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::Stopped),
        }
    }

    /// Returns the result if the download already finished.
    ///
    /// The result is handed out once; later calls report [Error::Stopped].
    pub fn try_result(&self) -> Option<Result<Downloaded>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(Error::Stopped)),
        }
    }
}

impl fmt::Debug for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadHandle").finish_non_exhaustive()
    }
}

/// The event loop thread and the queue feeding it.
struct EventLoop {
    queue: CommandQueue,
    local_addr: SocketAddr,
    thread: thread::JoinHandle<()>,
}

/// Downloads files from players over NFS.
pub struct NfsClient {
    config: Arc<ClientConfig>,
    players: Option<Arc<dyn PlayerDirectory>>,
    event_loop: Mutex<Option<EventLoop>>,
}

impl NfsClient {
    pub fn new(config: ClientConfig) -> Self {
        NfsClient { config: Arc::new(config), players: None, event_loop: Mutex::new(None) }
    }

    /// Sets where [NfsClient::enqueue_download_from_mount_info] finds
    /// player addresses.
    pub fn with_players(mut self, players: Arc<dyn PlayerDirectory>) -> Self {
        self.players = Some(players);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts the event loop thread and binds the socket. Starting a running
    /// client does nothing.
    pub fn start(&self) -> Result<()> {
        let mut event_loop = self.event_loop.lock().unwrap_or_else(|e| e.into_inner());
        if event_loop.is_some() {
            return Ok(());
        }

        let (ready_sender, ready) = mpsc::channel();
        let config = self.config.clone();
        let thread = thread::Builder::new()
            .name("nfs-client".to_owned())
            .spawn(move || run_event_loop(config, ready_sender))?;

        match ready.recv() {
            Ok(Ok((queue, local_addr))) => {
                info!("NFS client started on {}", local_addr);
                *event_loop = Some(EventLoop { queue, local_addr, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::Stopped)
            }
        }
    }

    /// Closes the queue, stops the transport and joins the loop thread.
    /// Downloads still running end with [Error::Stopped].
    ///
    /// Called from a completion callback, the loop is told to finish once
    /// the callback returns and the thread is not joined.
    pub fn stop(&self) {
        let event_loop = self.event_loop.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(EventLoop { queue, thread, .. }) = event_loop {
            drop(queue);
            if thread.thread().id() == thread::current().id() {
                debug!("NFS client stopping from its own event loop");
                return;
            }
            if thread.join().is_err() {
                error!("NFS client event loop panicked");
            }
            info!("NFS client stopped");
        }
    }

    /// Local address of the client's socket while it is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        let event_loop = self.event_loop.lock().unwrap_or_else(|e| e.into_inner());
        event_loop.as_ref().map(|event_loop| event_loop.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.local_addr().is_some()
    }

    fn submit(&self, job: DownloadJob) -> std::result::Result<(), DownloadJob> {
        let event_loop = self.event_loop.lock().unwrap_or_else(|e| e.into_inner());
        match event_loop.as_ref() {
            Some(event_loop) => event_loop.queue.submit(job),
            None => Err(job),
        }
    }

    fn enqueue(
        &self,
        request: DownloadRequest,
        callback: Option<CompletionCallback>,
    ) -> DownloadHandle {
        debug!("enqueueing download of {}", request);
        let (reply, receiver) = mpsc::channel();
        let job = DownloadJob { request, callback, reply: Some(reply) };
        match self.submit(job) {
            Ok(()) => DownloadHandle { receiver },
            Err(job) => {
                debug!("client not running, rejecting {}", job.request);
                DownloadHandle::failed(Error::Stopped)
            }
        }
    }

    /// Starts a download and returns immediately.
    pub fn enqueue_download(&self, request: DownloadRequest) -> DownloadHandle {
        self.enqueue(request, None)
    }

    /// Runs a download and waits up to the configured sync timeout for it.
    pub fn enqueue_download_sync(&self, request: DownloadRequest) -> Result<Downloaded> {
        self.enqueue_download(request).wait(self.config.sync_timeout)
    }

    /// Starts a download whose outcome is passed to `callback` on the loop
    /// thread. The returned handle gets the same outcome after the callback
    /// has run.
    ///
    /// If the client is not running the callback is dropped without being
    /// called and [Error::Stopped] is returned.
    pub fn enqueue_download_with_callback<F>(
        &self,
        request: DownloadRequest,
        callback: F,
    ) -> Result<DownloadHandle>
    where
        F: FnOnce(&Result<Downloaded>) + Send + 'static,
    {
        debug!("enqueueing download of {} with callback", request);
        let (reply, receiver) = mpsc::channel();
        let job = DownloadJob { request, callback: Some(Box::new(callback)), reply: Some(reply) };
        match self.submit(job) {
            Ok(()) => Ok(DownloadHandle { receiver }),
            Err(_) => Err(Error::Stopped),
        }
    }

    /// Downloads `remote_path` into memory and waits for it.
    ///
    /// Any failure, including the timeout, is logged as a single warning and
    /// turned into `None`.
    pub fn enqueue_buffer_download(
        &self,
        address: IpAddr,
        slot: &str,
        remote_path: &str,
    ) -> Option<Vec<u8>> {
        let request = DownloadRequest::to_buffer(address, slot, remote_path);
        match self.enqueue_download_sync(request) {
            Ok(Downloaded::Buffer(data)) => Some(data),
            Ok(Downloaded::File { path, .. }) => {
                warn!("returning no buffer, {} was written to {}", remote_path, path.display());
                None
            }
            Err(e) => {
                warn!("returning no buffer for {}:{}:{}: {}", address, slot, remote_path, e);
                None
            }
        }
    }

    /// Downloads the track a mount info reply points at into the download
    /// directory, naming the file after the last component of its path.
    ///
    /// Meant to be called with the replies of a metadata provider. Replies of
    /// other kinds, mount infos without a path and unknown players are logged
    /// as errors and yield `None`.
    pub fn enqueue_download_from_mount_info(
        &self,
        request: DataRequest,
        player: u8,
        slot: &str,
        id_list: &[u32],
        mount_info: &MountInfo,
    ) -> Option<DownloadHandle> {
        let mount_path = match (request, mount_info.mount_path.as_deref()) {
            (DataRequest::MountInfo, Some(mount_path)) => mount_path,
            _ => {
                error!("not enqueueing {:?} request without mount path", request);
                return None;
            }
        };
        let Some(address) = self.players.as_ref().and_then(|p| p.player_address(player)) else {
            error!("player {} unknown", player);
            return None;
        };
        let destination = match download_destination(&self.config.download_directory, mount_path)
        {
            Ok(destination) => destination,
            Err(e) => {
                error!("not enqueueing mount info download: {}", e);
                return None;
            }
        };
        debug!("mount info of player {} slot {} ids {:?}: {}", player, slot, id_list, mount_path);
        let request = DownloadRequest::to_file(address, slot, mount_path, destination);
        Some(self.enqueue(request, Some(Box::new(log_download_outcome))))
    }
}

impl Drop for NfsClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Local file a remote path is saved to: its last component inside `dir`.
pub fn download_destination(dir: &Path, remote_path: &str) -> Result<PathBuf> {
    remote_path
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(|name| dir.join(name))
        .ok_or_else(|| Error::InvalidPath(PathBuf::from(remote_path)))
}

/// Completion callback that only logs the outcome of a download.
pub fn log_download_outcome(result: &Result<Downloaded>) {
    match result {
        Ok(Downloaded::File { path, size }) => {
            info!("downloaded {} bytes to {}", size, path.display())
        }
        Ok(Downloaded::Buffer(data)) => info!("downloaded {} bytes", data.len()),
        Err(e) => error!("download failed: {}", e),
    }
}

type Ready = Result<(CommandQueue, SocketAddr)>;

/// Body of the event loop thread.
fn run_event_loop(config: Arc<ClientConfig>, ready: mpsc::Sender<Ready>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(Error::Transport(e)));
            return;
        }
    };

    runtime.block_on(async move {
        let transport = match RpcUdpTransport::bind(
            config.bind_address,
            config.auth_stamp,
            config.call_timeout,
        )
        .await
        {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let local_addr = match transport.local_addr() {
            Ok(local_addr) => local_addr,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        let processor: JobProcessor = {
            let transport = transport.clone();
            let config = config.clone();
            Arc::new(move |request: DownloadRequest| {
                let transport = transport.clone();
                let config = config.clone();
                async move { download::download(transport.as_ref(), &config, &request).await }
                    .boxed()
            })
        };
        let (queue, worker) = CommandQueue::new(processor);
        if ready.send(Ok((queue, local_addr))).is_err() {
            return;
        }
        if let Err(e) = worker.await {
            error!("command queue worker failed: {}", e);
        }
        transport.stop();
    });
    // dropping the runtime cancels downloads that are still running
    drop(runtime);
    debug!("NFS client event loop finished");
}
