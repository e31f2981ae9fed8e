#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use prodj_nfs::protocol::rpc::{wire, Procedure, RpcCaller};
use prodj_nfs::xdr::mount::{dirpath, fhstatus};
use prodj_nfs::xdr::nfs2::dir::{diropargs, diropokres, diropres};
use prodj_nfs::xdr::nfs2::file::{readargs, readokres, readres};
use prodj_nfs::xdr::nfs2::{self, fattr, fhandle, ftype, nfsstat, timeval};
use prodj_nfs::xdr::portmap::mapping;
use prodj_nfs::xdr::rpc::{make_success_reply, rpc_body, rpc_msg};
use prodj_nfs::xdr::{deserialize, mount, Serialize};
use prodj_nfs::Error;

pub const FILE_MTIME: timeval = timeval { seconds: 1_600_000_000, useconds: 0 };
pub const MOUNT_PORT: u32 = 4_000;
pub const NFS_PORT: u32 = 2_049;

/// One call received by a [FakePlayer].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub address: SocketAddr,
    pub procedure: Procedure,
}

#[derive(Default)]
struct State {
    mount_port: u32,
    nfs_port: u32,
    next_id: u32,
    exports: HashMap<String, fhandle>,
    entries: HashMap<(fhandle, String), (fhandle, fattr)>,
    contents: HashMap<fhandle, Vec<u8>>,
    calls: Vec<RecordedCall>,
    reads: Vec<(u32, u32)>,
    failing_lookups: Option<nfsstat>,
    failing_reads: Option<nfsstat>,
    failing_mounts: Option<u32>,
}

impl State {
    fn new_handle(&mut self) -> fhandle {
        self.next_id += 1;
        let mut handle = [0_u8; nfs2::FHSIZE];
        handle[..4].copy_from_slice(&self.next_id.to_be_bytes());
        fhandle(handle)
    }
}

/// A player's PORTMAP, MOUNT and NFS services answering from memory.
pub struct FakePlayer {
    state: Mutex<State>,
}

impl Default for FakePlayer {
    fn default() -> Self {
        FakePlayer::new(MOUNT_PORT, NFS_PORT)
    }
}

impl FakePlayer {
    pub fn new(mount_port: u32, nfs_port: u32) -> Self {
        let state = State { mount_port, nfs_port, ..State::default() };
        FakePlayer { state: Mutex::new(state) }
    }

    pub fn with_export(self, export: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let handle = state.new_handle();
            state.exports.insert(export.to_owned(), handle);
        }
        self
    }

    /// Adds a file below `export`, creating the directories on the way.
    pub fn with_file(self, export: &str, path: &str, contents: Vec<u8>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let mut dir = *state.exports.get(export).expect("export not added");
            let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
            let (name, parents) = components.split_last().expect("empty path");
            for parent in parents {
                let key = (dir, parent.to_string());
                dir = match state.entries.get(&key) {
                    Some((handle, _)) => *handle,
                    None => {
                        let handle = state.new_handle();
                        let attributes =
                            fattr { ftype: ftype::NFDIR, mode: 0o40755, ..fattr::default() };
                        state.entries.insert(key, (handle, attributes));
                        handle
                    }
                };
            }
            let handle = state.new_handle();
            let attributes = fattr {
                ftype: ftype::NFREG,
                mode: 0o100644,
                nlink: 1,
                size: contents.len() as u32,
                mtime: FILE_MTIME,
                ..fattr::default()
            };
            state.entries.insert((dir, name.to_string()), (handle, attributes));
            state.contents.insert(handle, contents);
        }
        self
    }

    pub fn set_ports(&self, mount_port: u32, nfs_port: u32) {
        let mut state = self.state.lock().unwrap();
        state.mount_port = mount_port;
        state.nfs_port = nfs_port;
    }

    pub fn fail_lookups(&self, status: nfsstat) {
        self.state.lock().unwrap().failing_lookups = Some(status);
    }

    pub fn fail_reads(&self, status: nfsstat) {
        self.state.lock().unwrap().failing_reads = Some(status);
    }

    pub fn fail_mounts(&self, code: u32) {
        self.state.lock().unwrap().failing_mounts = Some(code);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn procedures(&self) -> Vec<Procedure> {
        self.calls().into_iter().map(|call| call.procedure).collect()
    }

    /// `(offset, count)` of every READ, in arrival order.
    pub fn reads(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().reads.clone()
    }

    /// Produces the encoded results of one call.
    pub fn answer(
        &self,
        address: SocketAddr,
        procedure: Procedure,
        args: &[u8],
    ) -> std::io::Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall { address, procedure });
        let mut src = Cursor::new(args);
        let mut results = Vec::new();
        match procedure {
            Procedure::PortmapGetPort => {
                let args = deserialize::<mapping>(&mut src)?;
                let port = match args.prog {
                    mount::PROGRAM => state.mount_port,
                    nfs2::PROGRAM => state.nfs_port,
                    _ => 0,
                };
                port.serialize(&mut results)?;
            }
            Procedure::MountMnt => {
                let path = deserialize::<dirpath>(&mut src)?;
                let status = match (state.failing_mounts, state.exports.get(path.as_str())) {
                    (Some(code), _) => fhstatus::Failed(code),
                    (None, Some(handle)) => fhstatus::Mounted(*handle),
                    (None, None) => fhstatus::Failed(2),
                };
                status.serialize(&mut results)?;
            }
            Procedure::MountUmnt => {
                deserialize::<dirpath>(&mut src)?;
            }
            Procedure::NfsLookup => {
                let args = deserialize::<diropargs>(&mut src)?;
                let entry = state.entries.get(&(args.dir, args.name.0.clone()));
                let res = match (state.failing_lookups, entry) {
                    (Some(status), _) => diropres::Err(status),
                    (None, Some((file, attributes))) => {
                        diropres::Ok(diropokres { file: *file, attributes: *attributes })
                    }
                    (None, None) => diropres::Err(nfsstat::NFSERR_NOENT),
                };
                res.serialize(&mut results)?;
            }
            Procedure::NfsRead => {
                let args = deserialize::<readargs>(&mut src)?;
                state.reads.push((args.offset, args.count));
                let res = match (state.failing_reads, state.contents.get(&args.file)) {
                    (Some(status), _) => readres::Err(status),
                    (None, Some(contents)) => {
                        let start = (args.offset as usize).min(contents.len());
                        let end = (start + args.count as usize).min(contents.len());
                        let attributes = state
                            .entries
                            .values()
                            .find(|(handle, _)| *handle == args.file)
                            .map(|(_, attributes)| *attributes)
                            .unwrap_or_default();
                        readres::Ok(readokres { attributes, data: contents[start..end].to_vec() })
                    }
                    (None, None) => readres::Err(nfsstat::NFSERR_STALE),
                };
                res.serialize(&mut results)?;
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl RpcCaller for FakePlayer {
    async fn call(
        &self,
        address: SocketAddr,
        procedure: Procedure,
        args: Vec<u8>,
    ) -> Result<Vec<u8>, Error> {
        self.answer(address, procedure, &args).map_err(Error::Codec)
    }
}

/// A [FakePlayer] listening on a UDP port of the loopback interface.
///
/// All three services share the one port, so port lookups answer with it.
pub struct FakeDevice {
    pub address: SocketAddr,
    pub player: Arc<FakePlayer>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl FakeDevice {
    pub fn spawn(player: FakePlayer) -> FakeDevice {
        let player = Arc::new(player);
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").expect("bind fake device");
        socket.set_nonblocking(true).expect("set nonblocking");
        let address = socket.local_addr().expect("local address");
        player.set_ports(u32::from(address.port()), u32::from(address.port()));

        let (shutdown, mut stop) = oneshot::channel::<()>();
        let served = player.clone();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("fake device runtime");
            runtime.block_on(async move {
                let socket = tokio::net::UdpSocket::from_std(socket).expect("tokio socket");
                let mut buf = vec![0_u8; wire::MAX_DATAGRAM_SIZE];
                loop {
                    tokio::select! {
                        _ = &mut stop => break,
                        received = socket.recv_from(&mut buf) => {
                            let Ok((len, peer)) = received else { continue };
                            if let Some(reply) = handle_datagram(&served, peer, &buf[..len]) {
                                let _ = socket.send_to(&reply, peer).await;
                            }
                        }
                    }
                }
            });
        });

        FakeDevice { address, player, shutdown: Some(shutdown), thread: Some(thread) }
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn handle_datagram(player: &FakePlayer, peer: SocketAddr, datagram: &[u8]) -> Option<Vec<u8>> {
    let mut src = Cursor::new(datagram);
    let msg = deserialize::<rpc_msg>(&mut src).ok()?;
    let rpc_body::CALL(call) = msg.body else {
        return None;
    };
    let procedure = Procedure::from_call(call.prog, call.vers, call.proc)?;
    let args = &datagram[src.position() as usize..];
    let results = player.answer(peer, procedure, args).ok()?;
    wire::encode_reply(&make_success_reply(msg.xid), &results).ok()
}

/// A UDP port on the loopback interface nobody listens on.
pub fn unused_local_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").expect("bind probe socket");
    socket.local_addr().expect("local address").port()
}

/// Test data that does not repeat within a chunk.
pub fn file_contents(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Counts `WARN` events of the subscriber it is attached to.
#[derive(Clone, Default)]
pub struct WarningCounter(Arc<AtomicUsize>);

impl WarningCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCounter {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
