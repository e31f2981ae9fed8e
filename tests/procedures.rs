use std::net::{IpAddr, Ipv4Addr, SocketAddr};

mod support;

use prodj_nfs::protocol::nfs::mount::{mountproc_mnt, mountproc_umnt};
use prodj_nfs::protocol::nfs::portmap::pmapproc_getport;
use prodj_nfs::protocol::nfs::v2::{nfsproc_lookup, nfsproc_lookup_path, nfsproc_read};
use prodj_nfs::protocol::rpc::Procedure;
use prodj_nfs::xdr::nfs2::{self, ftype, nfsstat};
use prodj_nfs::xdr::{mount, portmap};
use prodj_nfs::Error;

use support::{file_contents, FakePlayer, MOUNT_PORT, NFS_PORT};

const PLAYER: IpAddr = IpAddr::V4(Ipv4Addr::new(169, 254, 0, 3));
const EXPORT_PATH: &str = "PIONEER/rekordbox/export.pdb";

fn address(port: u32) -> SocketAddr {
    SocketAddr::new(PLAYER, port as u16)
}

fn player_with_database() -> FakePlayer {
    FakePlayer::default().with_export("/B/").with_file("/B/", EXPORT_PATH, file_contents(3000))
}

#[tokio::test]
async fn getport_finds_mount_and_nfs() {
    let player = FakePlayer::default();

    let mount_port = pmapproc_getport(
        &player,
        PLAYER,
        portmap::PORT,
        mount::PROGRAM,
        mount::VERSION,
        portmap::IPPROTO_UDP,
    )
    .await
    .expect("mount port");
    let nfs_port = pmapproc_getport(
        &player,
        PLAYER,
        portmap::PORT,
        nfs2::PROGRAM,
        nfs2::VERSION,
        portmap::IPPROTO_UDP,
    )
    .await
    .expect("nfs port");

    assert_eq!(u32::from(mount_port), MOUNT_PORT);
    assert_eq!(u32::from(nfs_port), NFS_PORT);
    let calls = player.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| call.address == SocketAddr::new(PLAYER, 111)));
}

#[tokio::test]
async fn unregistered_program_is_unavailable() {
    let player = FakePlayer::new(MOUNT_PORT, 0);

    let result = pmapproc_getport(
        &player,
        PLAYER,
        portmap::PORT,
        nfs2::PROGRAM,
        nfs2::VERSION,
        portmap::IPPROTO_UDP,
    )
    .await;
    match result {
        Err(Error::ServiceUnavailable { program, version }) => {
            assert_eq!((program, version), (nfs2::PROGRAM, nfs2::VERSION));
        }
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn mount_returns_the_export_root() {
    let player = player_with_database();
    let root = mountproc_mnt(&player, address(MOUNT_PORT), "/B/").await.expect("mount");

    let res = nfsproc_lookup(&player, address(NFS_PORT), root, "PIONEER").await.expect("lookup");
    assert_eq!(res.attributes.ftype, ftype::NFDIR);

    mountproc_umnt(&player, address(MOUNT_PORT), "/B/").await.expect("umnt");
    assert_eq!(
        player.procedures(),
        [Procedure::MountMnt, Procedure::NfsLookup, Procedure::MountUmnt]
    );
}

#[tokio::test]
async fn rejected_mount_reports_the_status() {
    let player = player_with_database();

    match mountproc_mnt(&player, address(MOUNT_PORT), "/C/").await {
        Err(Error::MountRejected { code }) => assert_eq!(code, 2),
        other => panic!("expected MountRejected, got {other:?}"),
    }

    player.fail_mounts(13);
    match mountproc_mnt(&player, address(MOUNT_PORT), "/B/").await {
        Err(Error::MountRejected { code }) => assert_eq!(code, 13),
        other => panic!("expected MountRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn lookup_path_walks_every_component() {
    let player = player_with_database();
    let root = mountproc_mnt(&player, address(MOUNT_PORT), "/B/").await.expect("mount");

    let path = "/PIONEER//rekordbox/export.pdb";
    let res =
        nfsproc_lookup_path(&player, address(NFS_PORT), root, path).await.expect("lookup path");
    assert_eq!(res.attributes.ftype, ftype::NFREG);
    assert_eq!(res.attributes.size, 3000);
    let lookups = player.procedures().iter().filter(|p| **p == Procedure::NfsLookup).count();
    assert_eq!(lookups, 3);
}

#[tokio::test]
async fn missing_component_is_not_found() {
    let player = player_with_database();
    let root = mountproc_mnt(&player, address(MOUNT_PORT), "/B/").await.expect("mount");

    match nfsproc_lookup_path(&player, address(NFS_PORT), root, "PIONEER/USBANLZ/ANLZ0000.DAT")
        .await
    {
        Err(Error::PathNotFound { component, status }) => {
            assert_eq!(component, "USBANLZ");
            assert_eq!(status, nfsstat::NFSERR_NOENT);
        }
        other => panic!("expected PathNotFound, got {other:?}"),
    }
    // no lookup after the failing one
    assert_eq!(player.procedures().len(), 3);
}

#[tokio::test]
async fn empty_path_is_not_found() {
    let player = player_with_database();
    let root = mountproc_mnt(&player, address(MOUNT_PORT), "/B/").await.expect("mount");

    let result = nfsproc_lookup_path(&player, address(NFS_PORT), root, "//").await;
    assert!(matches!(result, Err(Error::PathNotFound { .. })), "unexpected result: {result:?}");
    assert_eq!(player.procedures(), [Procedure::MountMnt]);
}

#[tokio::test]
async fn read_returns_the_requested_range() {
    let contents = file_contents(3000);
    let player = player_with_database();
    let root = mountproc_mnt(&player, address(MOUNT_PORT), "/B/").await.expect("mount");
    let file = nfsproc_lookup_path(&player, address(NFS_PORT), root, EXPORT_PATH)
        .await
        .expect("lookup path");

    let chunk = nfsproc_read(&player, address(NFS_PORT), file.handle, 1000, 1000)
        .await
        .expect("read");
    assert_eq!(chunk.data, contents[1000..2000]);
    assert!(!chunk.is_eof());

    let last = nfsproc_read(&player, address(NFS_PORT), file.handle, 2500, 1000)
        .await
        .expect("read");
    assert_eq!(last.data, contents[2500..]);
    assert!(last.is_eof());
    assert_eq!(player.reads(), [(1000, 1000), (2500, 1000)]);
}

#[tokio::test]
async fn failed_read_reports_the_status() {
    let player = player_with_database();
    let root = mountproc_mnt(&player, address(MOUNT_PORT), "/B/").await.expect("mount");
    let file = nfsproc_lookup_path(&player, address(NFS_PORT), root, EXPORT_PATH)
        .await
        .expect("lookup path");

    player.fail_reads(nfsstat::NFSERR_IO);
    match nfsproc_read(&player, address(NFS_PORT), file.handle, 0, 1350).await {
        Err(Error::ReadFailed { status }) => assert_eq!(status, nfsstat::NFSERR_IO),
        other => panic!("expected ReadFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn unlisted_status_is_still_a_typed_failure() {
    let player = player_with_database();
    let root = mountproc_mnt(&player, address(MOUNT_PORT), "/B/").await.expect("mount");
    let file = nfsproc_lookup_path(&player, address(NFS_PORT), root, EXPORT_PATH)
        .await
        .expect("lookup path");

    player.fail_lookups(nfsstat(10001));
    match nfsproc_lookup(&player, address(NFS_PORT), root, "PIONEER").await {
        Err(Error::PathNotFound { component, status }) => {
            assert_eq!(component, "PIONEER");
            assert_eq!(status, nfsstat(10001));
        }
        other => panic!("expected PathNotFound, got {other:?}"),
    }

    player.fail_reads(nfsstat(10001));
    match nfsproc_read(&player, address(NFS_PORT), file.handle, 0, 1350).await {
        Err(Error::ReadFailed { status }) => assert_eq!(status, nfsstat(10001)),
        other => panic!("expected ReadFailed, got {other:?}"),
    }
}
