use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

mod support;

use tokio::net::UdpSocket;

use prodj_nfs::protocol::nfs::portmap::pmapproc_getport;
use prodj_nfs::protocol::rpc::{wire, Procedure, RpcCaller, TransactionTracker};
use prodj_nfs::xdr::rpc::{
    accept_body, accepted_reply, auth_stat, auth_unix, make_success_reply, mismatch_info,
    opaque_auth, rejected_reply, reply_body, rpc_body, rpc_msg,
};
use prodj_nfs::xdr::{self, mount, nfs2, portmap, Serialize};
use prodj_nfs::Error;

use support::{FakeDevice, FakePlayer};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn reply_datagram(xid: u32, body: reply_body, results: &[u8]) -> Vec<u8> {
    let msg = rpc_msg { xid, body: rpc_body::REPLY(body) };
    wire::encode_reply(&msg, results).expect("encode reply")
}

fn accepted(reply_data: accept_body) -> reply_body {
    reply_body::MSG_ACCEPTED(accepted_reply { verf: opaque_auth::default(), reply_data })
}

#[test]
fn procedure_table_matches_the_programs() {
    let expected = [
        (Procedure::PortmapGetPort, portmap::PROGRAM, 2, 3),
        (Procedure::MountMnt, mount::PROGRAM, 1, 1),
        (Procedure::MountUmnt, mount::PROGRAM, 1, 3),
        (Procedure::NfsLookup, nfs2::PROGRAM, 2, 4),
        (Procedure::NfsRead, nfs2::PROGRAM, 2, 6),
    ];
    for (procedure, prog, vers, proc) in expected {
        assert_eq!(procedure.program(), prog);
        assert_eq!(procedure.version(), vers);
        assert_eq!(procedure.number(), proc);
        assert_eq!(Procedure::from_call(prog, vers, proc), Some(procedure));
    }
    assert_eq!(portmap::PROGRAM, 100000);
    assert_eq!(mount::PROGRAM, 100005);
    assert_eq!(nfs2::PROGRAM, 100003);
    assert_eq!(Procedure::from_call(nfs2::PROGRAM, 3, 6), None);
    assert_eq!(Procedure::from_call(nfs2::PROGRAM, 2, 8), None);
}

#[test]
fn call_datagram_layout() {
    let cred = opaque_auth::unix(&auth_unix::with_stamp(0xdeadbeef)).expect("credential");
    let datagram = wire::encode_call(42, Procedure::NfsRead, &cred, &[1, 2, 3]).expect("encode");

    let words: Vec<u32> = datagram
        .chunks(4)
        .map(|word| u32::from_be_bytes(word.try_into().expect("aligned")))
        .collect();
    // xid, CALL, rpcvers, prog, vers, proc
    assert_eq!(words[..6], [42, 0, 2, 100003, 2, 6]);
    // AUTH_UNIX credential of 20 bytes starting with the stamp
    assert_eq!(words[6..9], [1, 20, 0xdeadbeef]);
    // AUTH_NULL verifier after the credential body
    assert_eq!(words[13..15], [0, 0]);
    assert_eq!(datagram[60..], [1, 2, 3, 0]);
}

#[test]
fn split_reply_separates_xid_and_body() {
    let datagram = reply_datagram(7, accepted(accept_body::SUCCESS), &[0, 0, 0, 9]);
    let (xid, body) = wire::split_reply(&datagram).expect("valid").expect("a reply");
    assert_eq!(xid, 7);
    assert_eq!(wire::accepted_results(&body).expect("success"), [0, 0, 0, 9]);
}

#[test]
fn split_reply_ignores_calls_and_rejects_garbage() {
    let cred = opaque_auth::default();
    let call = wire::encode_call(1, Procedure::PortmapGetPort, &cred, &[]).expect("encode");
    assert!(wire::split_reply(&call).expect("valid").is_none());

    assert!(wire::split_reply(&[0, 0, 1]).is_err());
    assert!(wire::split_reply(&[0, 0, 0, 1, 0, 0, 0, 7]).is_err());
}

#[test]
fn unsuccessful_replies_are_rejections() {
    let unsuccessful = [
        accepted(accept_body::PROG_UNAVAIL),
        accepted(accept_body::PROG_MISMATCH(mismatch_info { low: 3, high: 3 })),
        accepted(accept_body::PROC_UNAVAIL),
        accepted(accept_body::GARBAGE_ARGS),
        reply_body::MSG_DENIED(rejected_reply::RPC_MISMATCH(mismatch_info { low: 2, high: 2 })),
        reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(auth_stat::AUTH_BADCRED)),
    ];
    for body in unsuccessful {
        let datagram = reply_datagram(1, body, &[]);
        let (_, reply) = wire::split_reply(&datagram).expect("valid").expect("a reply");
        match wire::accepted_results(&reply) {
            Err(Error::RpcRejected(_)) => {}
            other => panic!("expected a rejection, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn tracker_delivers_each_reply_once() {
    let tracker = TransactionTracker::new();
    let slot = tracker.register(5).expect("free xid");
    assert!(tracker.register(5).is_none());
    assert_eq!(tracker.outstanding(), 1);

    assert!(tracker.deliver(5, vec![1, 2, 3]));
    assert!(!tracker.deliver(5, vec![4, 5, 6]));
    assert_eq!(slot.await.expect("fulfilled"), [1, 2, 3]);
    assert_eq!(tracker.outstanding(), 0);
}

#[test]
fn tracker_ignores_unknown_xids() {
    let tracker = TransactionTracker::new();
    assert!(!tracker.deliver(99, vec![0; 8]));
    assert_eq!(tracker.outstanding(), 0);
}

#[test]
fn tracker_forgets_abandoned_and_dropped_slots() {
    let tracker = TransactionTracker::new();
    let _kept = tracker.register(1).expect("free xid");
    tracker.abandon(1);
    assert_eq!(tracker.outstanding(), 0);

    let dropped = tracker.register(2).expect("free xid");
    drop(dropped);
    assert_eq!(tracker.outstanding(), 0);
    assert!(tracker.register(2).is_some());
}

async fn transport(call_timeout: Duration) -> prodj_nfs::udp::RpcUdpTransport {
    let local = SocketAddr::new(LOCALHOST, 0);
    prodj_nfs::udp::RpcUdpTransport::bind(local, 0xdeadbeef, call_timeout)
        .await
        .expect("bind transport")
}

#[tokio::test]
async fn transport_talks_to_a_device() {
    let device = FakeDevice::spawn(FakePlayer::default());
    let transport = transport(Duration::from_secs(5)).await;

    let port = pmapproc_getport(
        &transport,
        LOCALHOST,
        device.port(),
        nfs2::PROGRAM,
        nfs2::VERSION,
        portmap::IPPROTO_UDP,
    )
    .await
    .expect("getport");
    assert_eq!(port, device.port());
    assert_eq!(transport.outstanding_calls(), 0);
}

#[tokio::test]
async fn unanswered_call_times_out() {
    let silent = UdpSocket::bind((LOCALHOST, 0)).await.expect("bind");
    let address = silent.local_addr().expect("address");
    let transport = transport(Duration::from_millis(200)).await;

    let args = xdr::serialize_to_vec(&portmap::mapping::default()).expect("encode");
    let result = transport.call(address, Procedure::PortmapGetPort, args).await;
    assert!(matches!(result, Err(Error::Timeout)), "unexpected result: {result:?}");
    assert_eq!(transport.outstanding_calls(), 0);
}

#[tokio::test]
async fn stray_datagrams_do_not_disturb_a_call() {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.expect("bind");
    let address = server.local_addr().expect("address");
    tokio::spawn(async move {
        let mut buf = vec![0_u8; wire::MAX_DATAGRAM_SIZE];
        let (len, peer) = server.recv_from(&mut buf).await.expect("receive call");
        assert!(len >= 4);
        let xid = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);

        let mut results = Vec::new();
        1234_u32.serialize(&mut results).expect("encode");
        let stale = wire::encode_reply(&make_success_reply(xid.wrapping_add(1000)), &results)
            .expect("encode");
        let answer = wire::encode_reply(&make_success_reply(xid), &results).expect("encode");
        for datagram in [&[0xff_u8, 0xff, 0xff][..], stale.as_slice(), answer.as_slice()] {
            server.send_to(datagram, peer).await.expect("send");
        }
    });

    let transport = transport(Duration::from_secs(5)).await;
    let args = xdr::serialize_to_vec(&portmap::mapping::default()).expect("encode");
    let results =
        transport.call(address, Procedure::PortmapGetPort, args).await.expect("answered");
    assert_eq!(results, [0, 0, 4, 210]);
}

#[tokio::test]
async fn stopped_transport_no_longer_receives() {
    let device = FakeDevice::spawn(FakePlayer::default());
    let transport = transport(Duration::from_millis(300)).await;
    transport.stop();

    let args = xdr::serialize_to_vec(&portmap::mapping::default()).expect("encode");
    let result = transport.call(device.address, Procedure::PortmapGetPort, args).await;
    assert!(matches!(result, Err(Error::Timeout)), "unexpected result: {result:?}");
}
