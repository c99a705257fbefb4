#![cfg(unix)]

use bytes::Bytes;
use domain_conn::net::channel::Channel;
use domain_conn::net::close::CleanupReason;
use domain_conn::net::scheduler::PendingQueue;
use domain_conn::net::socket::OwnedSockets;
use domain_conn::net::status::Status;
use domain_conn::resolv::conf::{ResolvConf, Transport};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::time::Instant;

type SystemChannel = Channel<PendingQueue<Instant>, OwnedSockets>;

fn init() {
    #[cfg(feature = "logging")]
    domain_conn::logging::init_logging();
}

fn conf(data: &str) -> ResolvConf {
    let mut conf = ResolvConf::new();
    conf.parse(&mut io::Cursor::new(data)).unwrap();
    conf.finalize();
    conf
}

fn udp_socket() -> Socket {
    Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap()
}

fn tcp_socket() -> Socket {
    Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap()
}

#[test]
fn sweep_closes_capped_connection_and_keeps_busy_one() {
    init();
    let conf = conf(
        "nameserver 192.0.2.53\n\
         options stay-open udp-max-queries:5\n",
    );
    let mut chan = SystemChannel::from_conf(
        &conf,
        PendingQueue::new(),
        OwnedSockets::new(),
    );
    let server = chan.registry().server_order()[0];

    let s1 = chan.sockets_mut().register(udp_socket());
    let s2 = chan.sockets_mut().register(udp_socket());
    let c1 = chan.open_connection(server, s1, Transport::Udp).unwrap();
    let c2 = chan.open_connection(server, s2, Transport::Udp).unwrap();

    let registry = chan.registry_mut();
    for _ in 0..5 {
        let query = registry.add_query(Bytes::from_static(b"q"));
        registry.bind_query(query, c1);
        registry.end_query(query);
    }
    let done = registry.add_query(Bytes::from_static(b"q"));
    registry.bind_query(done, c2);
    registry.end_query(done);
    let busy = registry.add_query(Bytes::from_static(b"busy"));
    registry.bind_query(busy, c2);

    let closed = chan.check_cleanup_conns();

    assert_eq!(closed, [(c1, CleanupReason::UdpMaxQueries)]);
    assert_eq!(chan.sockets().len(), 1);
    assert!(chan.sockets().get(s1).is_none());
    let registry = chan.registry();
    assert_eq!(registry.conn_by_socket(s1), None);
    assert_eq!(registry.conn_by_socket(s2), Some(c2));
    assert_eq!(registry.query(busy).unwrap().conn(), Some(c2));
    assert!(chan.scheduler().is_empty());
}

#[test]
fn failed_connection_requeues_and_rotates_siblings() {
    init();
    let conf = conf(
        "nameserver 192.0.2.53\n\
         nameserver 198.51.100.53\n\
         options stay-open\n",
    );
    let mut chan = SystemChannel::from_conf(
        &conf,
        PendingQueue::new(),
        OwnedSockets::new(),
    );
    let order = chan.registry().server_order();
    let (first, second) = (order[0], order[1]);

    let tcp = chan.sockets_mut().register(tcp_socket());
    let udp = chan.sockets_mut().register(udp_socket());
    let other = chan.sockets_mut().register(udp_socket());
    let tcp_conn = chan.open_connection(first, tcp, Transport::Tcp).unwrap();
    let udp_conn = chan.open_connection(first, udp, Transport::Udp).unwrap();
    let other_conn =
        chan.open_connection(second, other, Transport::Udp).unwrap();

    let registry = chan.registry_mut();
    let queries: Vec<_> = (0..3)
        .map(|_| {
            let query = registry.add_query(Bytes::new());
            registry.bind_query(query, tcp_conn);
            query
        })
        .collect();

    chan.handle_conn_error(tcp_conn, Status::ConnReset);

    // All queries are with the scheduler, stamped with the same time.
    let parked: Vec<_> = chan.scheduler().iter().cloned().collect();
    assert_eq!(parked.len(), 3);
    assert_eq!(
        parked.iter().map(|item| item.query).collect::<Vec<_>>(),
        queries
    );
    assert!(parked.iter().all(|item| item.now == parked[0].now));
    assert!(parked.iter().all(|item| item.status == Status::ConnReset));
    assert_eq!(chan.registry().server(first).unwrap().tcp_conn(), None);

    // The failing server is now sorted last and its idle UDP connection
    // gets rotated.
    assert_eq!(chan.registry().server_order(), [second, first]);
    assert_eq!(
        chan.check_cleanup_conns(),
        [(udp_conn, CleanupReason::ServerFailures)]
    );
    assert!(chan.registry().connection(other_conn).is_some());

    // Dispatch the parked queries to the surviving connection.
    while let Some(item) = chan.scheduler_mut().pop() {
        assert!(chan.registry_mut().bind_query(item.query, other_conn));
    }
    let registry = chan.registry();
    assert_eq!(
        registry
            .connection(other_conn)
            .unwrap()
            .queries()
            .collect::<Vec<_>>(),
        queries
    );
    assert_eq!(registry.connection(other_conn).unwrap().total_queries(), 3);
}

#[test]
fn dropping_channel_closes_all_sockets() {
    init();
    let conf = conf("nameserver 192.0.2.53\n");
    let mut chan = SystemChannel::from_conf(
        &conf,
        PendingQueue::new(),
        OwnedSockets::new(),
    );
    let server = chan.registry().server_order()[0];
    for _ in 0..3 {
        let sock = chan.sockets_mut().register(udp_socket());
        chan.open_connection(server, sock, Transport::Udp).unwrap();
    }
    let sock = chan.sockets_mut().register(tcp_socket());
    let conn = chan.open_connection(server, sock, Transport::Tcp).unwrap();
    let query = chan.registry_mut().add_query(Bytes::new());
    chan.registry_mut().bind_query(query, conn);

    chan.destroy();

    assert!(chan.sockets().is_empty());
    assert_eq!(chan.registry().connection_count(), 0);
    assert!(chan.scheduler().contains(query));
}
