use std::net::TcpListener as StdTcpListener;
use std::rc::Rc;
use std::time::{Duration, Instant};

use netport::event::RecordingSink;
use netport::{ConnectOptions, EventSink, Port, PortSpec, Reactor, SocketState, Transport};

macro_rules! t {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => panic!("{} failed with {:?}", stringify!($e), e),
        }
    };
}

#[test]
fn falls_back_to_the_first_working_address() {
    let mut reactor = t!(Reactor::new());
    let sink: Rc<dyn EventSink> = Rc::new(RecordingSink::default());

    // A real listener stands in for the address that actually accepts.
    let mut listener = Port::new(Transport::Tcp, PortSpec::listen(0), sink.clone());
    t!(listener.open(&mut reactor, ConnectOptions::default()));
    let good_port = t!(listener.query()).local_port;

    // Reserve then drop a listener to get a port nothing is bound to any
    // more -- connecting to it on loopback fails fast with
    // ECONNREFUSED, standing in for an address that refuses immediately.
    let probe = t!(StdTcpListener::bind("127.0.0.1:0"));
    let bad_port = probe.local_addr().unwrap().port();
    drop(probe);

    let mut sock = SocketState::new(Transport::Tcp);
    let addrs = vec![
        format!("127.0.0.1:{}", bad_port).parse().unwrap(),
        format!("127.0.0.1:{}", good_port).parse().unwrap(),
    ];
    let opts = ConnectOptions { timeout: Some(Duration::from_millis(500)) };

    t!(netport::connector::connect_first_reachable(&mut reactor, &mut sock, &addrs, opts));

    assert_eq!(sock.remote_port, good_port);
    assert!(sock.is_open());
}

#[test]
fn every_address_failing_is_reported_as_connection_failed() {
    let mut reactor = t!(Reactor::new());

    let probe_a = t!(StdTcpListener::bind("127.0.0.1:0"));
    let port_a = probe_a.local_addr().unwrap().port();
    drop(probe_a);
    let probe_b = t!(StdTcpListener::bind("127.0.0.1:0"));
    let port_b = probe_b.local_addr().unwrap().port();
    drop(probe_b);

    let mut sock = SocketState::new(Transport::Tcp);
    let addrs = vec![
        format!("127.0.0.1:{}", port_a).parse().unwrap(),
        format!("127.0.0.1:{}", port_b).parse().unwrap(),
    ];
    let opts = ConnectOptions { timeout: Some(Duration::from_millis(500)) };

    let result = netport::connector::connect_first_reachable(&mut reactor, &mut sock, &addrs, opts);
    assert!(matches!(result, Err(netport::NetError::ConnectionFailedAllAddresses)));
}

/// A scaled-down stand-in for S3: a single address nobody answers must
/// give up at the per-attempt deadline rather than hang forever. Uses a
/// TEST-NET-3 (RFC 5737) address, which routers never forward, so a SYN
/// sent to it is either dropped (hits our timeout) or immediately
/// rejected as unreachable (hits the `Err(Io)` branch) depending on the
/// sandbox's network stack -- either way `connect_one` must return
/// within the per-attempt deadline instead of blocking indefinitely.
#[test]
fn a_single_unreachable_address_gives_up_at_the_per_attempt_deadline() {
    let mut reactor = t!(Reactor::new());

    let mut sock = SocketState::new(Transport::Tcp);
    let addrs = vec!["203.0.113.1:80".parse().unwrap()];
    let timeout = Duration::from_millis(300);
    let opts = ConnectOptions { timeout: Some(timeout) };

    let start = Instant::now();
    let result = netport::connector::connect_first_reachable(&mut reactor, &mut sock, &addrs, opts);
    let elapsed = start.elapsed();

    assert!(result.is_err());
    assert!(
        elapsed < timeout + Duration::from_secs(2),
        "a single failing address must not outlive its deadline by much: {:?}",
        elapsed
    );
}
