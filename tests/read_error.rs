use std::io::Write;
use std::net::TcpStream as StdTcpStream;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use netport::event::RecordingSink;
use netport::{ConnectOptions, EventSink, Port, PortSpec, Reactor, TakeOptions, Transport};

macro_rules! t {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => panic!("{} failed with {:?}", stringify!($e), e),
        }
    };
}

/// A genuine transport error (as opposed to a graceful EOF) must not
/// leave whatever arrived earlier in the port's persistent data buffer
/// -- the bytes are possibly corrupted and the call itself returns
/// `Err`, so the buffer is cleared rather than left holding a silent
/// partial result.
#[test]
fn a_read_error_clears_previously_accrued_data() {
    let mut reactor = t!(Reactor::new());
    let sink: Rc<dyn EventSink> = Rc::new(RecordingSink::default());

    let mut listener = Port::new(Transport::Tcp, PortSpec::listen(0), sink.clone());
    t!(listener.open(&mut reactor, ConnectOptions::default()));
    let listen_port = t!(listener.query()).local_port;

    let peer = thread::spawn(move || {
        let mut stream = StdTcpStream::connect(("127.0.0.1", listen_port)).unwrap();
        stream.write_all(&[1, 2]).unwrap();
        thread::sleep(Duration::from_millis(100));
        // A zero linger timeout makes the kernel send RST on drop
        // instead of the usual FIN, so the peer's next read fails with
        // a real error instead of seeing a graceful EOF.
        stream.set_linger(Some(Duration::from_secs(0))).unwrap();
    });

    while listener.pending_connections() == 0 {
        t!(reactor.run_once(None));
    }
    let mut children = t!(listener.take(TakeOptions::One));
    let mut child = children.pop().expect("accepted child port");

    let n = t!(child.read(&mut reactor, Some(2)));
    assert_eq!(n, 2);
    assert_eq!(child.data(), &[1, 2]);

    peer.join().unwrap();

    let result = child.read(&mut reactor, Some(2));
    assert!(result.is_err(), "expected the reset connection to surface as an error");
    assert!(child.data().is_empty(), "a failed read must not retain stale data");
}
