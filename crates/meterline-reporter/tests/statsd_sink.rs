#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::UdpSocket;
use std::time::Duration;

use meterline_core::{
    CounterStats, GaugeLongStats, MetricId, MetricStats, TimerStats,
};
use meterline_reporter::config::StatsdSinkConfig;
use meterline_reporter::cycle::ReportBatch;
use meterline_reporter::sinks::{MetricSink, StatsdSink};

fn listener() -> UdpSocket {
    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    sock
}

fn cfg(port: u16) -> StatsdSinkConfig {
    StatsdSinkConfig {
        enabled: true,
        host: "127.0.0.1".into(),
        port,
        prefix: Some("svc".into()),
        max_name_bytes: 200,
        max_packet_bytes: 1432,
        include_tags: true,
    }
}

fn batch(stats: Vec<MetricStats>) -> ReportBatch {
    ReportBatch {
        collected_at_millis: 0,
        stats,
        timings: Vec::new(),
        timing_threshold_percent: 0.0,
    }
}

fn recv(sock: &UdpSocket) -> String {
    let mut buf = [0u8; 65_536];
    let n = sock.recv(&mut buf).expect("datagram");
    String::from_utf8(buf[..n].to_vec()).unwrap()
}

#[test]
fn datagram_carries_statsd_lines() {
    let server = listener();
    let sink = StatsdSink::new(&cfg(server.local_addr().unwrap().port())).unwrap();

    sink.report(&batch(vec![
        MetricStats::Counter(CounterStats {
            id: MetricId::with_tag_pairs("web.hits", &[("route", "home")]),
            count: 42,
        }),
        MetricStats::Timer(TimerStats {
            id: MetricId::new("web.latency"),
            bucket_range: Some("100-200".into()),
            count: 2,
            total_nanos: 300_000_000,
            max_nanos: 160_000_000,
            mean_nanos: 150_000_000,
            window_start_millis: 0,
            window_end_millis: 0,
        }),
        MetricStats::GaugeLong(GaugeLongStats {
            id: MetricId::new("queue.depth"),
            value: -3,
        }),
    ]))
    .unwrap();

    let payload = recv(&server);
    let lines: Vec<&str> = payload.split('\n').collect();
    assert_eq!(
        lines,
        vec![
            "svc.web.hits:42|c|#route:home",
            "svc.web.latency.100-200:150|ms",
            "svc.queue.depth:0|g",
            "svc.queue.depth:-3|g",
        ]
    );
}

#[test]
fn large_batches_are_split_under_the_packet_budget() {
    let server = listener();
    let mut c = cfg(server.local_addr().unwrap().port());
    c.prefix = None;
    c.max_packet_bytes = 512;
    let sink = StatsdSink::new(&c).unwrap();

    let stats: Vec<MetricStats> = (0..100)
        .map(|i| {
            MetricStats::Counter(CounterStats {
                id: MetricId::new(format!("counter.number.{i:03}")),
                count: 1,
            })
        })
        .collect();
    sink.report(&batch(stats)).unwrap();

    let mut seen = 0;
    while seen < 100 {
        let payload = recv(&server);
        assert!(payload.len() <= 512, "{}", payload.len());
        seen += payload.split('\n').count();
    }
    assert_eq!(seen, 100);
}

#[test]
fn unresolvable_host_fails_at_construction() {
    let mut c = cfg(8125);
    c.host = "no-such-host.invalid".into();
    let err = match StatsdSink::new(&c) {
        Ok(_) => panic!("must fail"),
        Err(e) => e,
    };
    assert_eq!(err.kind().as_str(), "CONFIG");
}
